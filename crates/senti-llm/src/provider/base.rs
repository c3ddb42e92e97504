use reqwest::{header, Client, Response};
use reqwest_middleware::ClientWithMiddleware;
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde_json::Value;

use crate::error::{LLMError, Result};
use crate::provider::{AuthConfig, ProviderConfig};

/// Shared HTTP plumbing for provider adapters.
///
/// Owns the retrying client and the static header set. Status handling maps
/// 401/403 to `Auth`, 429 to `RateLimited`, everything else to `Api`.
#[derive(Debug, Clone)]
pub struct BaseClient {
    http_client: ClientWithMiddleware,
    headers: header::HeaderMap,
    missing_credential: Option<String>,
}

impl BaseClient {
    /// `api_key_header` names the header an `AuthConfig::ApiKey` is sent in
    pub fn new(config: &ProviderConfig, api_key_header: &str) -> Result<Self> {
        let retry_policy = ExponentialBackoff::builder()
            .base(2)
            .build_with_max_retries(config.max_retries);

        let http_client = reqwest_middleware::ClientBuilder::new(
            Client::builder()
                .timeout(config.timeout)
                .build()
                .map_err(|e| LLMError::Config(e.to_string()))?,
        )
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build();

        let headers = Self::build_headers(config, api_key_header)?;
        let missing_credential = match &config.auth {
            AuthConfig::Missing { env } => Some(env.clone()),
            _ => None,
        };

        Ok(Self {
            http_client,
            headers,
            missing_credential,
        })
    }

    fn build_headers(config: &ProviderConfig, api_key_header: &str) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let auth = match &config.auth {
            AuthConfig::ApiKey { key } => Some((api_key_header.to_string(), key.clone())),
            AuthConfig::Bearer { token } => Some((
                header::AUTHORIZATION.as_str().to_string(),
                format!("Bearer {}", token),
            )),
            AuthConfig::Missing { .. } | AuthConfig::None => None,
        };

        let custom = config.headers.iter().map(|(k, v)| (k.clone(), v.clone()));
        for (key, value) in auth.into_iter().chain(custom) {
            let name = header::HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| LLMError::Config(format!("Invalid header name: {}", e)))?;
            let value = header::HeaderValue::from_str(&value)
                .map_err(|e| LLMError::Config(format!("Invalid header value: {}", e)))?;
            headers.insert(name, value);
        }

        Ok(headers)
    }

    pub fn is_configured(&self) -> bool {
        self.missing_credential.is_none()
    }

    /// POST a JSON body and return the raw response once the status is successful
    pub async fn post(&self, url: &str, body: &Value) -> Result<Response> {
        if let Some(env) = &self.missing_credential {
            return Err(LLMError::Auth(format!("{} is not set", env)));
        }

        log::debug!("POST {}", url);
        let response = self
            .http_client
            .post(url)
            .headers(self.headers.clone())
            .json(body)
            .send()
            .await?;

        check_status(response).await
    }

    /// POST a JSON body and decode a JSON response
    pub async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        let response = self.post(url, body).await?;
        response
            .json()
            .await
            .map_err(|e| LLMError::Parse(e.to_string()))
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(60);
    let error_text = response.text().await.unwrap_or_default();
    log::warn!("provider returned {}: {}", status, error_text);

    Err(match status.as_u16() {
        401 | 403 => LLMError::Auth(error_message(&error_text)),
        429 => LLMError::RateLimited { retry_after },
        code => LLMError::Api {
            status: code,
            message: error_message(&error_text),
        },
    })
}

/// Pull `error.message` (or a bare `error` string) out of an error body
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| embedded_error(&v))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Error carried inside an otherwise successful payload
pub(crate) fn embedded_error(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::String(s) => Some(s.clone()),
        other => other
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}
