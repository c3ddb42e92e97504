use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 主配置结构体
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub server: ServerConfig,
    pub gateway: GatewayConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            server: ServerConfig::default(),
            gateway: GatewayConfig::default(),
            llm: LlmConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// HTTP 状态服务配置 (/health, /status)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 允许的 Origin，包含 "*" 时不做限制
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: vec![
                "http://0.0.0.0:8765".to_string(),
                "http://10.0.2.2:8765".to_string(),
                "capacitor://localhost".to_string(),
                "ionic://localhost".to_string(),
                "*".to_string(),
            ],
        }
    }
}

impl ServerConfig {
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

/// Gateway 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// 绑定地址 (e.g., "0.0.0.0:8765")
    pub bind: String,
    /// 接受 WebSocket 握手的路径
    pub paths: Vec<String>,
    /// 最大并发连接数
    pub max_connections: usize,
    /// 是否为每个请求附加情感上下文
    pub sentiment_context: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8765".to_string(),
            paths: vec!["/".to_string(), "/ai".to_string()],
            max_connections: 1000,
            sentiment_context: true,
        }
    }
}

/// LLM 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    pub default_provider: String,
    pub providers: HashMap<String, ProviderSettings>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let mut providers = HashMap::new();

        providers.insert(
            "gemini".to_string(),
            ProviderSettings {
                vision_model: Some("gemini-2.0-flash-exp".to_string()),
                ..ProviderSettings::new(
                    ProviderKind::Gemini,
                    "https://generativelanguage.googleapis.com/v1beta",
                    "gemini-2.0-flash-exp",
                    AuthSettings::ApiKey {
                        env: "GEMINI_API_KEY".to_string(),
                    },
                )
            },
        );

        providers.insert(
            "openai".to_string(),
            ProviderSettings {
                vision_model: Some("gpt-4o".to_string()),
                ..ProviderSettings::new(
                    ProviderKind::Openai,
                    "https://api.openai.com/v1",
                    "gpt-3.5-turbo",
                    AuthSettings::Bearer {
                        env: "OPENAI_API_KEY".to_string(),
                    },
                )
            },
        );

        providers.insert(
            "ollama".to_string(),
            ProviderSettings {
                endpoint_env: Some("OLLAMA_ENDPOINT".to_string()),
                model_env: Some("OLLAMA_MODEL".to_string()),
                vision_model: Some("llava".to_string()),
                timeout_seconds: Some(120),
                ..ProviderSettings::new(
                    ProviderKind::Ollama,
                    "http://localhost:11434/api/chat",
                    "llama2",
                    AuthSettings::None,
                )
            },
        );

        providers.insert(
            "llama".to_string(),
            ProviderSettings {
                endpoint_env: Some("LLAMA_ENDPOINT".to_string()),
                model_env: Some("LLAMA_MODEL".to_string()),
                temperature: Some(0.7),
                timeout_seconds: Some(120),
                ..ProviderSettings::new(
                    ProviderKind::Generic,
                    "http://localhost:8000/v1/chat/completions",
                    "llama-2-7b-chat",
                    AuthSettings::None,
                )
            },
        );

        Self {
            default_provider: "gemini".to_string(),
            providers,
        }
    }
}

/// 支持的后端类型（封闭集合）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    /// OpenAI 及兼容接口
    Openai,
    Ollama,
    /// 通用 HTTP chat 接口，返回 choices[0].message.content
    Generic,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::Openai => "openai",
            ProviderKind::Ollama => "ollama",
            ProviderKind::Generic => "generic",
        };
        f.write_str(s)
    }
}

/// Provider 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub base_url: String,
    /// 若设置且环境变量存在，覆盖 base_url
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// 若设置且环境变量存在，覆盖 model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vision_model: Option<String>,
    #[serde(flatten)]
    pub auth: AuthSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

fn default_enabled() -> bool {
    true
}

impl ProviderSettings {
    pub fn new(
        kind: ProviderKind,
        base_url: impl Into<String>,
        model: impl Into<String>,
        auth: AuthSettings,
    ) -> Self {
        Self {
            kind,
            enabled: true,
            base_url: base_url.into(),
            endpoint_env: None,
            model: Some(model.into()),
            model_env: None,
            vision_model: None,
            auth,
            headers: None,
            timeout_seconds: Some(60),
            max_retries: None,
            temperature: None,
        }
    }

    /// 实际使用的 endpoint：环境变量优先
    pub fn resolved_base_url(&self) -> String {
        self.endpoint_env
            .as_deref()
            .and_then(non_empty_env)
            .unwrap_or_else(|| self.base_url.clone())
    }

    /// 实际使用的模型：环境变量优先
    pub fn resolved_model(&self) -> Option<String> {
        self.model_env
            .as_deref()
            .and_then(non_empty_env)
            .or_else(|| self.model.clone())
    }

    /// 凭据（API key 或 bearer token）
    pub fn credential(&self) -> Option<String> {
        self.auth
            .get_api_key()
            .or_else(|| self.auth.get_bearer_token())
            .filter(|k| !k.is_empty())
    }

    /// Provider 是否具备调用条件
    pub fn is_configured(&self) -> bool {
        if !self.enabled {
            return false;
        }
        match self.auth {
            AuthSettings::ApiKey { .. } | AuthSettings::Bearer { .. } => {
                self.credential().is_some()
            }
            AuthSettings::None => !self.resolved_base_url().trim().is_empty(),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Authentication settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "auth_type", rename_all = "snake_case")]
pub enum AuthSettings {
    /// API Key authentication - reads from environment variable
    ApiKey { env: String },
    /// Bearer token authentication - reads from environment variable
    Bearer { env: String },
    /// No authentication
    #[default]
    None,
}

impl AuthSettings {
    /// Get API key from environment if applicable
    pub fn get_api_key(&self) -> Option<String> {
        match self {
            Self::ApiKey { env } => std::env::var(env).ok(),
            _ => None,
        }
    }

    /// Get bearer token from environment if applicable
    pub fn get_bearer_token(&self) -> Option<String> {
        match self {
            Self::Bearer { env } => std::env::var(env).ok(),
            _ => None,
        }
    }
}

/// 日志级别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::Validation(format!("Invalid log level: {}", s))),
        }
    }
}

/// Logging 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// 输出 JSON 格式日志
    pub json_format: bool,
    /// 日志文件路径（支持 ~），为空时只输出到 stderr
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.gateway.bind, "0.0.0.0:8765");
        assert_eq!(config.gateway.paths, vec!["/", "/ai"]);
        assert_eq!(config.llm.default_provider, "gemini");
        assert_eq!(config.llm.providers.len(), 4);
        assert!(config.server.allows_any_origin());
    }

    #[test]
    fn test_provider_settings_serialization() {
        let settings = ProviderSettings::new(
            ProviderKind::Openai,
            "https://api.openai.com/v1",
            "gpt-3.5-turbo",
            AuthSettings::Bearer {
                env: "OPENAI_API_KEY".to_string(),
            },
        );

        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["kind"], "openai");
        assert_eq!(json["auth_type"], "bearer");
        assert_eq!(json["env"], "OPENAI_API_KEY");

        let back: ProviderSettings = serde_json::from_value(json).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"server": {"port": 9000}}"#).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.gateway.max_connections, 1000);
    }

    #[test]
    fn test_env_overrides_endpoint_and_model() {
        let mut settings = ProviderSettings::new(
            ProviderKind::Ollama,
            "http://localhost:11434/api/chat",
            "llama2",
            AuthSettings::None,
        );
        settings.endpoint_env = Some("SENTI_TEST_OLLAMA_ENDPOINT".to_string());
        settings.model_env = Some("SENTI_TEST_OLLAMA_MODEL".to_string());

        assert_eq!(settings.resolved_base_url(), "http://localhost:11434/api/chat");
        assert_eq!(settings.resolved_model().as_deref(), Some("llama2"));

        std::env::set_var("SENTI_TEST_OLLAMA_ENDPOINT", "http://gpu-box:11434");
        std::env::set_var("SENTI_TEST_OLLAMA_MODEL", "mistral");
        assert_eq!(settings.resolved_base_url(), "http://gpu-box:11434");
        assert_eq!(settings.resolved_model().as_deref(), Some("mistral"));
        assert!(settings.is_configured());
    }

    #[test]
    fn test_is_configured_requires_key() {
        let mut settings = ProviderSettings::new(
            ProviderKind::Gemini,
            "https://generativelanguage.googleapis.com/v1beta",
            "gemini-2.0-flash-exp",
            AuthSettings::ApiKey {
                env: "SENTI_TEST_MISSING_KEY".to_string(),
            },
        );
        assert!(!settings.is_configured());

        std::env::set_var("SENTI_TEST_PRESENT_KEY", "secret");
        settings.auth = AuthSettings::ApiKey {
            env: "SENTI_TEST_PRESENT_KEY".to_string(),
        };
        assert!(settings.is_configured());

        settings.enabled = false;
        assert!(!settings.is_configured());
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
