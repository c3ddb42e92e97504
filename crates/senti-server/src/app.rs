//! 服务启动
//!
//! 组装 provider registry、WebSocket gateway 与 HTTP 状态服务。

use senti_config::{Config, ConfigError, ConfigResult, LogLevel};
use senti_gateway::{Gateway, GatewayConfig, GatewayContext, RouterOptions};
use senti_llm::ProviderRegistry;
use std::str::FromStr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::http;

/// 命令行覆盖项（优先于配置文件）
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub default_provider: Option<String>,
    pub log_level: Option<String>,
    pub json_logs: bool,
}

impl Overrides {
    pub fn apply(&self, config: &mut Config) -> ConfigResult<()> {
        if let Some(bind) = &self.bind {
            config.gateway.bind = bind.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(provider) = &self.default_provider {
            config.llm.default_provider = provider.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = LogLevel::from_str(level)?;
        }
        if self.json_logs {
            config.logging.json_format = true;
        }
        Ok(())
    }
}

/// 从配置映射 gateway 参数
pub fn gateway_config(config: &Config) -> GatewayConfig {
    GatewayConfig {
        bind: config.gateway.bind.clone(),
        paths: config.gateway.paths.clone(),
        max_connections: config.gateway.max_connections,
        allowed_origins: config.server.allowed_origins.clone(),
    }
}

pub fn router_options(config: &Config) -> RouterOptions {
    RouterOptions {
        sentiment_context: config.gateway.sentiment_context,
    }
}

/// 构建共享上下文
pub fn build_context(config: &Config) -> ConfigResult<GatewayContext> {
    let registry = ProviderRegistry::from_config(&config.llm)
        .map_err(|e| ConfigError::Validation(e.to_string()))?;
    Ok(GatewayContext::new(registry, router_options(config)))
}

/// 启动 gateway 与 HTTP 服务，直到 Ctrl-C 或 `shutdown` 被取消
pub async fn run(config: Config, shutdown: CancellationToken) -> anyhow::Result<()> {
    let context = build_context(&config)?;
    info!(
        "Providers: {:?} (default: {})",
        context.providers.names(),
        context.providers.default_name()
    );

    let ws_listener = TcpListener::bind(&config.gateway.bind).await?;
    let gateway =
        Gateway::new(gateway_config(&config), context.clone()).with_shutdown(shutdown.clone());
    let gateway_task = tokio::spawn(async move { gateway.serve(ws_listener).await });

    let http_addr = format!("{}:{}", config.server.host, config.server.port);
    let http_listener = TcpListener::bind(&http_addr).await?;
    info!("HTTP status server listening on http://{}", http_addr);

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl-C, shutting down");
            }
            shutdown.cancel();
        });
    }

    let app = http::router(context, &config.server);
    let http_shutdown = shutdown.clone();
    let served = axum::serve(http_listener, app)
        .with_graceful_shutdown(async move { http_shutdown.cancelled().await })
        .await;

    shutdown.cancel();
    match gateway_task.await {
        Ok(Err(e)) => error!("Gateway error: {}", e),
        Err(e) => error!("Gateway task failed: {}", e),
        Ok(Ok(())) => {}
    }
    served?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply() {
        let mut config = Config::default();
        let overrides = Overrides {
            bind: Some("127.0.0.1:9000".to_string()),
            port: Some(9001),
            default_provider: Some("ollama".to_string()),
            log_level: Some("warning".to_string()),
            json_logs: true,
        };
        overrides.apply(&mut config).unwrap();

        assert_eq!(config.gateway.bind, "127.0.0.1:9000");
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.llm.default_provider, "ollama");
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_bad_log_level_rejected() {
        let overrides = Overrides {
            log_level: Some("loud".to_string()),
            ..Default::default()
        };
        assert!(overrides.apply(&mut Config::default()).is_err());
    }

    #[test]
    fn test_gateway_config_mapping() {
        let config = Config::default();
        let gateway = gateway_config(&config);
        assert_eq!(gateway.bind, "0.0.0.0:8765");
        assert_eq!(gateway.paths, vec!["/", "/ai"]);
        assert_eq!(gateway.allowed_origins, config.server.allowed_origins);
        assert!(router_options(&config).sentiment_context);
    }

    #[test]
    fn test_build_context_requires_default_provider() {
        let mut config = Config::default();
        assert_eq!(build_context(&config).unwrap().providers.len(), 4);

        config.llm.default_provider = "missing".to_string();
        assert!(build_context(&config).is_err());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let mut config = Config::default();
        config.gateway.bind = "127.0.0.1:0".to_string();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0;

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run(config, shutdown.clone()));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        shutdown.cancel();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
