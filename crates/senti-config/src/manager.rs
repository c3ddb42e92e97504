use crate::config::{Config, ConfigError, ConfigResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

static ENV_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern"));

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: Arc<RwLock<Config>>,
}

impl ConfigManager {
    /// 加载配置文件，不存在时写入默认配置
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        let config = if path.exists() {
            info!("Loading config from {:?}", path);
            let content = tokio::fs::read_to_string(path).await?;
            let content = Self::expand_env_vars(&content)?;
            let config: Config = serde_json::from_str(&content)?;
            Self::validate(&config)?;
            config
        } else {
            info!("Config file not found, creating default config at {:?}", path);
            let default_config = Config::default();
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let content = serde_json::to_string_pretty(&default_config)?;
            tokio::fs::write(path, &content).await?;
            default_config
        };

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
        })
    }

    /// 获取默认配置路径 (~/.senti/config.json)
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        crate::default_config_path()
            .ok_or_else(|| ConfigError::InvalidPath("Could not find home directory".to_string()))
    }

    /// 当前配置的副本
    pub async fn snapshot(&self) -> Config {
        self.config.read().await.clone()
    }

    /// 验证配置
    pub fn validate(config: &Config) -> ConfigResult<()> {
        if config.server.port == 0 {
            return Err(ConfigError::Validation(
                "Server port cannot be 0".to_string(),
            ));
        }

        if config.gateway.max_connections == 0 {
            return Err(ConfigError::Validation(
                "Gateway max_connections must be greater than 0".to_string(),
            ));
        }

        if config.gateway.paths.is_empty() {
            return Err(ConfigError::Validation(
                "Gateway must accept at least one path".to_string(),
            ));
        }

        if let Some(path) = config.gateway.paths.iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::Validation(format!(
                "Gateway path '{}' must start with '/'",
                path
            )));
        }

        // 默认 provider 必须存在
        if !config.llm.providers.contains_key(&config.llm.default_provider) {
            return Err(ConfigError::Validation(format!(
                "Default LLM provider '{}' not found in providers list",
                config.llm.default_provider
            )));
        }

        Ok(())
    }

    /// 展开环境变量 ${VAR} 或 ${VAR:-default}
    pub fn expand_env_vars(content: &str) -> ConfigResult<String> {
        let mut result = content.to_string();

        for cap in ENV_VAR.captures_iter(content) {
            let full_match = &cap[0];
            let var_expr = &cap[1];

            let (var_name, default_value) = match var_expr.split_once(":-") {
                Some((name, default)) => (name, Some(default)),
                None => (var_expr, None),
            };

            let replacement = match std::env::var(var_name) {
                Ok(val) => val,
                Err(_) => match default_value {
                    Some(default) => default.to_string(),
                    None => return Err(ConfigError::EnvVarNotFound(var_name.to_string())),
                },
            };

            result = result.replace(full_match, &replacement);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");

        let manager = ConfigManager::load(&config_path).await.unwrap();
        let config = manager.snapshot().await;

        assert!(config_path.exists());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.llm.default_provider, "gemini");
    }

    #[tokio::test]
    async fn test_load_existing_with_env() {
        std::env::set_var("SENTI_TEST_GATEWAY_BIND", "127.0.0.1:9999");
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let mut config = Config::default();
        config.gateway.bind = "${SENTI_TEST_GATEWAY_BIND}".to_string();
        config.server.host = "${SENTI_TEST_UNSET_HOST:-127.0.0.1}".to_string();
        tokio::fs::write(&config_path, serde_json::to_string(&config).unwrap())
            .await
            .unwrap();

        let manager = ConfigManager::load(&config_path).await.unwrap();
        let loaded = manager.snapshot().await;
        assert_eq!(loaded.gateway.bind, "127.0.0.1:9999");
        assert_eq!(loaded.server.host, "127.0.0.1");
    }

    #[tokio::test]
    async fn test_load_rejects_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let mut config = Config::default();
        config.llm.default_provider = "missing".to_string();
        tokio::fs::write(&config_path, serde_json::to_string(&config).unwrap())
            .await
            .unwrap();

        let err = ConfigManager::load(&config_path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("SENTI_TEST_VAR", "test_value");

        let content = r#"{"key": "${SENTI_TEST_VAR}", "other": "${SENTI_TEST_NOPE:-fallback}"}"#;
        let expanded = ConfigManager::expand_env_vars(content).unwrap();

        assert!(expanded.contains("test_value"));
        assert!(expanded.contains("fallback"));
    }

    #[test]
    fn test_env_var_missing() {
        let err = ConfigManager::expand_env_vars(r#"{"key": "${SENTI_TEST_DEFINITELY_UNSET}"}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarNotFound(name) if name == "SENTI_TEST_DEFINITELY_UNSET"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(ConfigManager::validate(&config).is_err());

        config.server.port = 8080;
        assert!(ConfigManager::validate(&config).is_ok());

        config.gateway.paths = vec!["ai".to_string()];
        assert!(ConfigManager::validate(&config).is_err());

        config.gateway.paths.clear();
        assert!(ConfigManager::validate(&config).is_err());
    }

    #[test]
    fn test_default_config_path() {
        let path = ConfigManager::default_config_path().unwrap();
        assert!(path.ends_with(".senti/config.json"));
    }
}
