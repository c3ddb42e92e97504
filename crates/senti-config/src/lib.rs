pub mod config;
pub mod manager;

pub use config::{
    AuthSettings, Config, ConfigError, ConfigResult, GatewayConfig, LlmConfig, LogLevel,
    LoggingConfig, ProviderKind, ProviderSettings, ServerConfig,
};
pub use manager::ConfigManager;

use std::path::PathBuf;

/// 获取 Senti 配置目录路径
pub fn senti_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".senti"))
}

/// 获取默认配置文件路径
pub fn default_config_path() -> Option<PathBuf> {
    senti_dir().map(|dir| dir.join("config.json"))
}

/// 展开路径中的 ~ 为用户主目录
pub fn expand_tilde(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(path)),
    }
}
