use anyhow::Context;
use clap::Parser;
use senti_config::ConfigManager;
use senti_server::{logging::init_logging, Overrides};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug, Clone)]
#[command(name = "senti-server")]
#[command(about = "Senti realtime LLM gateway")]
#[command(version)]
struct Cli {
    /// Config file path (default: ~/.senti/config.json)
    #[arg(long, env = "SENTI_CONFIG")]
    config: Option<String>,

    /// WebSocket bind address (overrides config)
    #[arg(long, env = "SENTI_BIND")]
    bind: Option<String>,

    /// HTTP status port (overrides config)
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Default LLM provider (overrides config)
    #[arg(long, env = "SENTI_DEFAULT_PROVIDER")]
    default_provider: Option<String>,

    /// Log level (overrides config)
    #[arg(long, env = "SENTI_LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit JSON logs
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            bind: self.bind.clone(),
            port: self.port,
            default_provider: self.default_provider.clone(),
            log_level: self.log_level.clone(),
            json_logs: self.json_logs,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 展开配置文件路径
    let config_path = match &cli.config {
        Some(path) => senti_config::expand_tilde(path).unwrap_or_else(|| PathBuf::from(path)),
        None => ConfigManager::default_config_path()?,
    };

    // 加载配置
    let manager = ConfigManager::load(&config_path)
        .await
        .with_context(|| format!("failed to load config from {:?}", config_path))?;
    let mut config = manager.snapshot().await;

    // CLI 参数覆盖配置文件
    cli.overrides().apply(&mut config)?;
    ConfigManager::validate(&config)?;

    // 初始化日志
    let _guard = init_logging(&config.logging)?;

    tracing::info!("Config loaded from {:?}", config_path);
    tracing::info!("Starting Senti gateway on ws://{}", config.gateway.bind);

    senti_server::run(config, CancellationToken::new()).await
}
