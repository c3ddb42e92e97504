//! 日志初始化
//!
//! 基于 tracing-subscriber 的结构化日志，可选写入文件。

use anyhow::Context;
use senti_config::{LogLevel, LoggingConfig};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// 初始化全局日志
///
/// `RUST_LOG` 优先于配置中的级别。写文件时返回的 guard 必须保持存活。
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = build_filter(config.level)?;

    let mut layers: Vec<BoxedLayer> = vec![stderr_layer(config.json_format)];
    let mut guard = None;

    if let Some(file) = config.file.as_deref().filter(|f| !f.is_empty()) {
        let path = senti_config::expand_tilde(file).unwrap_or_else(|| PathBuf::from(file));
        let (dir, name) = split_log_path(&path)?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create log directory {:?}", dir))?;

        let appender = tracing_appender::rolling::never(&dir, name);
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        layers.push(file_layer(config.json_format, writer));
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("logging already initialized")?;

    tracing::info!("Log level set to: {}", config.level);
    Ok(guard)
}

/// 构建环境过滤器
fn build_filter(level: LogLevel) -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(default_directives(level)).context("invalid log filter")
}

/// 第三方 HTTP 栈默认降到 warn
fn default_directives(level: LogLevel) -> String {
    format!("{},hyper=warn,h2=warn,rustls=warn,tungstenite=warn", level.as_str())
}

fn stderr_layer(json: bool) -> BoxedLayer {
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}

fn file_layer(json: bool, writer: tracing_appender::non_blocking::NonBlocking) -> BoxedLayer {
    let layer = fmt::layer().with_writer(writer).with_ansi(false);
    if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}

fn split_log_path(path: &Path) -> anyhow::Result<(PathBuf, String)> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("invalid log file path {:?}", path))?
        .to_string();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        let directives = default_directives(LogLevel::Debug);
        assert!(directives.starts_with("debug,"));
        assert!(EnvFilter::try_new(directives).is_ok());
    }

    #[test]
    fn test_split_log_path() {
        let (dir, name) = split_log_path(Path::new("/var/log/senti/server.log")).unwrap();
        assert_eq!(dir, PathBuf::from("/var/log/senti"));
        assert_eq!(name, "server.log");

        let (dir, name) = split_log_path(Path::new("server.log")).unwrap();
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(name, "server.log");

        assert!(split_log_path(Path::new("/")).is_err());
    }

    // the only test in this crate that installs the global subscriber
    #[test]
    fn test_init_with_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logs").join("senti.log");
        let config = LoggingConfig {
            level: LogLevel::Info,
            json_format: true,
            file: Some(path.to_string_lossy().into_owned()),
        };

        let guard = init_logging(&config).unwrap();
        assert!(guard.is_some());
        tracing::info!("file logging works");
        drop(guard);

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("file logging works"));
        assert!(init_logging(&config).is_err());
    }
}
