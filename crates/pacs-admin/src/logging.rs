//! 日志初始化
//!
//! 基于 `tracing-subscriber` 的 fmt 输出与 `EnvFilter`，进程启动时初始化一次。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Full,
    Compact,
    Pretty,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别或过滤指令，如 `info` 或 `pacs_triage=debug,info`
    pub level: String,
    /// 日志格式
    pub format: LogFormat,
    /// 是否输出模块路径
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Full,
            with_target: true,
        }
    }
}

/// 构建日志过滤器，`RUST_LOG` 优先，其次是命令行指定的级别，最后是配置
pub fn build_filter(config: &LoggingConfig, level_override: Option<&str>) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let directives = level_override.unwrap_or(&config.level);
    EnvFilter::try_new(directives).with_context(|| format!("Invalid log level: {}", directives))
}

/// 初始化全局日志订阅器
pub fn init_logging(config: &LoggingConfig, level_override: Option<&str>) -> Result<()> {
    let filter = build_filter(config, level_override)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target);

    let result = match config.format {
        LogFormat::Full => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };

    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_from_json() {
        let config: LoggingConfig = serde_json::from_str(r#"{"level": "debug", "format": "compact"}"#).unwrap();
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Compact);
        assert!(config.with_target);
    }

    #[test]
    fn test_build_filter() {
        let config = LoggingConfig::default();
        assert!(build_filter(&config, None).is_ok());
        assert!(build_filter(&config, Some("pacs_triage=debug,info")).is_ok());
    }
}
