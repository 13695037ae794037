//! # PACS管理模块
//!
//! 分诊服务的配置加载、校验与日志初始化。

pub mod config;
pub mod logging;

pub use config::{ConfigManager, ConfigValidator, ServerConfig, TriageSystemConfig};
pub use logging::{init_logging, LogFormat, LoggingConfig};
