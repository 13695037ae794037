//! 配置管理
//!
//! 配置来源按优先级从低到高：内置默认值 → 配置文件 → `PACS__` 前缀环境变量 →
//! 兼容旧部署的环境变量（`DB_HOST`、`DEEPSEEK_API_KEY` 等）。

use std::collections::HashMap;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use pacs_database::DatabaseConfig;
use pacs_triage::{BackendConfig, RankerConfig};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::logging::LoggingConfig;

/// 旧部署使用的环境变量与配置路径的对应关系
const LEGACY_ENV_VARS: &[(&str, &str)] = &[
    ("DB_HOST", "database.host"),
    ("DB_PORT", "database.port"),
    ("DB_NAME", "database.name"),
    ("DB_USER", "database.user"),
    ("DB_PASSWORD", "database.password"),
    ("DEEPSEEK_API_KEY", "backend.api_key"),
    ("DEEPSEEK_BASE_URL", "backend.base_url"),
];

/// 分诊系统完整配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageSystemConfig {
    /// HTTP服务配置
    pub server: ServerConfig,
    /// 数据库配置
    pub database: DatabaseConfig,
    /// 文本生成后端配置
    pub backend: BackendConfig,
    /// 相似病例检索配置
    pub ranker: RankerConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// HTTP服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听主机
    pub host: String,
    /// 监听端口
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    /// 配置数据
    config: TriageSystemConfig,
    /// 配置文件路径
    config_path: Option<String>,
}

impl ConfigManager {
    /// 使用进程环境变量加载配置
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::load_with_env(config_path, &vars)
    }

    /// 使用给定的环境变量集合加载配置
    pub fn load_with_env(config_path: Option<&str>, vars: &HashMap<String, String>) -> Result<Self> {
        let defaults = Config::try_from(&TriageSystemConfig::default())
            .context("Failed to build default configuration")?;

        let mut builder = Config::builder().add_source(defaults);

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("PACS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(Some(vars.clone())),
        );

        for (var, key) in LEGACY_ENV_VARS {
            builder = builder
                .set_override_option(*key, vars.get(*var).cloned())
                .with_context(|| format!("Failed to apply {}", var))?;
        }

        let config: TriageSystemConfig = builder
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        ConfigValidator::new().validate(&config)?;

        match config_path {
            Some(path) => info!("Configuration loaded successfully from: {}", path),
            None => info!("Configuration loaded from defaults and environment"),
        }

        Ok(Self {
            config,
            config_path: config_path.map(str::to_string),
        })
    }

    /// 获取配置
    pub fn config(&self) -> &TriageSystemConfig {
        &self.config
    }

    pub fn config_path(&self) -> Option<&str> {
        self.config_path.as_deref()
    }

    pub fn into_config(self) -> TriageSystemConfig {
        self.config
    }
}

/// 配置验证器
#[derive(Debug)]
pub struct ConfigValidator {
    /// 验证规则
    validation_rules: Vec<ValidationRule>,
}

/// 验证规则
#[derive(Debug)]
struct ValidationRule {
    /// 字段路径
    field_path: &'static str,
    /// 验证函数
    validator: fn(&TriageSystemConfig) -> Result<()>,
}

impl ConfigValidator {
    /// 创建新的配置验证器
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "server.port",
                validator: |config| {
                    if config.server.port == 0 {
                        Err(anyhow::anyhow!("Server port cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
            },
            ValidationRule {
                field_path: "database.max_connections",
                validator: |config| {
                    if config.database.max_connections == 0 {
                        Err(anyhow::anyhow!("Database max connections cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
            },
            ValidationRule {
                field_path: "ranker",
                validator: |config| config.ranker.validate().map_err(anyhow::Error::from),
            },
            ValidationRule {
                field_path: "backend.timeout_secs",
                validator: |config| {
                    if config.backend.timeout_secs == 0 {
                        Err(anyhow::anyhow!("Backend timeout cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
            },
            ValidationRule {
                field_path: "backend.temperature",
                validator: |config| {
                    if (0.0..=2.0).contains(&config.backend.temperature) {
                        Ok(())
                    } else {
                        Err(anyhow::anyhow!(
                            "Backend temperature must be in [0, 2], got {}",
                            config.backend.temperature
                        ))
                    }
                },
            },
        ];

        Self { validation_rules }
    }

    /// 验证配置
    pub fn validate(&self, config: &TriageSystemConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("Configuration validation failed for {}: {}", rule.field_path, e);
                return Err(e.context(format!("Invalid configuration value: {}", rule.field_path)));
            }
        }

        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_defaults() {
        let manager = ConfigManager::load_with_env(None, &HashMap::new()).unwrap();
        let config = manager.config();

        assert_eq!(config.server.port, 5000);
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.backend.base_url, "https://api.deepseek.com");
        assert!(config.backend.api_key.is_none());
        assert_eq!(config.ranker.limit, 5);
        assert_eq!(config.ranker.threshold, 0.1);
        assert!(manager.config_path().is_none());
    }

    #[test]
    fn test_legacy_environment_variables() {
        let env = vars(&[
            ("DB_HOST", "pg.internal"),
            ("DB_PORT", "6543"),
            ("DB_PASSWORD", "secret"),
            ("DEEPSEEK_API_KEY", "sk-123"),
        ]);
        let config = ConfigManager::load_with_env(None, &env).unwrap().into_config();

        assert_eq!(config.database.host, "pg.internal");
        assert_eq!(config.database.port, 6543);
        assert_eq!(config.database.password, "secret");
        assert_eq!(config.database.user, "postgres");
        assert_eq!(config.backend.api_key.as_deref(), Some("sk-123"));
        assert!(config.backend.is_configured());
    }

    #[test]
    fn test_prefixed_environment_variables() {
        let env = vars(&[("PACS__RANKER__LIMIT", "3"), ("PACS__SERVER__PORT", "8081")]);
        let config = ConfigManager::load_with_env(None, &env).unwrap().into_config();

        assert_eq!(config.ranker.limit, 3);
        assert_eq!(config.server.port, 8081);
    }

    #[test]
    fn test_config_file_with_env_override() {
        let path = std::env::temp_dir().join(format!("pacs-triage-config-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[database]\nhost = \"file-host\"\nname = \"triage\"\n\n[ranker]\nthreshold = 0.2").unwrap();

        let env = vars(&[("DB_HOST", "env-host")]);
        let config = ConfigManager::load_with_env(path.to_str(), &env).unwrap().into_config();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.database.host, "env-host");
        assert_eq!(config.database.name, "triage");
        assert_eq!(config.ranker.threshold, 0.2);
    }

    #[test]
    fn test_validation_rules() {
        let validator = ConfigValidator::new();
        assert!(validator.validate(&TriageSystemConfig::default()).is_ok());

        let mut config = TriageSystemConfig::default();
        config.server.port = 0;
        assert!(validator.validate(&config).is_err());

        let mut config = TriageSystemConfig::default();
        config.ranker.limit = 0;
        assert!(validator.validate(&config).is_err());

        let mut config = TriageSystemConfig::default();
        config.backend.temperature = 3.0;
        assert!(validator.validate(&config).is_err());

        assert!(ConfigManager::load_with_env(None, &vars(&[("PACS__SERVER__PORT", "0")])).is_err());
    }
}
