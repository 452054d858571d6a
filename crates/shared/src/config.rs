//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Kafka 配置
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaConfig {
    pub brokers: String,
    pub consumer_group: String,
    pub auto_offset_reset: String,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            consumer_group: "npc-shop-service".to_string(),
            auto_offset_reset: "earliest".to_string(),
        }
    }
}

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// 日志输出格式：json（结构化）或 pretty（人类可读）
    pub log_format: String,
    pub metrics_enabled: bool,
    pub metrics_port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_port: 9090,
        }
    }
}

impl ObservabilityConfig {
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// 下游 REST 服务地址
///
/// 地址以 `/` 结尾，资源路径直接拼接在后面。
#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    pub characters_url: String,
    pub data_url: String,
    pub skills_url: String,
    pub request_timeout_ms: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            characters_url: "http://localhost:8080/api/".to_string(),
            data_url: "http://localhost:8081/api/".to_string(),
            skills_url: "http://localhost:8082/api/".to_string(),
            request_timeout_ms: 3000,
        }
    }
}

impl ServicesConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub kafka: KafkaConfig,
    pub observability: ObservabilityConfig,
    pub services: ServicesConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（NPC_ 前缀，层级用双下划线，如 NPC_KAFKA__BROKERS -> kafka.brokers）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("NPC_ENV").unwrap_or_else(|_| "development".to_string());

        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env.clone())?
            .add_source(File::from(Path::new(&config_dir).join("default.toml")).required(false))
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{}.toml", env))).required(false),
            )
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{}.toml", service_name)))
                    .required(false),
            )
            // 环境变量覆盖（NPC_KAFKA__BROKERS -> kafka.brokers）
            .add_source(
                Environment::with_prefix("NPC")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.observability.metrics_port, 9090);
        assert_eq!(config.kafka.consumer_group, "npc-shop-service");
        assert_eq!(config.services.request_timeout(), Duration::from_millis(3000));
    }

    #[test]
    fn test_json_logs_flag() {
        let mut observability = ObservabilityConfig::default();
        assert!(!observability.json_logs());

        observability.log_format = "JSON".to_string();
        assert!(observability.json_logs());
    }

    #[test]
    fn test_load_without_files_uses_defaults() {
        // SAFETY: 测试中仅设置一个不存在的目录，不影响其他用例读取的变量
        unsafe {
            std::env::set_var("CONFIG_DIR", "/nonexistent-npc-config");
        }

        let config = AppConfig::load("npc-shop-service").expect("加载配置失败");
        assert_eq!(config.service_name, "npc-shop-service");
        assert_eq!(config.kafka.brokers, "localhost:9092");
    }
}
