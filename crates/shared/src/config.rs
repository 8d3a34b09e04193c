//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::observability::ObservabilityConfig;

/// 服务监听配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// 外部协作方服务端点
///
/// 结算核心只依赖这四个下游：商品目录（库存）、订单、会员账本与购物车。
/// 具体传输为 REST，地址通过配置注入，便于在本地指向 mock-services。
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceEndpoints {
    pub catalog_url: String,
    pub order_url: String,
    pub membership_url: String,
    pub cart_url: String,
    /// 单次下游调用的超时时间，超时按该步骤的失败类型处理
    pub request_timeout_seconds: u64,
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self {
            catalog_url: "http://localhost:9101".to_string(),
            order_url: "http://localhost:9102".to_string(),
            membership_url: "http://localhost:9103".to_string(),
            cart_url: "http://localhost:9104".to_string(),
            request_timeout_seconds: 10,
        }
    }
}

/// 会员等级门槛配置
///
/// 门槛是运营配置而非硬编码常量，但加载后仍需满足 0 < silver < gold 的次序约束，
/// 校验由 membership 包的 TierSchedule 构造函数完成。
#[derive(Debug, Clone, Deserialize)]
pub struct MembershipConfig {
    pub silver_threshold: f64,
    pub gold_threshold: f64,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            silver_threshold: 2000.0,
            gold_threshold: 4000.0,
        }
    }
}

/// 后台对账任务配置
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcilerConfig {
    /// 扫描待补偿残留的间隔
    pub interval_seconds: u64,
    /// 单个残留的最大重试次数，超过后告警并放弃
    pub max_retries: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 30,
            max_retries: 5,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub server: ServerConfig,
    pub services: ServiceEndpoints,
    pub membership: MembershipConfig,
    pub reconciler: ReconcilerConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（STOREFRONT_ 前缀，如 STOREFRONT_SERVER_PORT -> server.port）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("STOREFRONT_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env.clone())?
            .add_source(File::from(Path::new(&config_dir).join("default.toml")).required(false))
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{env}.toml"))).required(false),
            )
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{service_name}.toml")))
                    .required(false),
            )
            .add_source(
                Environment::with_prefix("STOREFRONT")
                    .separator("_")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 获取服务监听地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.services.request_timeout_seconds, 10);
        assert_eq!(config.reconciler.max_retries, 5);
    }

    #[test]
    fn test_default_membership_thresholds() {
        let config = MembershipConfig::default();
        assert_eq!(config.silver_threshold, 2000.0);
        assert_eq!(config.gold_threshold, 4000.0);
        assert!(config.silver_threshold < config.gold_threshold);
    }

    #[test]
    fn test_server_addr() {
        let config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            ..Default::default()
        };
        assert_eq!(config.server_addr(), "127.0.0.1:3000");
    }

    #[test]
    fn test_is_production() {
        let mut config = AppConfig::default();
        assert!(!config.is_production());
        config.environment = "production".to_string();
        assert!(config.is_production());
    }
}
