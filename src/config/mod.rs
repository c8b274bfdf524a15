// ==========================================
// 设备预防性维护排程系统 - 配置层
// ==========================================
// 职责: 排程参数读取与校验
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod scheduler_config;
pub mod scheduler_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use scheduler_config::{ConfigError, SchedulerConfig};
pub use scheduler_config_trait::{ConfigReadResult, SchedulerConfigReader};
