// ==========================================
// 水产销售管理系统 - 配置层
// ==========================================
// 职责: 同步配置管理,支持环境变量默认值 + 运行时覆写
// 存储: sync_config 表
// ==========================================

pub mod config_manager;
pub mod sync_config;
pub mod sync_config_trait;

// 重导出核心配置管理器
pub use config_manager::ConfigManager;
pub use sync_config::{config_keys, mask_secret, ConfigError, ConfigResult, SyncSettings};
pub use sync_config_trait::SyncConfigReader;
