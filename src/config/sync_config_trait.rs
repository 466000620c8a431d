// ==========================================
// 水产销售管理系统 - 同步配置读取 Trait
// ==========================================
// 职责: 定义同步编排器所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::sync_config::{ConfigResult, SyncSettings};
use async_trait::async_trait;

// ==========================================
// SyncConfigReader Trait
// ==========================================
// 用途: 每次触发/运行时读取一次完整配置
// 实现者: ConfigManager（环境变量默认值 + sync_config 表覆写）
#[async_trait]
pub trait SyncConfigReader: Send + Sync {
    /// 读取合并后的完整配置
    ///
    /// # 返回
    /// - SyncSettings: 覆写优先于环境变量默认值
    async fn load_settings(&self) -> ConfigResult<SyncSettings>;
}
