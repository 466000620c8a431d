// ==========================================
// 水产销售管理系统 - 引擎层错误类型
// ==========================================
// 职责: 触发阶段的拒绝原因（任务尚未创建）
// 说明: 任务创建后的失败一律写入任务台账，不经此类型返回
// ==========================================

use crate::config::ConfigError;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncEngineError {
    #[error("表格同步已停用")]
    SyncDisabled,

    #[error("未指定表格标识且未配置默认表格")]
    MissingSheetId,

    #[error("未知实体类型: {0}")]
    UnknownEntityType(String),

    #[error("不支持的导入模式: {0}（仅支持 insert_only）")]
    UnsupportedMode(String),

    #[error("仓储错误: {0}")]
    Repository(#[from] RepositoryError),

    #[error("导入错误: {0}")]
    Import(#[from] ImportError),

    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

pub type SyncEngineResult<T> = Result<T, SyncEngineError>;
