// ==========================================
// 水产销售管理系统 - API层错误类型
// ==========================================
// 职责: 将各层技术错误转换为运维可读的错误消息
// ==========================================

use crate::config::ConfigError;
use crate::engine::SyncEngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 请求错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ==========================================
    // 同步触发错误
    // ==========================================
    #[error("同步已停用")]
    SyncDisabled,

    #[error("同步任务冲突: {0}")]
    SyncConflict(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 导入 / 导出错误
    // ==========================================
    #[error("表格读取失败: {0}")]
    ImportError(String),

    #[error("导出失败: {0}")]
    ExportError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::SyncLockHeld {
                lock_key,
                holder_job_id,
            } => ApiError::SyncConflict(format!(
                "表格 {} 正在被任务 {} 同步",
                lock_key, holder_job_id
            )),
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::DatabaseError(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::DatabaseError(format!("外键约束违反: {}", msg))
            }
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }
            RepositoryError::SerializationError(msg) => ApiError::InternalError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InternalError(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
        }
    }
}

// ==========================================
// 从 ConfigError 转换
// ==========================================
impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::UnknownKey(_) | ConfigError::InvalidValue { .. } => {
                ApiError::InvalidInput(err.to_string())
            }
            ConfigError::Storage(e) => e.into(),
        }
    }
}

// ==========================================
// 从 SyncEngineError 转换
// ==========================================
impl From<SyncEngineError> for ApiError {
    fn from(err: SyncEngineError) -> Self {
        match err {
            SyncEngineError::SyncDisabled => ApiError::SyncDisabled,
            SyncEngineError::MissingSheetId
            | SyncEngineError::UnknownEntityType(_)
            | SyncEngineError::UnsupportedMode(_) => ApiError::InvalidInput(err.to_string()),
            SyncEngineError::Repository(e) => e.into(),
            SyncEngineError::Import(e) => ApiError::ImportError(e.to_string()),
            SyncEngineError::Config(e) => e.into(),
        }
    }
}

impl From<csv::Error> for ApiError {
    fn from(err: csv::Error) -> Self {
        ApiError::ExportError(err.to_string())
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
