// ==========================================
// 水产销售管理系统 - API 层
// ==========================================
// 职责: 面向运维的同步操作接口（命令行 / 上层服务调用）
// ==========================================

pub mod error;
pub mod sync_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use sync_api::{ConfigView, JobErrorsRequest, JobHistoryRequest, SyncApi, ERROR_CSV_HEADERS};
