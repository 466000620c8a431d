// ==========================================
// 水产销售管理系统 - 领域模型层
// ==========================================
// 职责: 定义同步管道的实体、类型与草稿
// 红线: 不含数据访问逻辑,不含编排逻辑
// ==========================================

pub mod draft;
pub mod query;
pub mod sheet;
pub mod sync_job;
pub mod types;

// 重导出核心类型
pub use draft::{BatchDraft, CredentialDraft, CustomerDraft, OrderDraft};
pub use query::{ErrorQuery, JobQuery, JobSortKey, Page, PageRequest, SortDirection};
pub use sheet::{CellValue, FieldMap, ParsedRow, ValidationError};
pub use sync_job::{
    ErrorSummary, SyncAuditEntry, SyncCounts, SyncErrorRecord, SyncJob, SyncJobMetadata,
};
pub use types::{CustomerStatus, EntityType, ErrorKind, SyncMode, SyncStatus};
