// ==========================================
// 水产销售管理系统 - 引擎层
// ==========================================
// 职责: 同步任务编排、逐行事务落库
// 红线: Engine 不拼 SQL，数据访问一律经由 Repository
// ==========================================

pub mod error;
pub mod repositories;
pub mod row_sync;
pub mod sync_orchestrator;

// 重导出核心引擎
pub use error::{SyncEngineError, SyncEngineResult};
pub use repositories::SyncRepositories;
pub use row_sync::{sync_row, RowOutcome, RowStep, SyncTarget};
pub use sync_orchestrator::{resolve_entity_types, SyncOrchestrator, SyncRequest, TriggeredSync};
