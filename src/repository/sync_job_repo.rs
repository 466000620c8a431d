// ==========================================
// 水产销售管理系统 - 同步任务台账仓储
// ==========================================
// 对齐: sync_jobs / sync_errors / sync_audit_log / sync_locks 表
// 红线: 任务记录只增不删；状态单调
// ==========================================

mod core;
mod queries;


pub use core::{JobCompletion, SyncJobRepository};
