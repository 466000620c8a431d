// ==========================================
// 水产销售管理系统 - 同步任务领域模型
// ==========================================
// 职责: 同步任务 / 持久化错误 / 审计条目 / 计数汇总
// 红线: 任务记录只增不删（审计链）
// ==========================================

use crate::domain::sheet::ValidationError;
use crate::domain::types::{EntityType, ErrorKind, SyncMode, SyncStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 任务来源标签
pub const SOURCE_SPREADSHEET: &str = "spreadsheet";

// ==========================================
// SyncJob - 同步任务
// ==========================================
// 对齐: sync_jobs 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncJob {
    pub job_id: String,
    pub source: String,
    pub status: SyncStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub counts: SyncCounts,
    pub error_summary: ErrorSummary,
    pub error_message: Option<String>,
    pub triggered_by: Option<String>,
    pub metadata: SyncJobMetadata,
}

impl SyncJob {
    /// 新建 pending 任务
    pub fn pending(
        job_id: String,
        triggered_by: Option<String>,
        metadata: SyncJobMetadata,
    ) -> Self {
        Self {
            job_id,
            source: SOURCE_SPREADSHEET.to_string(),
            status: SyncStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            counts: SyncCounts::default(),
            error_summary: ErrorSummary::default(),
            error_message: None,
            triggered_by,
            metadata,
        }
    }
}

// ==========================================
// SyncJobMetadata - 任务元信息
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncJobMetadata {
    pub sheet_id: String,
    pub entity_types: Vec<EntityType>,
    pub mode: SyncMode,
}

// ==========================================
// SyncCounts - 计数汇总
// ==========================================
// 不变量: inserted + skipped + failed <= processed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounts {
    pub processed: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub customers_inserted: usize,
    pub batches_inserted: usize,
    pub orders_inserted: usize,
}

impl SyncCounts {
    pub fn record_inserted(&mut self, entity_type: EntityType) {
        self.inserted += 1;
        match entity_type {
            EntityType::Customers => self.customers_inserted += 1,
            EntityType::Batches => self.batches_inserted += 1,
            EntityType::Orders => self.orders_inserted += 1,
        }
    }

    pub fn inserted_for(&self, entity_type: EntityType) -> usize {
        match entity_type {
            EntityType::Customers => self.customers_inserted,
            EntityType::Batches => self.batches_inserted,
            EntityType::Orders => self.orders_inserted,
        }
    }
}

// ==========================================
// ErrorSummary - 错误汇总（按实体类型 / 错误类型）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub total: usize,
    pub by_entity: BTreeMap<String, usize>,
    pub by_kind: BTreeMap<String, usize>,
}

impl ErrorSummary {
    pub fn from_errors(errors: &[ValidationError]) -> Self {
        let mut summary = ErrorSummary::default();
        for e in errors {
            summary.total += 1;
            *summary
                .by_entity
                .entry(e.entity_type.as_str().to_string())
                .or_insert(0) += 1;
            *summary
                .by_kind
                .entry(e.error_kind.as_str().to_string())
                .or_insert(0) += 1;
        }
        summary
    }
}

// ==========================================
// SyncErrorRecord - 持久化的行级错误
// ==========================================
// 对齐: sync_errors 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncErrorRecord {
    pub error_id: String,
    pub job_id: String,
    pub row_number: usize,
    pub sheet_name: String,
    pub entity_type: EntityType,
    pub error_kind: ErrorKind,
    pub error_message: String,
    pub field_name: Option<String>,
    pub invalid_value: Option<String>,
    pub raw_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl SyncErrorRecord {
    pub fn from_validation_error(job_id: &str, error: ValidationError) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            job_id: job_id.to_string(),
            row_number: error.row_number,
            sheet_name: error.sheet_name,
            entity_type: error.entity_type,
            error_kind: error.error_kind,
            error_message: error.message,
            field_name: error.field_name,
            invalid_value: error.invalid_value,
            raw_data: error.raw_data,
            created_at: Utc::now(),
        }
    }
}

// ==========================================
// SyncAuditEntry - 插入审计
// ==========================================
// 对齐: sync_audit_log 表（实体 ↔ 源表行号 可追溯）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncAuditEntry {
    pub audit_id: String,
    pub job_id: String,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub row_number: usize,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
