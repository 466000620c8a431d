use crate::domain::sync_job::{ErrorSummary, SyncAuditEntry, SyncCounts, SyncErrorRecord, SyncJob};
use crate::domain::types::SyncStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_mapping::ts_to_sql;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

// ==========================================
// JobCompletion - 终态落库参数
// ==========================================
#[derive(Debug, Clone)]
pub struct JobCompletion {
    pub status: SyncStatus,
    pub counts: SyncCounts,
    pub error_summary: ErrorSummary,
    pub error_message: Option<String>,
    pub errors: Vec<SyncErrorRecord>,
}

impl JobCompletion {
    /// 运行级致命错误（无行级错误记录）
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            status: SyncStatus::Failed,
            counts: SyncCounts::default(),
            error_summary: ErrorSummary::default(),
            error_message: Some(message.into()),
            errors: Vec::new(),
        }
    }
}

// ==========================================
// SyncJobRepository - 同步任务台账仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射与状态单调校验
pub struct SyncJobRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SyncJobRepository {
    /// 创建新的同步任务仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 任务生命周期
    // ==========================================

    /// 插入 pending 任务
    pub fn insert(&self, job: &SyncJob) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO sync_jobs (
                job_id, source, status, created_at, started_at, completed_at,
                records_processed, records_inserted, records_skipped, records_failed,
                customers_inserted, batches_inserted, orders_inserted,
                error_summary, error_message, triggered_by, metadata
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
            params![
                job.job_id,
                job.source,
                job.status.as_str(),
                ts_to_sql(&job.created_at),
                job.started_at.as_ref().map(ts_to_sql),
                job.completed_at.as_ref().map(ts_to_sql),
                job.counts.processed as i64,
                job.counts.inserted as i64,
                job.counts.skipped as i64,
                job.counts.failed as i64,
                job.counts.customers_inserted as i64,
                job.counts.batches_inserted as i64,
                job.counts.orders_inserted as i64,
                serde_json::to_string(&job.error_summary)?,
                job.error_message,
                job.triggered_by,
                serde_json::to_string(&job.metadata)?,
            ],
        )?;

        Ok(())
    }

    /// pending → running
    pub fn mark_running(&self, job_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::check_transition(&conn, job_id, SyncStatus::Running)?;

        conn.execute(
            "UPDATE sync_jobs SET status = ?1, started_at = ?2 WHERE job_id = ?3",
            params![SyncStatus::Running.as_str(), ts_to_sql(&Utc::now()), job_id],
        )?;
        debug!(job_id = %job_id, "任务进入 running");
        Ok(())
    }

    /// 终态落库: 行级错误 + 计数 + 状态，单事务提交
    ///
    /// # 返回
    /// - Err(InvalidStateTransition): 当前状态不允许进入目标终态
    pub fn finalize(&self, job_id: &str, completion: &JobCompletion) -> RepositoryResult<()> {
        if !completion.status.is_terminal() {
            return Err(RepositoryError::InvalidStateTransition {
                from: "?".to_string(),
                to: completion.status.as_str().to_string(),
            });
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        Self::check_transition(&tx, job_id, completion.status)?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO sync_errors (
                    error_id, job_id, row_number, sheet_name, entity_type, error_kind,
                    error_message, field_name, invalid_value, raw_data, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )?;
            for err in &completion.errors {
                stmt.execute(params![
                    err.error_id,
                    err.job_id,
                    err.row_number as i64,
                    err.sheet_name,
                    err.entity_type.as_str(),
                    err.error_kind.as_str(),
                    err.error_message,
                    err.field_name,
                    err.invalid_value,
                    err.raw_data.to_string(),
                    ts_to_sql(&err.created_at),
                ])?;
            }
        }

        let counts = &completion.counts;
        tx.execute(
            r#"
            UPDATE sync_jobs SET
                status = ?1, completed_at = ?2,
                records_processed = ?3, records_inserted = ?4,
                records_skipped = ?5, records_failed = ?6,
                customers_inserted = ?7, batches_inserted = ?8, orders_inserted = ?9,
                error_summary = ?10, error_message = ?11
            WHERE job_id = ?12
            "#,
            params![
                completion.status.as_str(),
                ts_to_sql(&Utc::now()),
                counts.processed as i64,
                counts.inserted as i64,
                counts.skipped as i64,
                counts.failed as i64,
                counts.customers_inserted as i64,
                counts.batches_inserted as i64,
                counts.orders_inserted as i64,
                serde_json::to_string(&completion.error_summary)?,
                completion.error_message,
                job_id,
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// 状态单调校验
    fn check_transition(
        conn: &Connection,
        job_id: &str,
        next: SyncStatus,
    ) -> RepositoryResult<SyncStatus> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT status FROM sync_jobs WHERE job_id = ?1",
                params![job_id],
                |row| row.get(0),
            )
            .optional()?;

        let raw = raw.ok_or_else(|| RepositoryError::NotFound {
            entity: "SyncJob".to_string(),
            id: job_id.to_string(),
        })?;
        let current = SyncStatus::parse(&raw).ok_or_else(|| RepositoryError::FieldValueError {
            field: "status".to_string(),
            message: raw.clone(),
        })?;

        if !current.can_transition_to(next) {
            return Err(RepositoryError::InvalidStateTransition {
                from: current.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        Ok(current)
    }

    // ==========================================
    // 运行互斥（按表格加咨询锁）
    // ==========================================

    /// 获取同步锁
    ///
    /// 以下情况视为陈旧锁，直接接管:
    /// - 持有者任务已终态（或已不存在）
    /// - 加锁时间早于 `stale_after` 之前（进程中断遗留）；此时持有者任务标记为 failed
    ///
    /// # 参数
    /// - lock_key: 锁键（表格标识）
    /// - job_id: 申请方任务
    /// - stale_after: 锁最长有效时长
    ///
    /// # 返回
    /// - Err(SyncLockHeld): 锁被其他未结束任务持有且未过期
    pub fn acquire_lock(
        &self,
        lock_key: &str,
        job_id: &str,
        stale_after: Duration,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = Utc::now();

        let holder: Option<(String, String)> = tx
            .query_row(
                "SELECT job_id, acquired_at FROM sync_locks WHERE lock_key = ?1",
                params![lock_key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        if let Some((holder, acquired_at)) = holder.filter(|(h, _)| h != job_id) {
            let holder_status: Option<String> = tx
                .query_row(
                    "SELECT status FROM sync_jobs WHERE job_id = ?1",
                    params![holder],
                    |row| row.get(0),
                )
                .optional()?;
            let active = holder_status
                .as_deref()
                .and_then(SyncStatus::parse)
                .is_some_and(|s| !s.is_terminal());

            // 无法解析的加锁时间按过期处理
            let expired = DateTime::parse_from_rfc3339(&acquired_at)
                .map(|ts| ts.with_timezone(&Utc) + stale_after < now)
                .unwrap_or(true);

            if active && !expired {
                return Err(RepositoryError::SyncLockHeld {
                    lock_key: lock_key.to_string(),
                    holder_job_id: holder,
                });
            }

            if active {
                tx.execute(
                    r#"
                    UPDATE sync_jobs SET status = ?1, completed_at = ?2, error_message = ?3
                    WHERE job_id = ?4 AND status IN (?5, ?6)
                    "#,
                    params![
                        SyncStatus::Failed.as_str(),
                        ts_to_sql(&now),
                        format!("运行中断: 同步锁自 {} 起未释放，已被任务 {} 接管", acquired_at, job_id),
                        holder,
                        SyncStatus::Pending.as_str(),
                        SyncStatus::Running.as_str(),
                    ],
                )?;
                warn!(lock_key = %lock_key, orphaned_job = %holder, acquired_at = %acquired_at, "同步锁已过期，原任务标记为 failed");
            } else {
                warn!(lock_key = %lock_key, stale_holder = %holder, "接管陈旧同步锁");
            }
        }

        tx.execute(
            r#"
            INSERT INTO sync_locks (lock_key, job_id, acquired_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(lock_key) DO UPDATE SET
                job_id = excluded.job_id,
                acquired_at = excluded.acquired_at
            "#,
            params![lock_key, job_id, ts_to_sql(&now)],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// 释放同步锁（仅释放本任务持有的锁）
    pub fn release_lock(&self, lock_key: &str, job_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM sync_locks WHERE lock_key = ?1 AND job_id = ?2",
            params![lock_key, job_id],
        )?;
        Ok(rows > 0)
    }

    // ==========================================
    // 审计
    // ==========================================

    /// 在行事务中写入审计条目
    pub fn insert_audit_tx(tx: &Transaction, entry: &SyncAuditEntry) -> RepositoryResult<()> {
        tx.execute(
            r#"
            INSERT INTO sync_audit_log (
                audit_id, job_id, entity_type, entity_id, row_number, data, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                entry.audit_id,
                entry.job_id,
                entry.entity_type.as_str(),
                entry.entity_id,
                entry.row_number as i64,
                entry.data.to_string(),
                ts_to_sql(&entry.created_at),
            ],
        )?;
        Ok(())
    }
}
