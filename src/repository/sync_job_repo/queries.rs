use super::core::SyncJobRepository;
use crate::domain::query::{ErrorQuery, JobQuery, Page, PageRequest};
use crate::domain::sync_job::{SyncAuditEntry, SyncCounts, SyncErrorRecord, SyncJob};
use crate::domain::types::{EntityType, ErrorKind, SyncStatus};
use crate::repository::error::RepositoryResult;
use crate::repository::row_mapping::{get_count, parse_enum, parse_json, parse_opt_ts, parse_ts};
use crate::repository::sql_builder::{build_count_sql, build_paged_sql, FilterBuilder};
use rusqlite::{params, params_from_iter, Result as SqliteResult, Row};

const JOB_COLUMNS: &str = r#"
    SELECT job_id, source, status, created_at, started_at, completed_at,
           records_processed, records_inserted, records_skipped, records_failed,
           customers_inserted, batches_inserted, orders_inserted,
           error_summary, error_message, triggered_by, metadata
    FROM sync_jobs"#;

const ERROR_COLUMNS: &str = r#"
    SELECT error_id, job_id, row_number, sheet_name, entity_type, error_kind,
           error_message, field_name, invalid_value, raw_data, created_at
    FROM sync_errors"#;

const AUDIT_COLUMNS: &str = r#"
    SELECT audit_id, job_id, entity_type, entity_id, row_number, data, created_at
    FROM sync_audit_log"#;

// 错误按同步顺序（客户 → 批次 → 订单）再按行号输出
const ERROR_ORDER: &str =
    "CASE entity_type WHEN 'customers' THEN 0 WHEN 'batches' THEN 1 ELSE 2 END, row_number ASC, rowid ASC";

impl SyncJobRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 job_id 查询单个任务
    pub fn find_by_id(&self, job_id: &str) -> RepositoryResult<Option<SyncJob>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE job_id = ?", JOB_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;

        match stmt.query_row(params![job_id], map_job_row) {
            Ok(job) => Ok(Some(job)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 分页查询历史任务
    pub fn list_jobs(&self, query: &JobQuery, page: PageRequest) -> RepositoryResult<Page<SyncJob>> {
        let conn = self.get_conn()?;

        let mut filter = FilterBuilder::new();
        filter
            .push_opt("status = ?", query.status.map(|s| s.as_str().to_string()))
            .push_opt("source = ?", query.source.clone())
            .push_opt("triggered_by = ?", query.triggered_by.clone());

        let total: i64 = conn.query_row(
            &build_count_sql("sync_jobs", &filter),
            params_from_iter(filter.params().iter()),
            |row| row.get(0),
        )?;

        // 次序键保证分页稳定
        let order_by = format!(
            "{} {}, job_id ASC",
            query.sort_by.column(),
            query.sort_dir.as_sql()
        );
        let sql = build_paged_sql(JOB_COLUMNS, &filter, &order_by);
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(
                params_from_iter(filter.paged_params(page.page_size, page.offset())),
                map_job_row,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(Page::new(items, total as usize, page))
    }

    /// 分页查询单任务的行级错误
    pub fn list_errors(
        &self,
        job_id: &str,
        query: &ErrorQuery,
        page: PageRequest,
    ) -> RepositoryResult<Page<SyncErrorRecord>> {
        let conn = self.get_conn()?;

        let mut filter = FilterBuilder::new();
        filter
            .push("job_id = ?", job_id.to_string())
            .push_opt("entity_type = ?", query.entity_type.map(|t| t.as_str().to_string()))
            .push_opt("error_kind = ?", query.error_kind.map(|k| k.as_str().to_string()))
            .push_opt("sheet_name = ?", query.sheet_name.clone());

        let total: i64 = conn.query_row(
            &build_count_sql("sync_errors", &filter),
            params_from_iter(filter.params().iter()),
            |row| row.get(0),
        )?;

        let sql = build_paged_sql(ERROR_COLUMNS, &filter, ERROR_ORDER);
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(
                params_from_iter(filter.paged_params(page.page_size, page.offset())),
                map_error_row,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(Page::new(items, total as usize, page))
    }

    /// 单任务全部行级错误（CSV 导出）
    pub fn list_all_errors(&self, job_id: &str) -> RepositoryResult<Vec<SyncErrorRecord>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE job_id = ? ORDER BY {}", ERROR_COLUMNS, ERROR_ORDER);
        let mut stmt = conn.prepare(&sql)?;

        let errors = stmt
            .query_map(params![job_id], map_error_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(errors)
    }

    /// 分页查询单任务的审计条目
    pub fn list_audit(&self, job_id: &str, page: PageRequest) -> RepositoryResult<Page<SyncAuditEntry>> {
        let conn = self.get_conn()?;

        let mut filter = FilterBuilder::new();
        filter.push("job_id = ?", job_id.to_string());

        let total: i64 = conn.query_row(
            &build_count_sql("sync_audit_log", &filter),
            params_from_iter(filter.params().iter()),
            |row| row.get(0),
        )?;

        let sql = build_paged_sql(AUDIT_COLUMNS, &filter, "rowid ASC");
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(
                params_from_iter(filter.paged_params(page.page_size, page.offset())),
                map_audit_row,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(Page::new(items, total as usize, page))
    }

    /// 当前锁持有者
    pub fn lock_holder(&self, lock_key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        match conn.query_row(
            "SELECT job_id FROM sync_locks WHERE lock_key = ?1",
            params![lock_key],
            |row| row.get(0),
        ) {
            Ok(holder) => Ok(Some(holder)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

// ==========================================
// 行映射
// ==========================================

fn map_job_row(row: &Row) -> SqliteResult<SyncJob> {
    let status: String = row.get(2)?;
    let created_at: String = row.get(3)?;
    let error_summary: String = row.get(13)?;
    let metadata: String = row.get(16)?;

    Ok(SyncJob {
        job_id: row.get(0)?,
        source: row.get(1)?,
        status: parse_enum(2, &status, SyncStatus::parse)?,
        created_at: parse_ts(3, &created_at)?,
        started_at: parse_opt_ts(4, row.get(4)?)?,
        completed_at: parse_opt_ts(5, row.get(5)?)?,
        counts: SyncCounts {
            processed: get_count(row, 6)?,
            inserted: get_count(row, 7)?,
            skipped: get_count(row, 8)?,
            failed: get_count(row, 9)?,
            customers_inserted: get_count(row, 10)?,
            batches_inserted: get_count(row, 11)?,
            orders_inserted: get_count(row, 12)?,
        },
        error_summary: parse_json(13, &error_summary)?,
        error_message: row.get(14)?,
        triggered_by: row.get(15)?,
        metadata: parse_json(16, &metadata)?,
    })
}

fn map_error_row(row: &Row) -> SqliteResult<SyncErrorRecord> {
    let entity_type: String = row.get(4)?;
    let error_kind: String = row.get(5)?;
    let raw_data: String = row.get(9)?;
    let created_at: String = row.get(10)?;

    Ok(SyncErrorRecord {
        error_id: row.get(0)?,
        job_id: row.get(1)?,
        row_number: get_count(row, 2)?,
        sheet_name: row.get(3)?,
        entity_type: parse_enum(4, &entity_type, EntityType::parse)?,
        error_kind: parse_enum(5, &error_kind, ErrorKind::parse)?,
        error_message: row.get(6)?,
        field_name: row.get(7)?,
        invalid_value: row.get(8)?,
        raw_data: parse_json(9, &raw_data)?,
        created_at: parse_ts(10, &created_at)?,
    })
}

fn map_audit_row(row: &Row) -> SqliteResult<SyncAuditEntry> {
    let entity_type: String = row.get(2)?;
    let data: String = row.get(5)?;
    let created_at: String = row.get(6)?;

    Ok(SyncAuditEntry {
        audit_id: row.get(0)?,
        job_id: row.get(1)?,
        entity_type: parse_enum(2, &entity_type, EntityType::parse)?,
        entity_id: row.get(3)?,
        row_number: get_count(row, 4)?,
        data: parse_json(5, &data)?,
        created_at: parse_ts(6, &created_at)?,
    })
}
