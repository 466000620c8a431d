// ==========================================
// 水产销售管理系统 - 单行事务同步
// ==========================================
// 职责: 一行一事务: 查重 → 引用解析 → 插入 → 审计
// 红线: 任何失败只回滚本行事务；绝不开启跨行事务
// ==========================================

use crate::domain::draft::{BatchDraft, CustomerDraft, OrderDraft};
use crate::domain::sheet::{ParsedRow, ValidationError};
use crate::domain::sync_job::SyncAuditEntry;
use crate::domain::types::{EntityType, ErrorKind};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{SyncJobRepository, TargetStoreRepository};
use crate::validation::ValidRow;
use chrono::Utc;
use rusqlite::{Connection, Transaction};
use serde::Serialize;
use tracing::{debug, warn};

// ==========================================
// RowStep - 事务内判定结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum RowStep {
    /// 已插入（待写审计并提交）
    Inserted {
        entity_id: String,
        snapshot: serde_json::Value,
    },
    /// 自然键已存在（客户 / 批次，上报 duplicate）
    Duplicate { field: &'static str, key: String },
    /// 自然键已存在（订单，静默跳过）
    SilentSkip,
    /// 引用的客户 / 批次不存在
    MissingReference { field: &'static str, value: String },
}

// ==========================================
// RowOutcome - 单行最终结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Inserted { entity_id: String },
    /// 计入 skipped，并附 duplicate 错误
    Duplicate(ValidationError),
    /// 计入 skipped，无错误记录
    Skipped,
    /// 计入 failed（missing_reference / database_error）
    Failed(ValidationError),
}

// ==========================================
// SyncTarget Trait - 可落库的实体草稿
// ==========================================
// 实现者: CustomerDraft / BatchDraft / OrderDraft
pub trait SyncTarget: Serialize {
    fn entity_type() -> EntityType;

    /// 在行事务内执行查重、引用解析与插入（不提交）
    fn apply_tx(&self, tx: &Transaction) -> RepositoryResult<RowStep>;
}

fn snapshot_of<T: Serialize>(draft: &T) -> RepositoryResult<serde_json::Value> {
    Ok(serde_json::to_value(draft)?)
}

impl SyncTarget for CustomerDraft {
    fn entity_type() -> EntityType {
        EntityType::Customers
    }

    fn apply_tx(&self, tx: &Transaction) -> RepositoryResult<RowStep> {
        if let Some(email) = &self.email {
            if TargetStoreRepository::find_customer_by_email_tx(tx, email)?.is_some() {
                return Ok(RowStep::Duplicate {
                    field: "email",
                    key: email.clone(),
                });
            }
        }

        match TargetStoreRepository::insert_customer_tx(tx, self) {
            Ok(entity_id) => Ok(RowStep::Inserted {
                entity_id,
                snapshot: snapshot_of(self)?,
            }),
            // 并发写入者抢先插入同一邮箱
            Err(e) if e.is_unique_violation() && self.email.is_some() => Ok(RowStep::Duplicate {
                field: "email",
                key: self.email.clone().unwrap_or_default(),
            }),
            Err(e) => Err(e),
        }
    }
}

impl SyncTarget for BatchDraft {
    fn entity_type() -> EntityType {
        EntityType::Batches
    }

    fn apply_tx(&self, tx: &Transaction) -> RepositoryResult<RowStep> {
        if TargetStoreRepository::find_batch_by_code_tx(tx, &self.batch_code)?.is_some() {
            return Ok(RowStep::Duplicate {
                field: "batch_code",
                key: self.batch_code.clone(),
            });
        }

        match TargetStoreRepository::insert_batch_tx(tx, self) {
            Ok(entity_id) => Ok(RowStep::Inserted {
                entity_id,
                snapshot: snapshot_of(self)?,
            }),
            Err(e) if e.is_unique_violation() => Ok(RowStep::Duplicate {
                field: "batch_code",
                key: self.batch_code.clone(),
            }),
            Err(e) => Err(e),
        }
    }
}

impl SyncTarget for OrderDraft {
    fn entity_type() -> EntityType {
        EntityType::Orders
    }

    fn apply_tx(&self, tx: &Transaction) -> RepositoryResult<RowStep> {
        let Some(customer_id) = TargetStoreRepository::find_customer_by_email_tx(tx, &self.customer_email)?
        else {
            return Ok(RowStep::MissingReference {
                field: "customer_email",
                value: self.customer_email.clone(),
            });
        };

        if TargetStoreRepository::find_order_by_natural_key_tx(tx, &customer_id, self)?.is_some() {
            return Ok(RowStep::SilentSkip);
        }

        let batch_id = match &self.batch_code {
            Some(code) => match TargetStoreRepository::find_batch_by_code_tx(tx, code)? {
                Some(id) => Some(id),
                None => {
                    return Ok(RowStep::MissingReference {
                        field: "broodstock_batch_code",
                        value: code.clone(),
                    })
                }
            },
            None => None,
        };

        let inserted =
            match TargetStoreRepository::insert_order_tx(tx, self, &customer_id, batch_id.as_deref()) {
                Ok(inserted) => inserted,
                // 自然键唯一索引冲突（并发写入者）
                Err(RepositoryError::UniqueConstraintViolation(msg)) if !msg.contains("order_number") => {
                    return Ok(RowStep::SilentSkip)
                }
                Err(e) => return Err(e),
            };

        let mut snapshot = snapshot_of(self)?;
        if let Some(map) = snapshot.as_object_mut() {
            map.insert("customer_id".to_string(), customer_id.into());
            map.insert("batch_id".to_string(), batch_id.into());
            map.insert("order_number".to_string(), inserted.order_number.into());
            map.insert("total_value".to_string(), inserted.total_value.into());
        }

        Ok(RowStep::Inserted {
            entity_id: inserted.order_id,
            snapshot,
        })
    }
}

/// 同步单行（独立事务）
///
/// # 参数
/// - conn: 本次运行持有的连接（跨行复用，事务按行划分）
/// - job_id: 所属任务
/// - sheet_name: 来源工作表名
/// - valid: 校验通过的行
///
/// # 返回
/// - 行结果；数据库层失败归类为 database_error，不向外抛出
pub fn sync_row<D: SyncTarget>(
    conn: &mut Connection,
    job_id: &str,
    sheet_name: &str,
    valid: &ValidRow<D>,
) -> RowOutcome {
    let entity_type = D::entity_type();
    match run_row_tx(conn, job_id, valid) {
        Ok(RowStep::Inserted { entity_id, .. }) => {
            debug!(
                job_id = %job_id,
                entity_type = %entity_type,
                row_number = valid.row.row_number,
                entity_id = %entity_id,
                "行已插入"
            );
            RowOutcome::Inserted { entity_id }
        }
        Ok(RowStep::Duplicate { field, key }) => RowOutcome::Duplicate(
            ValidationError::new(
                &valid.row,
                sheet_name,
                entity_type,
                ErrorKind::Duplicate,
                format!("{} 已存在: {}", field, key),
            )
            .with_field(field)
            .with_value(Some(key)),
        ),
        Ok(RowStep::SilentSkip) => {
            debug!(
                job_id = %job_id,
                row_number = valid.row.row_number,
                "订单已存在，跳过"
            );
            RowOutcome::Skipped
        }
        Ok(RowStep::MissingReference { field, value }) => {
            let message = match field {
                "customer_email" => format!("客户不存在: {}", value),
                _ => format!("种苗批次不存在: {}", value),
            };
            RowOutcome::Failed(
                ValidationError::new(&valid.row, sheet_name, entity_type, ErrorKind::MissingReference, message)
                    .with_field(field)
                    .with_value(Some(value)),
            )
        }
        Err(e) => {
            warn!(
                job_id = %job_id,
                entity_type = %entity_type,
                row_number = valid.row.row_number,
                error = %e,
                "行事务失败，已回滚"
            );
            RowOutcome::Failed(database_error(&valid.row, sheet_name, entity_type, &e))
        }
    }
}

/// 行事务: 仅在插入成功时提交；其他分支随事务析构回滚
fn run_row_tx<D: SyncTarget>(
    conn: &mut Connection,
    job_id: &str,
    valid: &ValidRow<D>,
) -> RepositoryResult<RowStep> {
    let tx = conn.transaction()?;
    let step = valid.draft.apply_tx(&tx)?;

    if let RowStep::Inserted { entity_id, snapshot } = &step {
        let entry = SyncAuditEntry {
            audit_id: uuid::Uuid::new_v4().to_string(),
            job_id: job_id.to_string(),
            entity_type: D::entity_type(),
            entity_id: entity_id.clone(),
            row_number: valid.row.row_number,
            data: snapshot.clone(),
            created_at: Utc::now(),
        };
        SyncJobRepository::insert_audit_tx(&tx, &entry)?;
        tx.commit()?;
    }
    Ok(step)
}

fn database_error(
    row: &ParsedRow,
    sheet_name: &str,
    entity_type: EntityType,
    err: &RepositoryError,
) -> ValidationError {
    ValidationError::new(row, sheet_name, entity_type, ErrorKind::DatabaseError, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::CustomerStatus;
    use crate::validation::test_support::row;
    use chrono::NaiveDate;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        for job_id in ["job-1", "job-2"] {
            conn.execute(
                "INSERT INTO sync_jobs (job_id, source, status, created_at) VALUES (?1, 'spreadsheet', 'running', '2024-05-01T00:00:00Z')",
                [job_id],
            )
            .unwrap();
        }
        conn
    }

    fn customer(email: &str) -> ValidRow<CustomerDraft> {
        ValidRow {
            row: row(2, &[("name", "Acme Corp"), ("email", email)]),
            draft: CustomerDraft {
                row_number: 2,
                name: "Acme Corp".to_string(),
                primary_contact_name: "Jane".to_string(),
                email: Some(email.to_string()),
                primary_contact_phone: None,
                address: None,
                country: None,
                province: None,
                district: None,
                latitude: None,
                longitude: None,
                status: CustomerStatus::Active,
                credentials: Vec::new(),
            },
        }
    }

    fn order(email: &str, batch_code: Option<&str>) -> ValidRow<OrderDraft> {
        ValidRow {
            row: row(3, &[("customer_email", email)]),
            draft: OrderDraft {
                row_number: 3,
                customer_email: email.to_string(),
                batch_code: batch_code.map(str::to_string),
                order_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                species: "Penaeus monodon".to_string(),
                strain: None,
                quantity: 10,
                unit_price: 3.0,
                unit: "piece".to_string(),
                unit_price_currency: None,
                total_value_currency: None,
                packaging_type: None,
                shipment_date: None,
                shipment_status: None,
                quality_flag: None,
                mortality_reported: None,
                notes: None,
            },
        }
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_customer_insert_then_duplicate() {
        let mut conn = setup();
        let first = sync_row(&mut conn, "job-1", "Customers", &customer("a@acme.com"));
        assert!(matches!(first, RowOutcome::Inserted { .. }));
        assert_eq!(count(&conn, "sync_audit_log"), 1);

        let second = sync_row(&mut conn, "job-1", "Customers", &customer("A@ACME.com"));
        match second {
            RowOutcome::Duplicate(err) => {
                assert_eq!(err.error_kind, ErrorKind::Duplicate);
                assert_eq!(err.field_name.as_deref(), Some("email"));
                assert_eq!(err.invalid_value.as_deref(), Some("A@ACME.com"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(count(&conn, "customers"), 1);
        assert_eq!(count(&conn, "sync_audit_log"), 1);
    }

    #[test]
    fn test_order_missing_customer_rolls_back() {
        let mut conn = setup();
        let outcome = sync_row(&mut conn, "job-1", "Orders", &order("ghost@x.com", None));
        match outcome {
            RowOutcome::Failed(err) => {
                assert_eq!(err.error_kind, ErrorKind::MissingReference);
                assert_eq!(err.field_name.as_deref(), Some("customer_email"));
                assert_eq!(err.invalid_value.as_deref(), Some("ghost@x.com"));
                assert_eq!(err.row_number, 3);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(count(&conn, "orders"), 0);
    }

    #[test]
    fn test_order_missing_batch() {
        let mut conn = setup();
        sync_row(&mut conn, "job-1", "Customers", &customer("a@acme.com"));
        let outcome = sync_row(&mut conn, "job-1", "Orders", &order("a@acme.com", Some("BS-404")));
        match outcome {
            RowOutcome::Failed(err) => {
                assert_eq!(err.error_kind, ErrorKind::MissingReference);
                assert_eq!(err.field_name.as_deref(), Some("broodstock_batch_code"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        // 序列号未被消耗
        let seq: i64 = conn
            .query_row("SELECT value FROM sequences WHERE name = 'order_number'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(seq, 0);
    }

    #[test]
    fn test_order_insert_then_silent_skip() {
        let mut conn = setup();
        sync_row(&mut conn, "job-1", "Customers", &customer("a@acme.com"));

        let first = sync_row(&mut conn, "job-1", "Orders", &order("a@acme.com", None));
        assert!(matches!(first, RowOutcome::Inserted { .. }));
        let second = sync_row(&mut conn, "job-2", "Orders", &order("a@acme.com", None));
        assert_eq!(second, RowOutcome::Skipped);

        let (number, total): (String, f64) = conn
            .query_row("SELECT order_number, total_value FROM orders", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(number, "ORD-202405-000001");
        assert_eq!(total, 30.0);

        let audit: String = conn
            .query_row(
                "SELECT data FROM sync_audit_log WHERE entity_type = 'orders'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert!(audit.contains("ORD-202405-000001"));
    }
}
