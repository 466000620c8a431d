// ==========================================
// 水产销售管理系统 - 目标存储仓储（客户 / 批次 / 订单）
// ==========================================
// 职责: 行事务内的自然键查重、引用解析与插入
// 约定: 所有 *_tx 函数只在调用方持有的行事务内执行，不自行提交
// ==========================================

use crate::domain::draft::{BatchDraft, CustomerDraft, OrderDraft};
use crate::domain::types::EntityType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_mapping::ts_to_sql;
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

/// 订单号序列名
pub const ORDER_NUMBER_SEQUENCE: &str = "order_number";

/// 订单号冲突重试次数
pub const ORDER_NUMBER_MAX_ATTEMPTS: usize = 3;

/// 已插入订单
#[derive(Debug, Clone, PartialEq)]
pub struct InsertedOrder {
    pub order_id: String,
    pub order_number: String,
    pub total_value: f64,
}

// ==========================================
// TargetStoreRepository
// ==========================================
pub struct TargetStoreRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TargetStoreRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接（调用方据此开启行事务）
    pub fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 各实体表行数
    pub fn count(&self, entity_type: EntityType) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let table = match entity_type {
            EntityType::Customers => "customers",
            EntityType::Batches => "broodstock_batches",
            EntityType::Orders => "orders",
        };
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?;
        Ok(n as usize)
    }

    // ==========================================
    // 自然键查找
    // ==========================================

    /// 按邮箱查客户（大小写不敏感）
    pub fn find_customer_by_email_tx(tx: &Transaction, email: &str) -> RepositoryResult<Option<String>> {
        let id = tx
            .query_row(
                "SELECT customer_id FROM customers WHERE lower(email) = lower(?1) LIMIT 1",
                params![email.trim()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// 按批次编码查批次（精确匹配）
    pub fn find_batch_by_code_tx(tx: &Transaction, batch_code: &str) -> RepositoryResult<Option<String>> {
        let id = tx
            .query_row(
                "SELECT batch_id FROM broodstock_batches WHERE batch_code = ?1",
                params![batch_code],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// 按复合自然键查订单（客户 + 下单日期 + 品种 + 数量 + 单价）
    pub fn find_order_by_natural_key_tx(
        tx: &Transaction,
        customer_id: &str,
        draft: &OrderDraft,
    ) -> RepositoryResult<Option<String>> {
        let id = tx
            .query_row(
                r#"
                SELECT order_id FROM orders
                WHERE customer_id = ?1 AND order_date = ?2 AND species = ?3
                  AND quantity = ?4 AND unit_price = ?5
                LIMIT 1
                "#,
                params![
                    customer_id,
                    draft.order_date,
                    draft.species,
                    draft.quantity,
                    draft.unit_price
                ],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    // ==========================================
    // 插入
    // ==========================================

    /// 插入客户及其资质
    pub fn insert_customer_tx(tx: &Transaction, draft: &CustomerDraft) -> RepositoryResult<String> {
        let customer_id = uuid::Uuid::new_v4().to_string();
        let now = ts_to_sql(&Utc::now());

        tx.execute(
            r#"
            INSERT INTO customers (
                customer_id, name, primary_contact_name, email, primary_contact_phone,
                address, country, province, district, latitude, longitude, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                customer_id,
                draft.name,
                draft.primary_contact_name,
                draft.email,
                draft.primary_contact_phone,
                draft.address,
                draft.country,
                draft.province,
                draft.district,
                draft.latitude,
                draft.longitude,
                draft.status.as_str(),
                now,
            ],
        )?;

        if !draft.credentials.is_empty() {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO customer_credentials (
                    credential_id, customer_id, credential_type, credential_number,
                    issued_date, expiry_date, file_url, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;
            for cred in &draft.credentials {
                stmt.execute(params![
                    uuid::Uuid::new_v4().to_string(),
                    customer_id,
                    cred.credential_type,
                    cred.credential_number,
                    cred.issued_date,
                    cred.expiry_date,
                    cred.file_url,
                    now,
                ])?;
            }
        }

        Ok(customer_id)
    }

    /// 插入种苗批次
    pub fn insert_batch_tx(tx: &Transaction, draft: &BatchDraft) -> RepositoryResult<String> {
        let batch_id = uuid::Uuid::new_v4().to_string();

        tx.execute(
            r#"
            INSERT INTO broodstock_batches (
                batch_id, batch_code, hatchery_origin, grade, arrival_date,
                available_quantity, initial_quantity, species, strain, age_weeks,
                weight_grams, health_status, quarantine_status, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                batch_id,
                draft.batch_code,
                draft.hatchery_origin,
                draft.grade,
                draft.arrival_date,
                draft.available_quantity,
                draft.initial_quantity,
                draft.species,
                draft.strain,
                draft.age_weeks,
                draft.weight_grams,
                draft.health_status,
                draft.quarantine_status,
                draft.notes,
                ts_to_sql(&Utc::now()),
            ],
        )?;

        Ok(batch_id)
    }

    /// 取下一个订单号（原子自增序列）
    ///
    /// 格式: ORD-YYYYMM-NNNNNN（年月取下单日期，序号全局递增）
    pub fn next_order_number_tx(tx: &Transaction, order_date: NaiveDate) -> RepositoryResult<String> {
        let value: i64 = tx.query_row(
            "UPDATE sequences SET value = value + 1 WHERE name = ?1 RETURNING value",
            params![ORDER_NUMBER_SEQUENCE],
            |row| row.get(0),
        )?;
        Ok(format_order_number(order_date, value))
    }

    /// 插入订单（总额 = 数量 × 单价；订单号冲突时重取）
    pub fn insert_order_tx(
        tx: &Transaction,
        draft: &OrderDraft,
        customer_id: &str,
        batch_id: Option<&str>,
    ) -> RepositoryResult<InsertedOrder> {
        let order_id = uuid::Uuid::new_v4().to_string();
        let total_value = draft.total_value();
        let now = ts_to_sql(&Utc::now());

        let mut attempt = 0;
        loop {
            attempt += 1;
            let order_number = Self::next_order_number_tx(tx, draft.order_date)?;

            let result = tx.execute(
                r#"
                INSERT INTO orders (
                    order_id, order_number, customer_id, batch_id, order_date, species, strain,
                    quantity, unit_price, unit, unit_price_currency, total_value,
                    total_value_currency, packaging_type, shipment_date, shipment_status,
                    quality_flag, mortality_reported, notes, created_at
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                    ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20
                )
                "#,
                params![
                    order_id,
                    order_number,
                    customer_id,
                    batch_id,
                    draft.order_date,
                    draft.species,
                    draft.strain,
                    draft.quantity,
                    draft.unit_price,
                    draft.unit,
                    draft.unit_price_currency,
                    total_value,
                    draft.total_value_currency,
                    draft.packaging_type,
                    draft.shipment_date,
                    draft.shipment_status,
                    draft.quality_flag,
                    draft.mortality_reported,
                    draft.notes,
                    now,
                ],
            );

            match result.map_err(RepositoryError::from) {
                Ok(_) => {
                    return Ok(InsertedOrder {
                        order_id,
                        order_number,
                        total_value,
                    })
                }
                Err(RepositoryError::UniqueConstraintViolation(msg))
                    if msg.contains("order_number") && attempt < ORDER_NUMBER_MAX_ATTEMPTS =>
                {
                    warn!(order_number = %order_number, attempt, "订单号冲突，重新取号");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// 订单号格式化
pub fn format_order_number(order_date: NaiveDate, sequence: i64) -> String {
    format!("ORD-{}-{:06}", order_date.format("%Y%m"), sequence)
}
