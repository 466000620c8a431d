// ==========================================
// 水产销售管理系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键 + busy_timeout）
// - 幂等建表：同步台账表 + 目标存储表（客户/资质/批次/订单/序列）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::path::PathBuf;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 应用数据目录名
pub const APP_DIR_NAME: &str = "aqua-sheet-sync";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开连接并确保 schema 就绪
pub fn open_and_init(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = open_sqlite_connection(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// 默认数据库路径: <数据目录>/aqua-sheet-sync/sync.db
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join("sync.db")
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 幂等建表
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

-- ===== 目标存储 =====
CREATE TABLE IF NOT EXISTS customers (
    customer_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    primary_contact_name TEXT NOT NULL,
    email TEXT,
    primary_contact_phone TEXT,
    address TEXT,
    country TEXT,
    province TEXT,
    district TEXT,
    latitude REAL,
    longitude REAL,
    status TEXT NOT NULL DEFAULT 'active',
    created_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS ux_customers_email
    ON customers(lower(email)) WHERE email IS NOT NULL;

CREATE TABLE IF NOT EXISTS customer_credentials (
    credential_id TEXT PRIMARY KEY,
    customer_id TEXT NOT NULL REFERENCES customers(customer_id),
    credential_type TEXT NOT NULL,
    credential_number TEXT NOT NULL,
    issued_date TEXT NOT NULL,
    expiry_date TEXT NOT NULL,
    file_url TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_credentials_customer ON customer_credentials(customer_id);

CREATE TABLE IF NOT EXISTS broodstock_batches (
    batch_id TEXT PRIMARY KEY,
    batch_code TEXT NOT NULL UNIQUE,
    hatchery_origin TEXT,
    grade TEXT,
    arrival_date TEXT NOT NULL,
    available_quantity INTEGER NOT NULL CHECK (available_quantity >= 0),
    initial_quantity INTEGER,
    species TEXT NOT NULL,
    strain TEXT,
    age_weeks INTEGER,
    weight_grams REAL,
    health_status TEXT,
    quarantine_status TEXT,
    notes TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS orders (
    order_id TEXT PRIMARY KEY,
    order_number TEXT NOT NULL UNIQUE,
    customer_id TEXT NOT NULL REFERENCES customers(customer_id),
    batch_id TEXT REFERENCES broodstock_batches(batch_id),
    order_date TEXT NOT NULL,
    species TEXT NOT NULL,
    strain TEXT,
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    unit_price REAL NOT NULL CHECK (unit_price > 0),
    unit TEXT NOT NULL,
    unit_price_currency TEXT,
    total_value REAL NOT NULL,
    total_value_currency TEXT,
    packaging_type TEXT,
    shipment_date TEXT,
    shipment_status TEXT,
    quality_flag TEXT,
    mortality_reported INTEGER,
    notes TEXT,
    created_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS ux_orders_natural_key
    ON orders(customer_id, order_date, species, quantity, unit_price);

CREATE TABLE IF NOT EXISTS sequences (
    name TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);
INSERT OR IGNORE INTO sequences (name, value) VALUES ('order_number', 0);

-- ===== 同步台账 =====
CREATE TABLE IF NOT EXISTS sync_jobs (
    job_id TEXT PRIMARY KEY,
    source TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT,
    records_processed INTEGER NOT NULL DEFAULT 0,
    records_inserted INTEGER NOT NULL DEFAULT 0,
    records_skipped INTEGER NOT NULL DEFAULT 0,
    records_failed INTEGER NOT NULL DEFAULT 0,
    customers_inserted INTEGER NOT NULL DEFAULT 0,
    batches_inserted INTEGER NOT NULL DEFAULT 0,
    orders_inserted INTEGER NOT NULL DEFAULT 0,
    error_summary TEXT NOT NULL DEFAULT '{}',
    error_message TEXT,
    triggered_by TEXT,
    metadata TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_sync_jobs_created ON sync_jobs(created_at);

CREATE TABLE IF NOT EXISTS sync_errors (
    error_id TEXT PRIMARY KEY,
    job_id TEXT NOT NULL REFERENCES sync_jobs(job_id),
    row_number INTEGER NOT NULL,
    sheet_name TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    error_kind TEXT NOT NULL,
    error_message TEXT NOT NULL,
    field_name TEXT,
    invalid_value TEXT,
    raw_data TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sync_errors_job ON sync_errors(job_id, entity_type, row_number);

CREATE TABLE IF NOT EXISTS sync_audit_log (
    audit_id TEXT PRIMARY KEY,
    job_id TEXT NOT NULL REFERENCES sync_jobs(job_id),
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    row_number INTEGER NOT NULL,
    data TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sync_audit_job ON sync_audit_log(job_id);

CREATE TABLE IF NOT EXISTS sync_config (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    updated_by TEXT
);

CREATE TABLE IF NOT EXISTS sync_locks (
    lock_key TEXT PRIMARY KEY,
    job_id TEXT NOT NULL,
    acquired_at TEXT NOT NULL
);
"#;
