// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、内存表格传输层、API 组装
// ==========================================

#![allow(dead_code)]

use aqua_sheet_sync::api::SyncApi;
use aqua_sheet_sync::config::{ConfigManager, SyncSettings};
use aqua_sheet_sync::db;
use aqua_sheet_sync::domain::CellValue;
use aqua_sheet_sync::engine::TriggeredSync;
use aqua_sheet_sync::importer::{
    CellGrid, ImportError, ImportResult, SheetRange, SheetTransport, SheetTransportFactory,
    TransportSettings,
};
use aqua_sheet_sync::SyncStatus;
use async_trait::async_trait;
use rusqlite::Connection;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::NamedTempFile;

/// 测试用表格标识
pub const TEST_SHEET_ID: &str = "mock-sheet";

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - 共享连接
pub fn create_test_db() -> Result<(NamedTempFile, Arc<Mutex<Connection>>), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时路径不是 UTF-8")?
        .to_string();

    let conn = db::open_and_init(&db_path)?;
    Ok((temp_file, Arc::new(Mutex::new(conn))))
}

/// 构造网格（空串为空单元格）
pub fn grid(rows: &[&[&str]]) -> CellGrid {
    rows.iter()
        .map(|cells| cells.iter().map(|c| CellValue::from(*c)).collect())
        .collect()
}

// ==========================================
// MockSheetTransport - 内存表格
// ==========================================
#[derive(Default)]
pub struct MockSheetTransport {
    tabs: HashMap<String, CellGrid>,
    delay: Option<Duration>,
}

impl MockSheetTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tab(mut self, tab: &str, grid: CellGrid) -> Self {
        self.tabs.insert(tab.to_string(), grid);
        self
    }

    /// 每次读取前延迟（模拟外部服务卡顿）
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl SheetTransport for MockSheetTransport {
    async fn fetch_range(&self, _sheet_id: &str, range: &SheetRange) -> ImportResult<CellGrid> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let grid = self
            .tabs
            .get(&range.tab)
            .cloned()
            .ok_or_else(|| ImportError::SheetNotFound(range.tab.clone()))?;
        Ok(range.slice(grid))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ==========================================
// MockTransportFactory
// ==========================================
pub struct MockTransportFactory {
    transport: Arc<MockSheetTransport>,
    auth_error: Option<String>,
}

impl MockTransportFactory {
    pub fn new(transport: MockSheetTransport) -> Self {
        Self {
            transport: Arc::new(transport),
            auth_error: None,
        }
    }

    /// 构造即失败（模拟凭证无效）
    pub fn failing(message: &str) -> Self {
        Self {
            transport: Arc::new(MockSheetTransport::new()),
            auth_error: Some(message.to_string()),
        }
    }
}

impl SheetTransportFactory for MockTransportFactory {
    fn create(&self, _settings: &TransportSettings) -> ImportResult<Arc<dyn SheetTransport>> {
        match &self.auth_error {
            Some(message) => Err(ImportError::TransportAuth(message.clone())),
            None => Ok(self.transport.clone()),
        }
    }
}

/// 测试默认配置（默认表格为 TEST_SHEET_ID）
pub fn test_settings() -> SyncSettings {
    SyncSettings {
        default_sheet_id: Some(TEST_SHEET_ID.to_string()),
        ..Default::default()
    }
}

/// 组装 SyncApi
pub fn build_api(
    conn: Arc<Mutex<Connection>>,
    factory: MockTransportFactory,
    settings: SyncSettings,
) -> SyncApi {
    let config_manager = Arc::new(ConfigManager::new(conn.clone(), settings));
    SyncApi::new(conn, config_manager, Arc::new(factory))
}

/// 等待后台任务结束
pub async fn wait(triggered: TriggeredSync) -> SyncStatus {
    triggered.handle.await.expect("同步任务 panic")
}

// ==========================================
// 标准表头
// ==========================================
pub const CUSTOMER_HEADER: &[&str] = &[
    "Name",
    "Primary Contact Name",
    "Email",
    "Phone",
    "Latitude",
    "Longitude",
    "Status",
];

pub const BATCH_HEADER: &[&str] = &[
    "batch_code",
    "species",
    "arrival_date",
    "available_quantity",
    "initial_quantity",
];

pub const ORDER_HEADER: &[&str] = &[
    "customer_email",
    "order_date",
    "species",
    "quantity",
    "unit_price",
    "broodstock_batch_code",
    "total_value",
];
