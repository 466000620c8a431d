// ==========================================
// 水产销售管理系统 - CSV 目录传输层
// ==========================================
// 约定: sheet_id 为目录；工作表 `X` 读取 `<目录>/X.csv`
// 所有单元格按文本输出
// ==========================================

use crate::domain::sheet::CellValue;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::row_parser::CellGrid;
use crate::importer::sheet_transport::{SheetRange, SheetTransport};
use async_trait::async_trait;
use csv::ReaderBuilder;
use std::fs::File;
use std::path::Path;
use tracing::debug;

pub struct CsvDirectoryTransport;

#[async_trait]
impl SheetTransport for CsvDirectoryTransport {
    async fn fetch_range(&self, sheet_id: &str, range: &SheetRange) -> ImportResult<CellGrid> {
        let path = Path::new(sheet_id).join(format!("{}.csv", range.tab));
        let range = range.clone();

        tokio::task::spawn_blocking(move || read_csv_range(&path, &range))
            .await
            .map_err(|e| ImportError::TransportRead(format!("读取线程异常: {}", e)))?
    }

    fn name(&self) -> &'static str {
        "csv_directory"
    }
}

fn read_csv_range(path: &Path, range: &SheetRange) -> ImportResult<CellGrid> {
    if !path.is_file() {
        return Err(ImportError::SheetNotFound(range.tab.clone()));
    }

    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false) // 表头由行解析器处理
        .flexible(true) // 允许行长度不一致
        .from_reader(file);

    let mut grid = CellGrid::new();
    for (row_idx, result) in reader.records().enumerate() {
        if range.last_row.is_some_and(|last| row_idx > last) {
            break;
        }
        let record = result?;
        grid.push(record.iter().map(CellValue::from).collect());
    }

    debug!(path = %path.display(), rows = grid.len(), "CSV 工作表读取完成");
    Ok(range.slice(grid))
}
