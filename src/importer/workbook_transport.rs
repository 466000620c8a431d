// ==========================================
// 水产销售管理系统 - 工作簿传输层
// ==========================================
// 工具: calamine（xlsx / xls / ods）
// 约定: sheet_id 为工作簿路径；原生日期单元格输出为日期序列号
// ==========================================

use crate::domain::sheet::CellValue;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::row_parser::CellGrid;
use crate::importer::sheet_transport::{SheetRange, SheetTransport};
use async_trait::async_trait;
use calamine::{open_workbook_auto, Data, Reader};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct WorkbookTransport;

#[async_trait]
impl SheetTransport for WorkbookTransport {
    async fn fetch_range(&self, sheet_id: &str, range: &SheetRange) -> ImportResult<CellGrid> {
        let path = PathBuf::from(sheet_id);
        let range = range.clone();

        // calamine 为同步 IO，放到阻塞线程池
        tokio::task::spawn_blocking(move || read_workbook_range(&path, &range))
            .await
            .map_err(|e| ImportError::TransportRead(format!("读取线程异常: {}", e)))?
    }

    fn name(&self) -> &'static str {
        "workbook"
    }
}

fn read_workbook_range(path: &Path, range: &SheetRange) -> ImportResult<CellGrid> {
    if !path.is_file() {
        return Err(ImportError::SheetNotFound(path.display().to_string()));
    }

    let mut workbook = open_workbook_auto(path)?;
    if !workbook.sheet_names().iter().any(|name| name == &range.tab) {
        return Err(ImportError::SheetNotFound(range.tab.clone()));
    }
    let sheet = workbook.worksheet_range(&range.tab)?;

    // 已用区域之外的行列视为空
    let Some((end_row, end_col)) = sheet.end() else {
        return Ok(Vec::new());
    };
    let last_row = range.last_row.map_or(end_row as usize, |r| r.min(end_row as usize));
    let last_col = range.last_col.map_or(end_col as usize, |c| c.min(end_col as usize));

    let mut grid = CellGrid::new();
    for row in range.first_row..=last_row {
        let mut cells = Vec::new();
        for col in range.first_col..=last_col {
            let cell = sheet
                .get_value((row as u32, col as u32))
                .map(cell_from_data)
                .unwrap_or(CellValue::Empty);
            cells.push(cell);
        }
        grid.push(cells);
    }

    debug!(
        path = %path.display(),
        tab = %range.tab,
        rows = grid.len(),
        "工作簿范围读取完成"
    );
    Ok(grid)
}

/// calamine 单元格 → CellValue
pub fn cell_from_data(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::from(s.as_str()),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}
