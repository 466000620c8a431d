// ==========================================
// 水产销售管理系统 - 表格传输层抽象
// ==========================================
// 职责: 从外部表格读取原始单元格网格
// 约束: 每次同步运行创建一个传输实例（构造注入，不做全局单例）
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::row_parser::CellGrid;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

// ==========================================
// SheetRange - A1 表示法范围
// ==========================================
// 支持: `Tab` / `Tab!A:Z` / `Tab!A1:F200` / `'My Tab'!A:C`
// 行列下标均为 0 起
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRange {
    pub tab: String,
    pub first_row: usize,
    pub last_row: Option<usize>,
    pub first_col: usize,
    pub last_col: Option<usize>,
}

impl SheetRange {
    /// 整个工作表
    pub fn whole_tab(tab: impl Into<String>) -> Self {
        Self {
            tab: tab.into(),
            first_row: 0,
            last_row: None,
            first_col: 0,
            last_col: None,
        }
    }

    /// 解析 A1 范围
    pub fn parse(raw: &str) -> ImportResult<Self> {
        let raw = raw.trim();
        let malformed = || ImportError::MalformedRange(raw.to_string());
        if raw.is_empty() {
            return Err(malformed());
        }

        let (tab, cells) = split_tab(raw).ok_or_else(malformed)?;
        if tab.is_empty() {
            return Err(malformed());
        }

        let Some(cells) = cells else {
            return Ok(Self::whole_tab(tab));
        };

        let (start, end) = cells.split_once(':').ok_or_else(malformed)?;
        let (first_col, first_row) = parse_cell_ref(start).ok_or_else(malformed)?;
        let (last_col, last_row) = parse_cell_ref(end).ok_or_else(malformed)?;

        let first_col = first_col.ok_or_else(malformed)?;
        let last_col = last_col.ok_or_else(malformed)?;
        if last_col < first_col {
            return Err(malformed());
        }
        if let (Some(s), Some(e)) = (first_row, last_row) {
            if e < s {
                return Err(malformed());
            }
        }

        Ok(Self {
            tab,
            first_row: first_row.unwrap_or(0),
            last_row,
            first_col,
            last_col: Some(last_col),
        })
    }

    /// 行是否在范围内
    pub fn contains_row(&self, row: usize) -> bool {
        row >= self.first_row && self.last_row.map_or(true, |last| row <= last)
    }

    /// 裁剪完整网格（从第 0 行第 0 列起的绝对网格）
    pub fn slice(&self, grid: CellGrid) -> CellGrid {
        grid.into_iter()
            .enumerate()
            .filter(|(idx, _)| self.contains_row(*idx))
            .map(|(_, row)| {
                row.into_iter()
                    .enumerate()
                    .filter(|(col, _)| {
                        *col >= self.first_col && self.last_col.map_or(true, |last| *col <= last)
                    })
                    .map(|(_, cell)| cell)
                    .collect()
            })
            .collect()
    }
}

impl fmt::Display for SheetRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tab.contains(|c: char| c.is_whitespace() || c == '!' || c == '\'') {
            write!(f, "'{}'", self.tab.replace('\'', "''"))?;
        } else {
            write!(f, "{}", self.tab)?;
        }
        if let Some(last_col) = self.last_col {
            let row_part = |row: Option<usize>| row.map(|r| (r + 1).to_string()).unwrap_or_default();
            let first_row = if self.first_row == 0 && self.last_row.is_none() {
                String::new()
            } else {
                row_part(Some(self.first_row))
            };
            write!(
                f,
                "!{}{}:{}{}",
                column_name(self.first_col),
                first_row,
                column_name(last_col),
                row_part(self.last_row)
            )?;
        }
        Ok(())
    }
}

/// 拆分工作表名与单元格部分
fn split_tab(raw: &str) -> Option<(String, Option<&str>)> {
    if let Some(rest) = raw.strip_prefix('\'') {
        // 引号内 '' 转义为 '
        let mut tab = String::new();
        let mut chars = rest.char_indices().peekable();
        while let Some((idx, c)) = chars.next() {
            if c == '\'' {
                if matches!(chars.peek(), Some((_, '\''))) {
                    chars.next();
                    tab.push('\'');
                    continue;
                }
                let after = &rest[idx + 1..];
                return match after.strip_prefix('!') {
                    Some(cells) => Some((tab, Some(cells))),
                    None if after.is_empty() => Some((tab, None)),
                    None => None,
                };
            }
            tab.push(c);
        }
        return None;
    }

    match raw.split_once('!') {
        Some((tab, cells)) => Some((tab.trim().to_string(), Some(cells))),
        None => Some((raw.to_string(), None)),
    }
}

/// 解析单元格引用（`A` / `A1` / `AB12`），返回 (列下标, 行下标)
fn parse_cell_ref(raw: &str) -> Option<(Option<usize>, Option<usize>)> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let split = raw
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (letters, digits) = raw.split_at(split);

    if !letters.chars().all(|c| c.is_ascii_alphabetic()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let col = if letters.is_empty() {
        None
    } else {
        Some(column_index(letters)?)
    };
    let row = if digits.is_empty() {
        None
    } else {
        let n: usize = digits.parse().ok()?;
        if n == 0 {
            return None;
        }
        Some(n - 1)
    };
    Some((col, row))
}

/// 列字母 → 0 起下标（A=0, Z=25, AA=26）
pub fn column_index(letters: &str) -> Option<usize> {
    let mut index: usize = 0;
    for c in letters.chars() {
        let digit = (c.to_ascii_uppercase() as u8).checked_sub(b'A')? as usize + 1;
        if digit > 26 {
            return None;
        }
        index = index.checked_mul(26)?.checked_add(digit)?;
    }
    index.checked_sub(1)
}

/// 0 起下标 → 列字母
pub fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

// ==========================================
// SheetTransport Trait
// ==========================================
#[async_trait]
pub trait SheetTransport: Send + Sync {
    /// 读取指定范围的原始网格
    ///
    /// # 参数
    /// - sheet_id: 表格标识
    /// - range: A1 范围
    ///
    /// # 返回
    /// - 行优先网格，第一行为范围内的首行（通常为表头）
    async fn fetch_range(&self, sheet_id: &str, range: &SheetRange) -> ImportResult<CellGrid>;

    /// 传输层名称（日志用）
    fn name(&self) -> &'static str;
}

// ==========================================
// TransportSettings - 构造传输层的参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub sheet_id: String,
    pub credentials_path: Option<String>,
}

// ==========================================
// SheetTransportFactory Trait
// ==========================================
// 每次运行调用一次；失败即为运行级致命错误
pub trait SheetTransportFactory: Send + Sync {
    fn create(&self, settings: &TransportSettings) -> ImportResult<Arc<dyn SheetTransport>>;
}

// ==========================================
// LocalTransportFactory - 本地文件传输层
// ==========================================
// sheet_id 为目录 → CsvDirectoryTransport
// sheet_id 为文件 → WorkbookTransport
pub struct LocalTransportFactory;

impl SheetTransportFactory for LocalTransportFactory {
    fn create(&self, settings: &TransportSettings) -> ImportResult<Arc<dyn SheetTransport>> {
        if let Some(credentials) = settings.credentials_path.as_deref() {
            if !Path::new(credentials).is_file() {
                return Err(ImportError::TransportAuth(format!(
                    "凭证文件不存在: {}",
                    credentials
                )));
            }
        }

        let path = Path::new(&settings.sheet_id);
        if path.is_dir() {
            Ok(Arc::new(super::csv_transport::CsvDirectoryTransport))
        } else if path.is_file() {
            Ok(Arc::new(super::workbook_transport::WorkbookTransport))
        } else {
            Err(ImportError::SheetNotFound(settings.sheet_id.clone()))
        }
    }
}
