// ==========================================
// 水产销售管理系统 - 表格行模型
// ==========================================
// 职责: 表格单元格值 / 解析行 / 行级校验错误
// 红线: 开放的字段映射仅作为输入边界类型，校验后一律转为封闭草稿类型
// ==========================================

use crate::domain::types::{EntityType, ErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ==========================================
// CellValue - 原始单元格值
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    /// 空白判定（空单元格或 TRIM 后为空字符串）
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(n) => n.is_nan(),
            CellValue::Bool(_) => false,
        }
    }

    /// 文本形式（空白 → None）
    pub fn as_text(&self) -> Option<String> {
        if self.is_blank() {
            return None;
        }
        Some(self.to_string().trim().to_string())
    }
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Empty
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Number(n) => {
                // 整数值不带小数点输出（45000 而非 45000.0）
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value.to_string())
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

/// 字段键 → 原始值
pub type FieldMap = BTreeMap<String, CellValue>;

static EMPTY_CELL: CellValue = CellValue::Empty;

// ==========================================
// ParsedRow - 解析后的数据行
// ==========================================
// row_number: 原始表格物理行号（表头 = 第 1 行）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRow {
    pub row_number: usize,
    pub data: FieldMap,
}

impl ParsedRow {
    pub fn new(row_number: usize, data: FieldMap) -> Self {
        Self { row_number, data }
    }

    /// 缺失的列视为空单元格
    pub fn get(&self, key: &str) -> &CellValue {
        self.data.get(key).unwrap_or(&EMPTY_CELL)
    }

    /// 取 TRIM 后的非空文本
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).as_text()
    }

    pub fn is_blank(&self) -> bool {
        self.data.values().all(CellValue::is_blank)
    }

    /// 原始行快照（用于错误诊断与 CSV 导出）
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(&self.data).unwrap_or(serde_json::Value::Null)
    }
}

// ==========================================
// ValidationError - 行级错误记录
// ==========================================
// 生命周期: 内存中累积，任务结束时统一落库为 sync_errors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub row_number: usize,
    pub sheet_name: String,
    pub entity_type: EntityType,
    pub error_kind: ErrorKind,
    pub message: String,
    pub field_name: Option<String>,
    pub invalid_value: Option<String>,
    pub raw_data: serde_json::Value,
}

impl ValidationError {
    pub fn new(
        row: &ParsedRow,
        sheet_name: &str,
        entity_type: EntityType,
        error_kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            row_number: row.row_number,
            sheet_name: sheet_name.to_string(),
            entity_type,
            error_kind,
            message: message.into(),
            field_name: None,
            invalid_value: None,
            raw_data: row.snapshot(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field_name = Some(field.into());
        self
    }

    pub fn with_value(mut self, value: Option<String>) -> Self {
        self.invalid_value = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_blank_detection() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::Text("   ".to_string()).is_blank());
        assert!(!CellValue::Text(" a ".to_string()).is_blank());
        assert!(!CellValue::Number(0.0).is_blank());
    }

    #[test]
    fn test_cell_number_display() {
        assert_eq!(CellValue::Number(45000.0).to_string(), "45000");
        assert_eq!(CellValue::Number(12.5).to_string(), "12.5");
    }

    #[test]
    fn test_missing_column_reads_as_empty() {
        let row = ParsedRow::new(2, FieldMap::new());
        assert_eq!(row.get("email"), &CellValue::Empty);
        assert_eq!(row.text("email"), None);
    }

    #[test]
    fn test_snapshot_serializes_raw_values() {
        let mut data = FieldMap::new();
        data.insert("name".to_string(), CellValue::Text("Acme".to_string()));
        data.insert("quantity".to_string(), CellValue::Number(3.0));
        data.insert("notes".to_string(), CellValue::Empty);
        let row = ParsedRow::new(2, data);

        let snapshot = row.snapshot();
        assert_eq!(snapshot["name"], "Acme");
        assert_eq!(snapshot["quantity"], 3.0);
        assert!(snapshot["notes"].is_null());
    }
}
