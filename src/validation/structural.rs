// ==========================================
// 水产销售管理系统 - 表格形态结构校验
// ==========================================
// 职责: 必填列存在性 + 原始单元格形态（文本 / 数字 / 日期）
// 说明: 数值解析与日期换算属于转换阶段，这里只拦截明显错位的形态
// ==========================================

use crate::domain::sheet::{CellValue, ParsedRow};
use crate::validation::{FieldIssue, IssueResult};

/// 单元格期望形态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellShape {
    Text,
    Number,
    Date,
}

/// 列定义
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub key: &'static str,
    pub shape: CellShape,
    pub required: bool,
}

impl FieldSpec {
    pub const fn required(key: &'static str, shape: CellShape) -> Self {
        Self {
            key,
            shape,
            required: true,
        }
    }

    pub const fn optional(key: &'static str, shape: CellShape) -> Self {
        Self {
            key,
            shape,
            required: false,
        }
    }
}

/// 按列定义校验一行（首个失败即返回）
pub fn check_fields(row: &ParsedRow, specs: &[FieldSpec]) -> IssueResult<()> {
    for spec in specs {
        let cell = row.get(spec.key);
        if cell.is_blank() {
            if spec.required {
                return Err(FieldIssue::type_error(
                    spec.key,
                    format!("必填字段缺失: {}", spec.key),
                    None,
                ));
            }
            continue;
        }

        let shape_ok = match (spec.shape, cell) {
            (CellShape::Text, _) => true,
            (CellShape::Number, CellValue::Number(_) | CellValue::Text(_)) => true,
            (CellShape::Date, CellValue::Number(_) | CellValue::Text(_)) => true,
            _ => false,
        };
        if !shape_ok {
            let expected = match spec.shape {
                CellShape::Text => "文本",
                CellShape::Number => "数字",
                CellShape::Date => "日期",
            };
            return Err(FieldIssue::type_error(
                spec.key,
                format!("字段 {} 应为{}", spec.key, expected),
                Some(cell.to_string()),
            ));
        }
    }
    Ok(())
}
