// ==========================================
// 水产销售管理系统 - 行解析器
// ==========================================
// 职责: 原始单元格网格 → 带物理行号的字段映射行
// 规则: 表头规范化为 snake_case 键；完全空白的行跳过
// ==========================================

use crate::domain::sheet::{CellValue, FieldMap, ParsedRow};

/// 原始单元格网格（行优先）
pub type CellGrid = Vec<Vec<CellValue>>;

/// 表头规范化
///
/// 小写、TRIM、连续空白折叠为单个 `_`
/// 例: " Primary Contact  Name " → "primary_contact_name"
pub fn normalize_header(raw: &str) -> String {
    raw.split_whitespace()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// 网格解析为数据行
///
/// # 参数
/// - grid: 原始网格（含表头行）
/// - header_row_index: 表头所在的网格下标（通常为 0）
///
/// # 返回
/// - 非空白数据行，row_number = 数据下标 + header_row_index + 2
///   （即表头为第 1 行时的物理行号）
pub fn parse_rows(grid: &[Vec<CellValue>], header_row_index: usize) -> Vec<ParsedRow> {
    let Some(header_cells) = grid.get(header_row_index) else {
        return Vec::new();
    };

    // 空表头列忽略；重名列保留第一个
    let mut headers: Vec<Option<String>> = Vec::with_capacity(header_cells.len());
    for cell in header_cells {
        let key = normalize_header(&cell.to_string());
        if key.is_empty() || headers.iter().flatten().any(|h| h == &key) {
            headers.push(None);
        } else {
            headers.push(Some(key));
        }
    }

    grid.iter()
        .skip(header_row_index + 1)
        .enumerate()
        .filter_map(|(data_index, cells)| {
            let mut data = FieldMap::new();
            for (col_idx, header) in headers.iter().enumerate() {
                if let Some(key) = header {
                    let value = cells.get(col_idx).cloned().unwrap_or_default();
                    data.insert(key.clone(), value);
                }
            }

            let row = ParsedRow::new(data_index + header_row_index + 2, data);
            if row.is_blank() {
                None
            } else {
                Some(row)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_row(cells: &[&str]) -> Vec<CellValue> {
        cells.iter().map(|c| CellValue::from(*c)).collect()
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header(" Primary Contact  Name "), "primary_contact_name");
        assert_eq!(normalize_header("Email"), "email");
        assert_eq!(normalize_header("   "), "");
    }

    #[test]
    fn test_parse_rows_skips_blank_rows_and_keeps_row_numbers() {
        let grid = vec![
            text_row(&["Name", "Email"]),
            text_row(&["Acme", "a@acme.com"]),
            text_row(&["", "  "]),
            text_row(&["Beta", "b@beta.com"]),
        ];

        let rows = parse_rows(&grid, 0);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row_number, 2);
        assert_eq!(rows[1].row_number, 4);
        assert_eq!(rows[1].text("email").as_deref(), Some("b@beta.com"));
    }

    #[test]
    fn test_short_rows_pad_with_empty() {
        let grid = vec![text_row(&["Name", "Email", "Phone"]), text_row(&["Acme"])];

        let rows = parse_rows(&grid, 0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("phone"), &CellValue::Empty);
        assert!(rows[0].data.contains_key("email"));
    }

    #[test]
    fn test_empty_headers_ignored() {
        let grid = vec![text_row(&["Name", "", "Email"]), text_row(&["Acme", "junk", "a@acme.com"])];

        let rows = parse_rows(&grid, 0);
        assert_eq!(rows[0].data.len(), 2);
    }

    #[test]
    fn test_header_row_offset() {
        let grid = vec![
            text_row(&["客户导出 2024"]),
            text_row(&["Name"]),
            text_row(&["Acme"]),
        ];

        let rows = parse_rows(&grid, 1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row_number, 3);
    }

    #[test]
    fn test_empty_grid() {
        assert!(parse_rows(&[], 0).is_empty());
    }
}
