// ==========================================
// 水产销售管理系统 - 单元格规范化
// ==========================================
// 职责: 日期序列号 / 本地化字符串 / 空白 → 类型化值
// 约束: 纯函数，无状态；仅由实体校验器的转换阶段调用
// ==========================================

use crate::domain::sheet::CellValue;
use crate::importer::error::{ImportError, ImportResult};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

/// 表格引擎日期纪元（序列号 0）
pub fn sheet_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default()
}

/// 序列号上限（9999-12-31）
const MAX_DATE_SERIAL: f64 = 2_958_465.0;

/// 兼容的非 ISO 日期格式
const FALLBACK_DATE_FORMATS: &[&str] = &[
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%m/%d/%Y",
    "%d-%b-%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

const FALLBACK_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// 日期规范化
///
/// # 规则
/// - ISO `YYYY-MM-DD` 原样接受
/// - 8 位纯数字文本按 `YYYYMMDD` 解析（超出序列号上限，不与序列号冲突）
/// - 数值（或其他纯数字文本）按表格日期序列号换算（1899-12-30 起算，小数部分为时间，舍去）
/// - 其他可识别的日期字符串重排为 ISO
/// - 空白及其他一律 InvalidDate
pub fn normalize_date(value: &CellValue) -> ImportResult<NaiveDate> {
    match value {
        CellValue::Number(serial) => date_from_serial(*serial, value),
        CellValue::Text(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(invalid_date(value));
            }
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
                return Ok(date);
            }
            if let Some(date) = parse_compact_date(trimmed) {
                return Ok(date);
            }
            if let Ok(serial) = trimmed.parse::<f64>() {
                return date_from_serial(serial, value);
            }
            parse_fallback_date(trimmed).ok_or_else(|| invalid_date(value))
        }
        CellValue::Empty | CellValue::Bool(_) => Err(invalid_date(value)),
    }
}

/// `YYYYMMDD`
fn parse_compact_date(raw: &str) -> Option<NaiveDate> {
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = raw[0..4].parse().ok()?;
    let month = raw[4..6].parse().ok()?;
    let day = raw[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// 日期规范化（ISO 字符串形式）
pub fn normalize_date_string(value: &CellValue) -> ImportResult<String> {
    normalize_date(value).map(|d| d.format("%Y-%m-%d").to_string())
}

/// 可选日期（空白 → None）
pub fn optional_date(value: &CellValue) -> ImportResult<Option<NaiveDate>> {
    if value.is_blank() {
        return Ok(None);
    }
    normalize_date(value).map(Some)
}

/// 数字规范化
///
/// # 规则
/// - 原生数字直接接受（需为有限值）
/// - 文本去除千分位（`,`/`_`/空格）后解析
/// - 空白 → MissingRequiredField
pub fn normalize_number(value: &CellValue, field_name: &str) -> ImportResult<f64> {
    match value {
        _ if value.is_blank() => Err(ImportError::MissingRequiredField {
            field: field_name.to_string(),
        }),
        CellValue::Number(n) if n.is_finite() => Ok(*n),
        CellValue::Text(raw) => {
            let cleaned: String = raw
                .trim()
                .chars()
                .filter(|c| !matches!(c, ',' | '_' | ' '))
                .collect();
            cleaned
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| invalid_number(value, field_name))
        }
        _ => Err(invalid_number(value, field_name)),
    }
}

/// 整数规范化（带小数部分 → NotAnInteger）
pub fn normalize_integer(value: &CellValue, field_name: &str) -> ImportResult<i64> {
    let number = normalize_number(value, field_name)?;
    if number.fract() != 0.0 || number.abs() > i64::MAX as f64 {
        return Err(ImportError::NotAnInteger {
            field: field_name.to_string(),
            value: value.to_string(),
        });
    }
    Ok(number as i64)
}

/// 可选数字（空白 → None）
pub fn optional_number(value: &CellValue, field_name: &str) -> ImportResult<Option<f64>> {
    if value.is_blank() {
        return Ok(None);
    }
    normalize_number(value, field_name).map(Some)
}

/// 可选整数（空白 → None）
pub fn optional_integer(value: &CellValue, field_name: &str) -> ImportResult<Option<i64>> {
    if value.is_blank() {
        return Ok(None);
    }
    normalize_integer(value, field_name).map(Some)
}

/// 文本规范化（TRIM，空白 → None）
pub fn normalize_text(value: &CellValue) -> Option<String> {
    value.as_text()
}

fn date_from_serial(serial: f64, raw: &CellValue) -> ImportResult<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > MAX_DATE_SERIAL {
        return Err(invalid_date(raw));
    }
    sheet_epoch()
        .checked_add_signed(Duration::days(serial.floor() as i64))
        .ok_or_else(|| invalid_date(raw))
}

fn parse_fallback_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    FALLBACK_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            FALLBACK_DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        })
}

fn invalid_date(value: &CellValue) -> ImportError {
    ImportError::InvalidDate {
        value: value.to_string(),
    }
}

fn invalid_number(value: &CellValue, field_name: &str) -> ImportError {
    ImportError::InvalidNumber {
        field: field_name.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_iso_date_unchanged() {
        assert_eq!(
            normalize_date_string(&text("2024-03-15")).unwrap(),
            "2024-03-15"
        );
    }

    #[test]
    fn test_serial_date() {
        let iso = normalize_date_string(&CellValue::Number(45000.0)).unwrap();
        assert_eq!(iso, "2023-03-15");

        // 再次规范化 ISO 结果保持不变
        let again = normalize_date_string(&text(&iso)).unwrap();
        assert_eq!(again, iso);

        // 时间部分舍去
        assert_eq!(
            normalize_date_string(&CellValue::Number(45000.75)).unwrap(),
            "2023-03-15"
        );
        // 文本形式的序列号
        assert_eq!(normalize_date_string(&text("45000")).unwrap(), "2023-03-15");
    }

    #[test]
    fn test_fallback_formats() {
        assert_eq!(
            normalize_date_string(&text("2024/01/05")).unwrap(),
            "2024-01-05"
        );
        assert_eq!(
            normalize_date_string(&text("March 3, 2024")).unwrap(),
            "2024-03-03"
        );
        assert_eq!(
            normalize_date_string(&text("2024-02-01T08:30:00Z")).unwrap(),
            "2024-02-01"
        );
    }

    #[test]
    fn test_compact_date_text() {
        assert_eq!(
            normalize_date_string(&text("20240105")).unwrap(),
            "2024-01-05"
        );
        // 非法月份不退回序列号换算
        assert!(matches!(
            normalize_date(&text("20241301")),
            Err(ImportError::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_invalid_dates() {
        assert!(matches!(
            normalize_date(&CellValue::Empty),
            Err(ImportError::InvalidDate { .. })
        ));
        assert!(matches!(
            normalize_date(&text("   ")),
            Err(ImportError::InvalidDate { .. })
        ));
        assert!(matches!(
            normalize_date(&text("not a date")),
            Err(ImportError::InvalidDate { .. })
        ));
        assert!(matches!(
            normalize_date(&CellValue::Number(-3.0)),
            Err(ImportError::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_normalize_number() {
        assert_eq!(normalize_number(&text(" 1,234.5 "), "price").unwrap(), 1234.5);
        assert_eq!(normalize_number(&CellValue::Number(2.0), "price").unwrap(), 2.0);
        assert!(matches!(
            normalize_number(&CellValue::Empty, "price"),
            Err(ImportError::MissingRequiredField { .. })
        ));
        assert!(matches!(
            normalize_number(&text("abc"), "price"),
            Err(ImportError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_normalize_integer() {
        assert_eq!(normalize_integer(&text("42"), "quantity").unwrap(), 42);
        assert_eq!(normalize_integer(&CellValue::Number(7.0), "quantity").unwrap(), 7);

        let err = normalize_integer(&text("4.5"), "quantity").unwrap_err();
        assert!(matches!(err, ImportError::NotAnInteger { .. }));
        assert_eq!(err.field(), Some("quantity"));
        assert_eq!(err.raw_value(), Some("4.5"));

        assert!(matches!(
            normalize_integer(&text(""), "quantity"),
            Err(ImportError::MissingRequiredField { .. })
        ));
    }

    #[test]
    fn test_optional_variants() {
        assert_eq!(optional_integer(&CellValue::Empty, "age_weeks").unwrap(), None);
        assert_eq!(optional_number(&text("1.5"), "weight").unwrap(), Some(1.5));
        assert_eq!(optional_date(&text("")).unwrap(), None);
    }
}
