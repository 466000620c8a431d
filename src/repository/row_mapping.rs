// ==========================================
// 水产销售管理系统 - 行映射辅助函数
// ==========================================
// 约定: 时间戳以 RFC 3339 文本存储；枚举以 snake_case 文本存储；
// 结构化字段（元信息 / 错误汇总 / 原始行）以 JSON 文本存储
// ==========================================

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use serde::de::DeserializeOwned;

/// 时间戳 → 存储文本
pub fn ts_to_sql(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

/// 存储文本 → 时间戳
pub fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, format!("时间戳格式错误 {}: {}", raw, e)))
}

pub fn parse_opt_ts(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_ts(idx, &s)).transpose()
}

/// 存储文本 → 枚举
pub fn parse_enum<T>(idx: usize, raw: &str, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    parse(raw).ok_or_else(|| conversion_error(idx, format!("未知枚举值: {}", raw)))
}

/// 存储文本 → JSON 结构
pub fn parse_json<T: DeserializeOwned>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|e| conversion_error(idx, format!("JSON 解析失败: {}", e)))
}

/// 非负整数列
pub fn get_count(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<usize> {
    let v: i64 = row.get(idx)?;
    usize::try_from(v).map_err(|_| conversion_error(idx, format!("计数为负: {}", v)))
}
