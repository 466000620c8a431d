// ==========================================
// 水产销售管理系统 - SQL 构建工具模块
// ==========================================
// 职责: 可选过滤条件 → WHERE 子句 + 参数列表
// 红线: 只拼接固定的条件片段与白名单列名，值一律走参数绑定
// ==========================================

use rusqlite::types::Value;

/// 可选过滤条件构建器
///
/// # 示例
/// ```
/// use aqua_sheet_sync::repository::sql_builder::FilterBuilder;
///
/// let mut filter = FilterBuilder::new();
/// filter.push("job_id = ?", "j1".to_string());
/// filter.push_opt("status = ?", None::<String>);
/// assert_eq!(filter.where_clause(), " WHERE job_id = ?");
/// assert_eq!(filter.params().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct FilterBuilder {
    clauses: Vec<&'static str>,
    params: Vec<Value>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加必选条件
    pub fn push(&mut self, clause: &'static str, value: impl Into<Value>) -> &mut Self {
        self.clauses.push(clause);
        self.params.push(value.into());
        self
    }

    /// 追加可选条件（None 时忽略）
    pub fn push_opt<V: Into<Value>>(&mut self, clause: &'static str, value: Option<V>) -> &mut Self {
        if let Some(v) = value {
            self.push(clause, v);
        }
        self
    }

    /// WHERE 子句（无条件时为空串）
    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// 参数列表追加 LIMIT / OFFSET
    pub fn paged_params(&self, limit: usize, offset: usize) -> Vec<Value> {
        let mut params = self.params.clone();
        params.push(Value::Integer(limit as i64));
        params.push(Value::Integer(offset as i64));
        params
    }
}

/// 构建分页查询语句
///
/// # 参数
/// - `base_query`: 基础 SELECT 语句（不含 WHERE）
/// - `filter`: 过滤条件
/// - `order_by_clause`: ORDER BY 子句（列名须来自白名单）
pub fn build_paged_sql(base_query: &str, filter: &FilterBuilder, order_by_clause: &str) -> String {
    format!(
        "{}{} ORDER BY {} LIMIT ? OFFSET ?",
        base_query,
        filter.where_clause(),
        order_by_clause
    )
}

/// 构建计数语句
pub fn build_count_sql(table: &str, filter: &FilterBuilder) -> String {
    format!("SELECT COUNT(*) FROM {}{}", table, filter.where_clause())
}
