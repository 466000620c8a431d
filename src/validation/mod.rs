// ==========================================
// 水产销售管理系统 - 实体校验层
// ==========================================
// 职责: 解析行 → 实体草稿 或 行级错误
// 管道: 结构校验 → 转换 → 目标领域模式校验 → 业务规则校验
// 红线: 任何阶段失败只影响本行，绝不向外抛出
// ==========================================

pub mod batch;
pub mod customer;
pub mod order;
pub mod schema;
pub mod structural;

pub use batch::BatchValidator;
pub use customer::CustomerValidator;
pub use order::OrderValidator;

use crate::domain::sheet::{ParsedRow, ValidationError};
use crate::domain::types::{EntityType, ErrorKind};
use crate::importer::error::ImportError;
use serde::Serialize;
use tracing::debug;

// ==========================================
// FieldIssue - 单行校验失败（结构化）
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct FieldIssue {
    pub kind: ErrorKind,
    pub field: Option<String>,
    pub message: String,
    pub invalid_value: Option<String>,
}

impl FieldIssue {
    /// 结构/模式类错误
    pub fn type_error(
        field: impl Into<String>,
        message: impl Into<String>,
        invalid_value: Option<String>,
    ) -> Self {
        Self {
            kind: ErrorKind::TypeError,
            field: Some(field.into()),
            message: message.into(),
            invalid_value,
        }
    }

    /// 业务规则类错误
    pub fn business_rule(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::BusinessRuleViolation,
            field: Some(field.into()),
            message: message.into(),
            invalid_value: None,
        }
    }

    pub fn with_value(mut self, value: impl ToString) -> Self {
        self.invalid_value = Some(value.to_string());
        self
    }

    /// 规范化失败 → 类型错误（字段名以调用方传入的列名为准）
    pub fn from_import(field: &str, err: ImportError) -> Self {
        let value = err.raw_value().map(str::to_string);
        Self::type_error(field, err.to_string(), value)
    }

    /// 转为带行上下文的错误记录
    pub fn into_error(self, row: &ParsedRow, sheet_name: &str, entity_type: EntityType) -> ValidationError {
        let mut err = ValidationError::new(row, sheet_name, entity_type, self.kind, self.message)
            .with_value(self.invalid_value);
        if let Some(field) = self.field {
            err = err.with_field(field);
        }
        err
    }
}

pub type IssueResult<T> = Result<T, FieldIssue>;

// ==========================================
// RowValidator Trait
// ==========================================
// 实现者: CustomerValidator / BatchValidator / OrderValidator
pub trait RowValidator: Send + Sync {
    /// 校验通过后的封闭草稿类型
    type Draft: Serialize + Clone + Send;

    fn entity_type(&self) -> EntityType;

    /// 阶段 1: 表格形态结构校验（必填列、原始类型形态）
    fn check_structure(&self, row: &ParsedRow) -> IssueResult<()>;

    /// 阶段 2: 转换为目标领域形态
    fn transform(&self, row: &ParsedRow) -> IssueResult<Self::Draft>;

    /// 阶段 3: 目标领域模式校验（与手工录入共用的约束）
    fn check_schema(&self, draft: &Self::Draft) -> IssueResult<()>;

    /// 阶段 4: 业务规则校验（跨字段 / 时间约束）
    fn check_business_rules(&self, draft: &Self::Draft) -> IssueResult<()>;

    /// 单行完整管道（任一阶段失败即短路）
    fn validate_row(&self, row: &ParsedRow) -> IssueResult<Self::Draft> {
        self.check_structure(row)?;
        let draft = self.transform(row)?;
        self.check_schema(&draft)?;
        self.check_business_rules(&draft)?;
        Ok(draft)
    }
}

// ==========================================
// ValidationOutcome - 批量校验结果（有效行 / 错误 分区）
// ==========================================
#[derive(Debug, Clone)]
pub struct ValidRow<D> {
    pub row: ParsedRow,
    pub draft: D,
}

#[derive(Debug, Clone)]
pub struct ValidationOutcome<D> {
    pub valid: Vec<ValidRow<D>>,
    pub errors: Vec<ValidationError>,
}

/// 批量校验
///
/// # 参数
/// - validator: 实体校验器
/// - sheet_name: 工作表名（写入错误记录）
/// - rows: 已剔除空白行的解析行
///
/// # 返回
/// - 有效行与错误的分区，顺序与输入一致
pub fn validate_rows<V: RowValidator>(
    validator: &V,
    sheet_name: &str,
    rows: Vec<ParsedRow>,
) -> ValidationOutcome<V::Draft> {
    let entity_type = validator.entity_type();
    let mut valid = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();

    for row in rows {
        match validator.validate_row(&row) {
            Ok(draft) => valid.push(ValidRow { row, draft }),
            Err(issue) => {
                debug!(
                    entity_type = %entity_type,
                    row_number = row.row_number,
                    error_kind = %issue.kind,
                    field = ?issue.field,
                    "行校验失败"
                );
                errors.push(issue.into_error(&row, sheet_name, entity_type));
            }
        }
    }

    ValidationOutcome { valid, errors }
}


#[cfg(test)]
mod tests {
    use super::test_support::row;
    use super::*;

    #[test]
    fn test_validate_rows_partitions() {
        let validator = CustomerValidator::new();
        let rows = vec![
            row(2, &[("name", "Acme"), ("primary_contact_name", "Jane"), ("email", "a@acme.com")]),
            row(3, &[("name", "Beta")]),
            row(4, &[("name", "Gamma"), ("primary_contact_name", "Li"), ("phone", "+84 90 123 4567")]),
        ];

        let outcome = validate_rows(&validator, "Customers", rows);
        assert_eq!(outcome.valid.len(), 2);
        assert_eq!(outcome.errors.len(), 1);

        let err = &outcome.errors[0];
        assert_eq!(err.row_number, 3);
        assert_eq!(err.sheet_name, "Customers");
        assert_eq!(err.error_kind, ErrorKind::TypeError);
        assert_eq!(err.field_name.as_deref(), Some("primary_contact_name"));
        assert_eq!(err.raw_data["name"], "Beta");
    }

    #[test]
    fn test_issue_from_import_keeps_value() {
        let issue = FieldIssue::from_import(
            "order_date",
            ImportError::InvalidDate {
                value: "31/31/2024".to_string(),
            },
        );
        assert_eq!(issue.kind, ErrorKind::TypeError);
        assert_eq!(issue.field.as_deref(), Some("order_date"));
        assert_eq!(issue.invalid_value.as_deref(), Some("31/31/2024"));
    }
}
