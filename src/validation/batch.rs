// ==========================================
// 水产销售管理系统 - 种苗批次行校验器
// ==========================================
// 表头: batch_code, hatchery_origin, grade, arrival_date, available_quantity,
//       initial_quantity, species, strain, age_weeks, weight_grams,
//       health_status, quarantine_status, notes
// ==========================================

use crate::domain::draft::BatchDraft;
use crate::domain::sheet::ParsedRow;
use crate::domain::types::EntityType;
use crate::importer::normalizer::{normalize_date, normalize_integer, optional_integer, optional_number};
use crate::validation::schema;
use crate::validation::structural::{check_fields, CellShape, FieldSpec};
use crate::validation::{FieldIssue, IssueResult, RowValidator};
use chrono::{Local, NaiveDate};

const FIELD_SPECS: &[FieldSpec] = &[
    FieldSpec::required("batch_code", CellShape::Text),
    FieldSpec::required("species", CellShape::Text),
    FieldSpec::required("arrival_date", CellShape::Date),
    FieldSpec::required("available_quantity", CellShape::Number),
    FieldSpec::optional("initial_quantity", CellShape::Number),
    FieldSpec::optional("age_weeks", CellShape::Number),
    FieldSpec::optional("weight_grams", CellShape::Number),
];

// ==========================================
// BatchValidator
// ==========================================
#[derive(Debug, Clone)]
pub struct BatchValidator {
    today: NaiveDate,
}

impl BatchValidator {
    pub fn new() -> Self {
        Self::with_today(Local::now().date_naive())
    }

    /// 指定"今天"（到货日期不得晚于该日）
    pub fn with_today(today: NaiveDate) -> Self {
        Self { today }
    }
}

impl Default for BatchValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl RowValidator for BatchValidator {
    type Draft = BatchDraft;

    fn entity_type(&self) -> EntityType {
        EntityType::Batches
    }

    fn check_structure(&self, row: &ParsedRow) -> IssueResult<()> {
        check_fields(row, FIELD_SPECS)
    }

    fn transform(&self, row: &ParsedRow) -> IssueResult<BatchDraft> {
        let arrival_date = normalize_date(row.get("arrival_date"))
            .map_err(|e| FieldIssue::from_import("arrival_date", e))?;
        let available_quantity = normalize_integer(row.get("available_quantity"), "available_quantity")
            .map_err(|e| FieldIssue::from_import("available_quantity", e))?;
        let initial_quantity = optional_integer(row.get("initial_quantity"), "initial_quantity")
            .map_err(|e| FieldIssue::from_import("initial_quantity", e))?;
        let age_weeks = optional_integer(row.get("age_weeks"), "age_weeks")
            .map_err(|e| FieldIssue::from_import("age_weeks", e))?;
        let weight_grams = optional_number(row.get("weight_grams"), "weight_grams")
            .map_err(|e| FieldIssue::from_import("weight_grams", e))?;

        Ok(BatchDraft {
            row_number: row.row_number,
            batch_code: row.text("batch_code").unwrap_or_default(),
            hatchery_origin: row.text("hatchery_origin"),
            grade: row.text("grade"),
            arrival_date,
            available_quantity,
            initial_quantity,
            species: row.text("species").unwrap_or_default(),
            strain: row.text("strain"),
            age_weeks,
            weight_grams,
            health_status: row.text("health_status"),
            quarantine_status: row.text("quarantine_status"),
            notes: row.text("notes"),
        })
    }

    fn check_schema(&self, draft: &BatchDraft) -> IssueResult<()> {
        schema::check_batch(draft)
    }

    fn check_business_rules(&self, draft: &BatchDraft) -> IssueResult<()> {
        if draft.available_quantity < 0 {
            return Err(
                FieldIssue::business_rule("available_quantity", "可用数量不能为负")
                    .with_value(draft.available_quantity),
            );
        }
        if let Some(initial) = draft.initial_quantity {
            if draft.available_quantity > initial {
                return Err(FieldIssue::business_rule(
                    "available_quantity",
                    format!("可用数量 {} 超过初始数量 {}", draft.available_quantity, initial),
                )
                .with_value(draft.available_quantity));
            }
        }
        if let Some(age) = draft.age_weeks {
            if age < 0 {
                return Err(FieldIssue::business_rule("age_weeks", "周龄不能为负").with_value(age));
            }
        }
        if let Some(weight) = draft.weight_grams {
            if weight <= 0.0 {
                return Err(
                    FieldIssue::business_rule("weight_grams", "体重须大于 0").with_value(weight),
                );
            }
        }
        if draft.arrival_date > self.today {
            return Err(
                FieldIssue::business_rule("arrival_date", "到货日期不能晚于今天")
                    .with_value(draft.arrival_date),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ErrorKind;
    use crate::validation::test_support::row;

    fn validator() -> BatchValidator {
        BatchValidator::with_today(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
    }

    fn base(extra: &[(&'static str, &'static str)]) -> ParsedRow {
        let mut cells = vec![
            ("batch_code", "BS-2024-001"),
            ("species", "Penaeus monodon"),
            ("arrival_date", "2024-05-10"),
            ("available_quantity", "500"),
        ];
        cells.extend_from_slice(extra);
        row(2, &cells)
    }

    #[test]
    fn test_valid_batch() {
        let draft = validator()
            .validate_row(&base(&[("initial_quantity", "800"), ("weight_grams", "45.5")]))
            .unwrap();
        assert_eq!(draft.batch_code, "BS-2024-001");
        assert_eq!(draft.available_quantity, 500);
        assert_eq!(draft.initial_quantity, Some(800));
        assert_eq!(draft.weight_grams, Some(45.5));
    }

    #[test]
    fn test_serial_arrival_date() {
        let draft = validator()
            .validate_row(&base(&[("arrival_date", "45000")]))
            .unwrap();
        assert_eq!(draft.arrival_date.to_string(), "2023-03-15");
    }

    #[test]
    fn test_available_exceeds_initial() {
        let issue = validator()
            .validate_row(&base(&[("initial_quantity", "100")]))
            .unwrap_err();
        assert_eq!(issue.kind, ErrorKind::BusinessRuleViolation);
        assert_eq!(issue.field.as_deref(), Some("available_quantity"));
    }

    #[test]
    fn test_negative_and_zero_values() {
        let v = validator();
        let issue = v.validate_row(&base(&[("age_weeks", "-1")])).unwrap_err();
        assert_eq!(issue.field.as_deref(), Some("age_weeks"));

        let issue = v.validate_row(&base(&[("weight_grams", "0")])).unwrap_err();
        assert_eq!(issue.field.as_deref(), Some("weight_grams"));
    }

    #[test]
    fn test_future_arrival() {
        let issue = validator()
            .validate_row(&base(&[("arrival_date", "2024-06-02")]))
            .unwrap_err();
        assert_eq!(issue.kind, ErrorKind::BusinessRuleViolation);
        assert_eq!(issue.field.as_deref(), Some("arrival_date"));
        assert_eq!(issue.invalid_value.as_deref(), Some("2024-06-02"));
    }

    #[test]
    fn test_fractional_quantity_is_type_error() {
        let issue = validator()
            .validate_row(&base(&[("available_quantity", "12.5")]))
            .unwrap_err();
        assert_eq!(issue.kind, ErrorKind::TypeError);
        assert_eq!(issue.field.as_deref(), Some("available_quantity"));
        assert_eq!(issue.invalid_value.as_deref(), Some("12.5"));
    }
}
