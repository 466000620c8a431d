// ==========================================
// 水产销售管理系统 - 订单行校验器
// ==========================================
// 表头: customer_email, order_date, species, strain, quantity, unit_price,
//       unit, unit_price_currency, total_value_currency, broodstock_batch_code,
//       packaging_type, shipment_date, shipment_status, quality_flag,
//       mortality_reported, notes
// 说明: 源表中的任何总额列都被忽略，总额在落库时按 数量 × 单价 计算
// ==========================================

use crate::domain::draft::OrderDraft;
use crate::domain::sheet::ParsedRow;
use crate::domain::types::EntityType;
use crate::importer::normalizer::{
    normalize_date, normalize_integer, normalize_number, optional_date, optional_integer,
};
use crate::validation::schema;
use crate::validation::structural::{check_fields, CellShape, FieldSpec};
use crate::validation::{FieldIssue, IssueResult, RowValidator};
use chrono::{Local, NaiveDate};

/// 未填写单位时的默认值
pub const DEFAULT_UNIT: &str = "piece";

const FIELD_SPECS: &[FieldSpec] = &[
    FieldSpec::required("customer_email", CellShape::Text),
    FieldSpec::required("order_date", CellShape::Date),
    FieldSpec::required("species", CellShape::Text),
    FieldSpec::required("quantity", CellShape::Number),
    FieldSpec::required("unit_price", CellShape::Number),
    FieldSpec::optional("broodstock_batch_code", CellShape::Text),
    FieldSpec::optional("shipment_date", CellShape::Date),
    FieldSpec::optional("mortality_reported", CellShape::Number),
];

// ==========================================
// OrderValidator
// ==========================================
#[derive(Debug, Clone)]
pub struct OrderValidator {
    today: NaiveDate,
}

impl OrderValidator {
    pub fn new() -> Self {
        Self::with_today(Local::now().date_naive())
    }

    pub fn with_today(today: NaiveDate) -> Self {
        Self { today }
    }
}

impl Default for OrderValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl RowValidator for OrderValidator {
    type Draft = OrderDraft;

    fn entity_type(&self) -> EntityType {
        EntityType::Orders
    }

    fn check_structure(&self, row: &ParsedRow) -> IssueResult<()> {
        check_fields(row, FIELD_SPECS)
    }

    fn transform(&self, row: &ParsedRow) -> IssueResult<OrderDraft> {
        let order_date = normalize_date(row.get("order_date"))
            .map_err(|e| FieldIssue::from_import("order_date", e))?;
        let quantity = normalize_integer(row.get("quantity"), "quantity")
            .map_err(|e| FieldIssue::from_import("quantity", e))?;
        let unit_price = normalize_number(row.get("unit_price"), "unit_price")
            .map_err(|e| FieldIssue::from_import("unit_price", e))?;
        let shipment_date = optional_date(row.get("shipment_date"))
            .map_err(|e| FieldIssue::from_import("shipment_date", e))?;
        let mortality_reported = optional_integer(row.get("mortality_reported"), "mortality_reported")
            .map_err(|e| FieldIssue::from_import("mortality_reported", e))?;

        Ok(OrderDraft {
            row_number: row.row_number,
            customer_email: row.text("customer_email").unwrap_or_default(),
            batch_code: row.text("broodstock_batch_code"),
            order_date,
            species: row.text("species").unwrap_or_default(),
            strain: row.text("strain"),
            quantity,
            unit_price,
            unit: row.text("unit").unwrap_or_else(|| DEFAULT_UNIT.to_string()),
            unit_price_currency: row.text("unit_price_currency").map(|c| c.to_uppercase()),
            total_value_currency: row.text("total_value_currency").map(|c| c.to_uppercase()),
            packaging_type: row.text("packaging_type"),
            shipment_date,
            shipment_status: row.text("shipment_status"),
            quality_flag: row.text("quality_flag"),
            mortality_reported,
            notes: row.text("notes"),
        })
    }

    fn check_schema(&self, draft: &OrderDraft) -> IssueResult<()> {
        schema::check_order(draft)
    }

    fn check_business_rules(&self, draft: &OrderDraft) -> IssueResult<()> {
        if draft.quantity <= 0 {
            return Err(
                FieldIssue::business_rule("quantity", "数量须大于 0").with_value(draft.quantity),
            );
        }
        if draft.unit_price <= 0.0 {
            return Err(
                FieldIssue::business_rule("unit_price", "单价须大于 0").with_value(draft.unit_price),
            );
        }
        if let Some(mortality) = draft.mortality_reported {
            if mortality < 0 {
                return Err(FieldIssue::business_rule("mortality_reported", "死亡数不能为负")
                    .with_value(mortality));
            }
            if mortality > draft.quantity {
                return Err(FieldIssue::business_rule(
                    "mortality_reported",
                    format!("死亡数 {} 超过订单数量 {}", mortality, draft.quantity),
                )
                .with_value(mortality));
            }
        }
        if draft.order_date > self.today {
            return Err(FieldIssue::business_rule("order_date", "订单日期不能晚于今天")
                .with_value(draft.order_date));
        }
        if let Some(shipment) = draft.shipment_date {
            if shipment < draft.order_date {
                return Err(FieldIssue::business_rule("shipment_date", "发货日期不能早于订单日期")
                    .with_value(shipment));
            }
        }
        Ok(())
    }
}
