// ==========================================
// 水产销售管理系统 - 实体草稿模型
// ==========================================
// 职责: 校验通过后的目标领域形态（客户 / 种苗批次 / 订单）
// 生命周期: 仅在同步流程内，由校验管道产出，由同步编排器落库
// ==========================================

use crate::domain::types::CustomerStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// CustomerDraft - 客户草稿
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerDraft {
    pub row_number: usize,
    pub name: String,
    pub primary_contact_name: String,
    pub email: Option<String>,
    pub primary_contact_phone: Option<String>,
    pub address: Option<String>,
    pub country: Option<String>,
    pub province: Option<String>,
    pub district: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: CustomerStatus,
    pub credentials: Vec<CredentialDraft>,
}

// ==========================================
// CredentialDraft - 客户资质（最多 3 组）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialDraft {
    pub credential_type: String,
    pub credential_number: String,
    pub issued_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub file_url: String,
}

// ==========================================
// BatchDraft - 种苗批次草稿
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchDraft {
    pub row_number: usize,
    pub batch_code: String,
    pub hatchery_origin: Option<String>,
    pub grade: Option<String>,
    pub arrival_date: NaiveDate,
    pub available_quantity: i64,
    pub initial_quantity: Option<i64>,
    pub species: String,
    pub strain: Option<String>,
    pub age_weeks: Option<i64>,
    pub weight_grams: Option<f64>,
    pub health_status: Option<String>,
    pub quarantine_status: Option<String>,
    pub notes: Option<String>,
}

// ==========================================
// OrderDraft - 订单草稿
// ==========================================
// customer_email / batch_code 为自然键，落库时解析为代理键
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub row_number: usize,
    pub customer_email: String,
    pub batch_code: Option<String>,
    pub order_date: NaiveDate,
    pub species: String,
    pub strain: Option<String>,
    pub quantity: i64,
    pub unit_price: f64,
    pub unit: String,
    pub unit_price_currency: Option<String>,
    pub total_value_currency: Option<String>,
    pub packaging_type: Option<String>,
    pub shipment_date: Option<NaiveDate>,
    pub shipment_status: Option<String>,
    pub quality_flag: Option<String>,
    pub mortality_reported: Option<i64>,
    pub notes: Option<String>,
}

impl OrderDraft {
    /// 订单总额 = 数量 × 单价（总在落库时计算，忽略源表任何总额列）
    pub fn total_value(&self) -> f64 {
        self.quantity as f64 * self.unit_price
    }
}
