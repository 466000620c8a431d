// ==========================================
// 水产销售管理系统 - 客户行校验器
// ==========================================
// 表头: name, primary_contact_name, email, phone, address, country,
//       province, district, latitude, longitude, status,
//       credential_{type,number,issued,expiry,file_url}_{1..3}
// ==========================================

use crate::domain::draft::{CredentialDraft, CustomerDraft};
use crate::domain::sheet::ParsedRow;
use crate::domain::types::{CustomerStatus, EntityType};
use crate::importer::normalizer::{normalize_date, optional_number};
use crate::validation::schema;
use crate::validation::structural::{check_fields, CellShape, FieldSpec};
use crate::validation::{FieldIssue, IssueResult, RowValidator};

/// 每行最多资质组数
pub const MAX_CREDENTIAL_GROUPS: usize = 3;

const FIELD_SPECS: &[FieldSpec] = &[
    FieldSpec::required("name", CellShape::Text),
    FieldSpec::required("primary_contact_name", CellShape::Text),
    FieldSpec::optional("email", CellShape::Text),
    FieldSpec::optional("phone", CellShape::Text),
    FieldSpec::optional("latitude", CellShape::Number),
    FieldSpec::optional("longitude", CellShape::Number),
    FieldSpec::optional("status", CellShape::Text),
];

// ==========================================
// CustomerValidator
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct CustomerValidator;

impl CustomerValidator {
    pub fn new() -> Self {
        Self
    }

    /// 资质组: 五列齐全才采纳，任一缺失则整组静默跳过
    fn credential_group(row: &ParsedRow, n: usize) -> IssueResult<Option<CredentialDraft>> {
        let type_key = format!("credential_type_{}", n);
        let number_key = format!("credential_number_{}", n);
        let issued_key = format!("credential_issued_{}", n);
        let expiry_key = format!("credential_expiry_{}", n);
        let url_key = format!("credential_file_url_{}", n);

        let keys = [&type_key, &number_key, &issued_key, &expiry_key, &url_key];
        if keys.iter().any(|k| row.get(k).is_blank()) {
            return Ok(None);
        }

        let issued_date = normalize_date(row.get(&issued_key))
            .map_err(|e| FieldIssue::from_import(&issued_key, e))?;
        let expiry_date = normalize_date(row.get(&expiry_key))
            .map_err(|e| FieldIssue::from_import(&expiry_key, e))?;

        Ok(Some(CredentialDraft {
            credential_type: row.text(&type_key).unwrap_or_default(),
            credential_number: row.text(&number_key).unwrap_or_default(),
            issued_date,
            expiry_date,
            file_url: row.text(&url_key).unwrap_or_default(),
        }))
    }
}

impl RowValidator for CustomerValidator {
    type Draft = CustomerDraft;

    fn entity_type(&self) -> EntityType {
        EntityType::Customers
    }

    fn check_structure(&self, row: &ParsedRow) -> IssueResult<()> {
        check_fields(row, FIELD_SPECS)
    }

    fn transform(&self, row: &ParsedRow) -> IssueResult<CustomerDraft> {
        let latitude = optional_number(row.get("latitude"), "latitude")
            .map_err(|e| FieldIssue::from_import("latitude", e))?;
        let longitude = optional_number(row.get("longitude"), "longitude")
            .map_err(|e| FieldIssue::from_import("longitude", e))?;

        let status = match row.text("status") {
            None => CustomerStatus::Active,
            Some(raw) => CustomerStatus::parse(&raw).ok_or_else(|| {
                FieldIssue::type_error(
                    "status",
                    format!("客户状态须为 active|paused|blacklisted: {}", raw),
                    Some(raw.clone()),
                )
            })?,
        };

        let mut credentials = Vec::new();
        for n in 1..=MAX_CREDENTIAL_GROUPS {
            if let Some(credential) = Self::credential_group(row, n)? {
                credentials.push(credential);
            }
        }

        Ok(CustomerDraft {
            row_number: row.row_number,
            name: row.text("name").unwrap_or_default(),
            primary_contact_name: row.text("primary_contact_name").unwrap_or_default(),
            email: row.text("email"),
            primary_contact_phone: row.text("phone"),
            address: row.text("address"),
            country: row.text("country"),
            province: row.text("province"),
            district: row.text("district"),
            latitude,
            longitude,
            status,
            credentials,
        })
    }

    fn check_schema(&self, draft: &CustomerDraft) -> IssueResult<()> {
        schema::check_customer(draft)
    }

    fn check_business_rules(&self, draft: &CustomerDraft) -> IssueResult<()> {
        // 经纬度成对出现
        match (draft.latitude, draft.longitude) {
            (Some(_), None) => {
                return Err(FieldIssue::business_rule(
                    "longitude",
                    "经纬度须同时提供: 缺少 longitude",
                ))
            }
            (None, Some(_)) => {
                return Err(FieldIssue::business_rule(
                    "latitude",
                    "经纬度须同时提供: 缺少 latitude",
                ))
            }
            _ => {}
        }

        if let Some(lat) = draft.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(FieldIssue::business_rule("latitude", "纬度须在 -90 到 90 之间")
                    .with_value(lat));
            }
        }
        if let Some(lng) = draft.longitude {
            if !(-180.0..=180.0).contains(&lng) {
                return Err(
                    FieldIssue::business_rule("longitude", "经度须在 -180 到 180 之间")
                        .with_value(lng),
                );
            }
        }

        if draft.email.is_none() && draft.primary_contact_phone.is_none() {
            return Err(FieldIssue::business_rule("email", "邮箱与电话至少填写一项"));
        }
        Ok(())
    }
}
