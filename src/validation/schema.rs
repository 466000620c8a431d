// ==========================================
// 水产销售管理系统 - 目标领域模式校验
// ==========================================
// 职责: 与手工录入（创建接口）共用的字段约束
// 红线: 表格来源的数据不得绕过手工录入同样会被拒绝的约束
// ==========================================

use crate::domain::draft::{BatchDraft, CustomerDraft, OrderDraft};
use crate::validation::{FieldIssue, IssueResult};

// ===== 长度上限 =====
pub const MAX_NAME_LEN: usize = 200;
pub const MAX_SHORT_TEXT_LEN: usize = 100;
pub const MAX_CODE_LEN: usize = 50;
pub const MAX_ADDRESS_LEN: usize = 500;
pub const MAX_NOTES_LEN: usize = 2000;
pub const MAX_UNIT_LEN: usize = 20;

// ==========================================
// 客户
// ==========================================
pub fn check_customer(draft: &CustomerDraft) -> IssueResult<()> {
    max_len("name", &draft.name, MAX_NAME_LEN)?;
    max_len("primary_contact_name", &draft.primary_contact_name, MAX_NAME_LEN)?;
    if let Some(email) = &draft.email {
        check_email("email", email)?;
    }
    if let Some(phone) = &draft.primary_contact_phone {
        check_phone("phone", phone)?;
    }
    opt_max_len("address", &draft.address, MAX_ADDRESS_LEN)?;
    opt_max_len("country", &draft.country, MAX_SHORT_TEXT_LEN)?;
    opt_max_len("province", &draft.province, MAX_SHORT_TEXT_LEN)?;
    opt_max_len("district", &draft.district, MAX_SHORT_TEXT_LEN)?;

    for (idx, cred) in draft.credentials.iter().enumerate() {
        let n = idx + 1;
        max_len(&format!("credential_type_{}", n), &cred.credential_type, MAX_CODE_LEN)?;
        max_len(
            &format!("credential_number_{}", n),
            &cred.credential_number,
            MAX_SHORT_TEXT_LEN,
        )?;
        check_url(&format!("credential_file_url_{}", n), &cred.file_url)?;
        if cred.expiry_date < cred.issued_date {
            return Err(FieldIssue::type_error(
                format!("credential_expiry_{}", n),
                "资质到期日不能早于签发日",
                Some(cred.expiry_date.to_string()),
            ));
        }
    }
    Ok(())
}

// ==========================================
// 种苗批次
// ==========================================
pub fn check_batch(draft: &BatchDraft) -> IssueResult<()> {
    max_len("batch_code", &draft.batch_code, MAX_CODE_LEN)?;
    if draft.batch_code.chars().any(char::is_whitespace) {
        return Err(FieldIssue::type_error(
            "batch_code",
            "批次编码不能包含空白字符",
            Some(draft.batch_code.clone()),
        ));
    }
    max_len("species", &draft.species, MAX_SHORT_TEXT_LEN)?;
    opt_max_len("strain", &draft.strain, MAX_SHORT_TEXT_LEN)?;
    opt_max_len("hatchery_origin", &draft.hatchery_origin, MAX_SHORT_TEXT_LEN)?;
    opt_max_len("grade", &draft.grade, MAX_CODE_LEN)?;
    opt_max_len("health_status", &draft.health_status, MAX_CODE_LEN)?;
    opt_max_len("quarantine_status", &draft.quarantine_status, MAX_CODE_LEN)?;
    opt_max_len("notes", &draft.notes, MAX_NOTES_LEN)?;
    Ok(())
}

// ==========================================
// 订单
// ==========================================
pub fn check_order(draft: &OrderDraft) -> IssueResult<()> {
    check_email("customer_email", &draft.customer_email)?;
    opt_max_len("broodstock_batch_code", &draft.batch_code, MAX_CODE_LEN)?;
    max_len("species", &draft.species, MAX_SHORT_TEXT_LEN)?;
    opt_max_len("strain", &draft.strain, MAX_SHORT_TEXT_LEN)?;
    max_len("unit", &draft.unit, MAX_UNIT_LEN)?;
    if let Some(currency) = &draft.unit_price_currency {
        check_currency("unit_price_currency", currency)?;
    }
    if let Some(currency) = &draft.total_value_currency {
        check_currency("total_value_currency", currency)?;
    }
    opt_max_len("packaging_type", &draft.packaging_type, MAX_CODE_LEN)?;
    opt_max_len("shipment_status", &draft.shipment_status, MAX_CODE_LEN)?;
    opt_max_len("quality_flag", &draft.quality_flag, MAX_CODE_LEN)?;
    opt_max_len("notes", &draft.notes, MAX_NOTES_LEN)?;
    Ok(())
}

// ==========================================
// 通用约束
// ==========================================

fn max_len(field: &str, value: &str, max: usize) -> IssueResult<()> {
    let len = value.chars().count();
    if len > max {
        return Err(FieldIssue::type_error(
            field,
            format!("字段 {} 长度 {} 超过上限 {}", field, len, max),
            Some(value.to_string()),
        ));
    }
    Ok(())
}

fn opt_max_len(field: &str, value: &Option<String>, max: usize) -> IssueResult<()> {
    match value {
        Some(v) => max_len(field, v, max),
        None => Ok(()),
    }
}

/// 邮箱格式: local@domain.tld，无空白
pub fn is_valid_email(raw: &str) -> bool {
    let Some((local, domain)) = raw.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !raw.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(head, tail)| !head.is_empty() && !tail.is_empty() && !tail.ends_with('.'))
}

fn check_email(field: &str, raw: &str) -> IssueResult<()> {
    if raw.chars().count() > MAX_NAME_LEN || !is_valid_email(raw) {
        return Err(FieldIssue::type_error(
            field,
            format!("邮箱格式无效: {}", raw),
            Some(raw.to_string()),
        ));
    }
    Ok(())
}

/// 电话格式: 6-30 位，仅数字与 + - ( ) 空格
pub fn is_valid_phone(raw: &str) -> bool {
    let digits = raw.chars().filter(char::is_ascii_digit).count();
    (6..=30).contains(&raw.chars().count())
        && digits >= 6
        && raw
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')' | ' ' | '.'))
}

fn check_phone(field: &str, raw: &str) -> IssueResult<()> {
    if !is_valid_phone(raw) {
        return Err(FieldIssue::type_error(
            field,
            format!("电话格式无效: {}", raw),
            Some(raw.to_string()),
        ));
    }
    Ok(())
}

fn check_url(field: &str, raw: &str) -> IssueResult<()> {
    let ok = (raw.starts_with("http://") || raw.starts_with("https://"))
        && !raw.chars().any(char::is_whitespace);
    if !ok {
        return Err(FieldIssue::type_error(
            field,
            format!("文件地址须为 http(s) URL: {}", raw),
            Some(raw.to_string()),
        ));
    }
    Ok(())
}

fn check_currency(field: &str, raw: &str) -> IssueResult<()> {
    if raw.len() != 3 || !raw.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(FieldIssue::type_error(
            field,
            format!("币种须为 3 位大写字母代码: {}", raw),
            Some(raw.to_string()),
        ));
    }
    Ok(())
}
