// ==========================================
// 水产销售管理系统 - 同步配置模型
// ==========================================
// 职责: 配置键全集、环境变量默认值、值校验、敏感值脱敏
// 优先级: sync_config 表覆写 > 环境变量 > 内置默认
// ==========================================

use crate::domain::types::EntityType;
use crate::importer::sheet_transport::SheetRange;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ==========================================
// 配置键（封闭集合）
// ==========================================
pub mod config_keys {
    pub const ENABLED: &str = "enabled";
    pub const DEFAULT_SHEET_ID: &str = "default_sheet_id";
    pub const CREDENTIALS_PATH: &str = "credentials_path";
    pub const CUSTOMERS_RANGE: &str = "customers_range";
    pub const BATCHES_RANGE: &str = "batches_range";
    pub const ORDERS_RANGE: &str = "orders_range";
    pub const FETCH_TIMEOUT_SECS: &str = "fetch_timeout_secs";
    pub const RUN_TIMEOUT_SECS: &str = "run_timeout_secs";

    pub const ALL: [&str; 8] = [
        ENABLED,
        DEFAULT_SHEET_ID,
        CREDENTIALS_PATH,
        CUSTOMERS_RANGE,
        BATCHES_RANGE,
        ORDERS_RANGE,
        FETCH_TIMEOUT_SECS,
        RUN_TIMEOUT_SECS,
    ];
}

/// 配置键 → 环境变量名
pub fn env_var_for(key: &str) -> String {
    format!("SHEET_SYNC_{}", key.to_uppercase())
}

pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 1800;

// ==========================================
// ConfigError
// ==========================================
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("未知配置项: {0}")]
    UnknownKey(String),

    #[error("配置值无效 (key={key}): {message}")]
    InvalidValue { key: String, message: String },

    #[error("配置存储失败: {0}")]
    Storage(#[from] crate::repository::error::RepositoryError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// ==========================================
// SyncSettings - 解析后的完整配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    pub enabled: bool,
    pub default_sheet_id: Option<String>,
    pub credentials_path: Option<String>,
    pub customers_range: String,
    pub batches_range: String,
    pub orders_range: String,
    pub fetch_timeout_secs: u64,
    pub run_timeout_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            default_sheet_id: None,
            credentials_path: None,
            customers_range: format!("{}!A:Z", EntityType::Customers.default_tab()),
            batches_range: format!("{}!A:Z", EntityType::Batches.default_tab()),
            orders_range: format!("{}!A:Z", EntityType::Orders.default_tab()),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            run_timeout_secs: DEFAULT_RUN_TIMEOUT_SECS,
        }
    }
}

impl SyncSettings {
    /// 从进程环境变量读取默认值
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 从任意查找函数读取默认值（环境变量名见 env_var_for）
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        for key in config_keys::ALL {
            if let Some(value) = lookup(&env_var_for(key)) {
                settings.apply(key, &value)?;
            }
        }
        Ok(settings)
    }

    /// 覆写单个配置项（先校验）
    ///
    /// 空值表示清除可选项
    pub fn apply(&mut self, key: &str, raw: &str) -> ConfigResult<()> {
        let value = raw.trim();
        match key {
            config_keys::ENABLED => self.enabled = parse_bool(key, value)?,
            config_keys::DEFAULT_SHEET_ID => self.default_sheet_id = non_empty(value),
            config_keys::CREDENTIALS_PATH => self.credentials_path = non_empty(value),
            config_keys::CUSTOMERS_RANGE => self.customers_range = parse_range(key, value)?,
            config_keys::BATCHES_RANGE => self.batches_range = parse_range(key, value)?,
            config_keys::ORDERS_RANGE => self.orders_range = parse_range(key, value)?,
            config_keys::FETCH_TIMEOUT_SECS => self.fetch_timeout_secs = parse_secs(key, value)?,
            config_keys::RUN_TIMEOUT_SECS => self.run_timeout_secs = parse_secs(key, value)?,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// 实体类型对应的表格范围
    pub fn range_for(&self, entity_type: EntityType) -> &str {
        match entity_type {
            EntityType::Customers => &self.customers_range,
            EntityType::Batches => &self.batches_range,
            EntityType::Orders => &self.orders_range,
        }
    }

    /// 对外展示（凭证路径脱敏）
    pub fn masked(&self) -> Self {
        Self {
            credentials_path: self.credentials_path.as_deref().map(mask_secret),
            ..self.clone()
        }
    }
}

impl fmt::Display for SyncSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked = self.masked();
        writeln!(f, "{} = {}", config_keys::ENABLED, masked.enabled)?;
        writeln!(
            f,
            "{} = {}",
            config_keys::DEFAULT_SHEET_ID,
            masked.default_sheet_id.as_deref().unwrap_or("")
        )?;
        writeln!(
            f,
            "{} = {}",
            config_keys::CREDENTIALS_PATH,
            masked.credentials_path.as_deref().unwrap_or("")
        )?;
        writeln!(f, "{} = {}", config_keys::CUSTOMERS_RANGE, masked.customers_range)?;
        writeln!(f, "{} = {}", config_keys::BATCHES_RANGE, masked.batches_range)?;
        writeln!(f, "{} = {}", config_keys::ORDERS_RANGE, masked.orders_range)?;
        writeln!(f, "{} = {}", config_keys::FETCH_TIMEOUT_SECS, masked.fetch_timeout_secs)?;
        write!(f, "{} = {}", config_keys::RUN_TIMEOUT_SECS, masked.run_timeout_secs)
    }
}

/// 敏感值脱敏: `***` + 末 4 位
pub fn mask_secret(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    if chars.len() <= 4 {
        return "***".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("***{}", tail)
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_bool(key: &str, value: &str) -> ConfigResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("不是布尔值: {}", value),
        }),
    }
}

fn parse_range(key: &str, value: &str) -> ConfigResult<String> {
    SheetRange::parse(value)
        .map(|r| r.to_string())
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
}

fn parse_secs(key: &str, value: &str) -> ConfigResult<u64> {
    value
        .parse::<u64>()
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("须为正整数秒: {}", value),
        })
}
