// ==========================================
// 水产销售管理系统 - 领域类型定义
// ==========================================
// 职责: 同步管道共享的枚举类型（实体类型/任务状态/错误分类）
// 序列化格式: snake_case (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 实体类型 (Entity Type)
// ==========================================
// 顺序即同步顺序: 客户 → 种苗批次 → 订单
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Customers,
    Batches,
    Orders,
}

impl EntityType {
    /// 依赖顺序（订单引用客户与批次）
    pub const SYNC_ORDER: [EntityType; 3] =
        [EntityType::Customers, EntityType::Batches, EntityType::Orders];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Customers => "customers",
            EntityType::Batches => "batches",
            EntityType::Orders => "orders",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "customers" | "customer" => Some(EntityType::Customers),
            "batches" | "batch" => Some(EntityType::Batches),
            "orders" | "order" => Some(EntityType::Orders),
            _ => None,
        }
    }

    /// 默认工作表名
    pub fn default_tab(&self) -> &'static str {
        match self {
            EntityType::Customers => "Customers",
            EntityType::Batches => "Batches",
            EntityType::Orders => "Orders",
        }
    }

    /// 审计日志中的单数实体名
    pub fn singular(&self) -> &'static str {
        match self {
            EntityType::Customers => "customer",
            EntityType::Batches => "batch",
            EntityType::Orders => "order",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 按依赖顺序排序并去重
pub fn in_sync_order(requested: &[EntityType]) -> Vec<EntityType> {
    EntityType::SYNC_ORDER
        .iter()
        .copied()
        .filter(|t| requested.contains(t))
        .collect()
}

// ==========================================
// 同步任务状态 (Sync Status)
// ==========================================
// 状态机: pending → running → {completed | partial | failed}
// 例外: 未获取到同步锁时 pending → failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Running,
    Completed,
    Partial,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Running => "running",
            SyncStatus::Completed => "completed",
            SyncStatus::Partial => "partial",
            SyncStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "pending" => Some(SyncStatus::Pending),
            "running" => Some(SyncStatus::Running),
            "completed" => Some(SyncStatus::Completed),
            "partial" => Some(SyncStatus::Partial),
            "failed" => Some(SyncStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncStatus::Completed | SyncStatus::Partial | SyncStatus::Failed
        )
    }

    /// 状态单调: 终态不可离开
    pub fn can_transition_to(&self, next: SyncStatus) -> bool {
        match (self, next) {
            (SyncStatus::Pending, SyncStatus::Running) => true,
            (SyncStatus::Pending, SyncStatus::Failed) => true,
            (SyncStatus::Running, next) => next.is_terminal(),
            _ => false,
        }
    }

    /// 终态判定
    ///
    /// # 规则
    /// - 无错误 → completed
    /// - 有插入且有错误 → partial
    /// - 无插入且有错误 → failed
    pub fn terminal_for(inserted: usize, error_count: usize) -> Self {
        if error_count == 0 {
            SyncStatus::Completed
        } else if inserted > 0 {
            SyncStatus::Partial
        } else {
            SyncStatus::Failed
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 行级错误分类 (Error Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TypeError,             // 结构/模式校验失败
    BusinessRuleViolation, // 跨字段/时间约束
    Duplicate,             // 自然键已存在（仅客户/批次）
    MissingReference,      // 订单引用的客户/批次不存在
    DatabaseError,         // 行事务内其他失败
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::TypeError => "type_error",
            ErrorKind::BusinessRuleViolation => "business_rule_violation",
            ErrorKind::Duplicate => "duplicate",
            ErrorKind::MissingReference => "missing_reference",
            ErrorKind::DatabaseError => "database_error",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "type_error" => Some(ErrorKind::TypeError),
            "business_rule_violation" => Some(ErrorKind::BusinessRuleViolation),
            "duplicate" => Some(ErrorKind::Duplicate),
            "missing_reference" => Some(ErrorKind::MissingReference),
            "database_error" => Some(ErrorKind::DatabaseError),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 导入模式 (Sync Mode)
// ==========================================
// 当前仅实现 insert_only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    InsertOnly,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::InsertOnly => "insert_only",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace('-', "_").as_str() {
            "insert_only" | "insert" => Some(SyncMode::InsertOnly),
            _ => None,
        }
    }
}

impl Default for SyncMode {
    fn default() -> Self {
        SyncMode::InsertOnly
    }
}

// ==========================================
// 客户状态 (Customer Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus {
    Active,
    Paused,
    Blacklisted,
}

impl CustomerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerStatus::Active => "active",
            CustomerStatus::Paused => "paused",
            CustomerStatus::Blacklisted => "blacklisted",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "active" => Some(CustomerStatus::Active),
            "paused" => Some(CustomerStatus::Paused),
            "blacklisted" => Some(CustomerStatus::Blacklisted),
            _ => None,
        }
    }
}
