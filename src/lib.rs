// ==========================================
// 水产销售管理系统 - 表格同步核心库
// ==========================================
// 技术栈: Rust + SQLite + Tokio
// 系统定位: 表格 → 目标存储 的仅插入同步管道
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 导入层 - 表格读取与单元格规范化
pub mod importer;

// 校验层 - 解析行 → 实体草稿
pub mod validation;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 同步编排
pub mod engine;

// 配置层 - 同步配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 运维接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{EntityType, ErrorKind, SyncMode, SyncStatus};

// 领域实体
pub use domain::{
    BatchDraft, CustomerDraft, OrderDraft, ParsedRow, SyncErrorRecord, SyncJob, ValidationError,
};

// 引擎
pub use engine::{SyncEngineError, SyncOrchestrator, SyncRequest, TriggeredSync};

// API
pub use api::{ApiError, SyncApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "水产销售管理系统 - 表格同步";
