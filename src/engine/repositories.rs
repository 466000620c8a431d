// ==========================================
// 水产销售管理系统 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合同步编排器所需的 Repository
// ==========================================

use std::sync::{Arc, Mutex};

use crate::repository::{SyncJobRepository, TargetStoreRepository};
use rusqlite::Connection;

/// 同步引擎仓储集合
///
/// # 包含的仓储
/// - `job_repo`: 任务台账（任务 / 错误 / 审计 / 同步锁）
/// - `target_repo`: 目标存储（客户 / 批次 / 订单）
#[derive(Clone)]
pub struct SyncRepositories {
    pub job_repo: Arc<SyncJobRepository>,
    pub target_repo: Arc<TargetStoreRepository>,
}

impl SyncRepositories {
    pub fn new(job_repo: Arc<SyncJobRepository>, target_repo: Arc<TargetStoreRepository>) -> Self {
        Self {
            job_repo,
            target_repo,
        }
    }

    /// 基于同一共享连接构造全部仓储
    pub fn from_conn(conn: Arc<Mutex<Connection>>) -> Self {
        Self::new(
            Arc::new(SyncJobRepository::new(conn.clone())),
            Arc::new(TargetStoreRepository::new(conn)),
        )
    }
}
