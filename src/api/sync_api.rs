// ==========================================
// 水产销售管理系统 - 表格同步 API
// ==========================================
// 职责: 触发同步、任务状态 / 历史 / 错误 / 审计查询、错误导出、配置读写
// 说明: 触发后立即返回任务ID；失败详情一律经由任务查询获取
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, SyncSettings};
use crate::domain::query::{ErrorQuery, JobQuery, JobSortKey, Page, PageRequest, SortDirection};
use crate::domain::sync_job::{SyncAuditEntry, SyncErrorRecord, SyncJob};
use crate::domain::types::{EntityType, ErrorKind, SyncStatus};
use crate::engine::{SyncOrchestrator, SyncRepositories, SyncRequest, TriggeredSync};
use crate::importer::sheet_transport::SheetTransportFactory;
use crate::repository::SyncJobRepository;

/// 错误导出 CSV 表头
pub const ERROR_CSV_HEADERS: [&str; 7] = [
    "Row Number",
    "Sheet Name",
    "Entity Type",
    "Error Type",
    "Error Message",
    "Field Name",
    "Invalid Value",
];

// ==========================================
// 请求 / 响应结构
// ==========================================

/// 历史任务查询请求（字符串形式，API 层负责解析与白名单校验）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobHistoryRequest {
    pub status: Option<String>,
    pub source: Option<String>,
    pub triggered_by: Option<String>,
    pub sort_by: Option<String>,
    pub sort_dir: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

/// 行级错误查询请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobErrorsRequest {
    pub entity_type: Option<String>,
    pub error_kind: Option<String>,
    pub sheet_name: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

/// 配置视图（敏感值已脱敏）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigView {
    pub settings: SyncSettings,
    /// 已被运行时覆写的配置键
    pub overridden_keys: Vec<String>,
}

// ==========================================
// SyncApi
// ==========================================
pub struct SyncApi {
    orchestrator: SyncOrchestrator,
    job_repo: Arc<SyncJobRepository>,
    config_manager: Arc<ConfigManager>,
}

impl SyncApi {
    /// 创建 SyncApi
    ///
    /// # 参数
    /// - conn: 共享连接（schema 已初始化）
    /// - config_manager: 配置管理器
    /// - transports: 表格传输层工厂
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        config_manager: Arc<ConfigManager>,
        transports: Arc<dyn SheetTransportFactory>,
    ) -> Self {
        let repos = SyncRepositories::from_conn(conn);
        let job_repo = repos.job_repo.clone();
        let orchestrator = SyncOrchestrator::new(repos, config_manager.clone(), transports);
        Self {
            orchestrator,
            job_repo,
            config_manager,
        }
    }

    // ==========================================
    // 触发
    // ==========================================

    /// 触发同步（立即返回 pending 任务）
    pub async fn trigger_sync(&self, request: SyncRequest) -> ApiResult<TriggeredSync> {
        Ok(self.orchestrator.trigger_sync(request).await?)
    }

    // ==========================================
    // 任务查询
    // ==========================================

    /// 查询单个任务
    pub fn get_job(&self, job_id: &str) -> ApiResult<SyncJob> {
        self.job_repo
            .find_by_id(job_id)?
            .ok_or_else(|| ApiError::NotFound(format!("同步任务(id={})不存在", job_id)))
    }

    /// 分页查询历史任务
    pub fn list_jobs(&self, request: &JobHistoryRequest) -> ApiResult<Page<SyncJob>> {
        let query = JobQuery {
            status: parse_opt(request.status.as_deref(), "status", SyncStatus::parse)?,
            source: non_empty(request.source.as_deref()),
            triggered_by: non_empty(request.triggered_by.as_deref()),
            sort_by: parse_opt(request.sort_by.as_deref(), "sort_by", JobSortKey::parse)?
                .unwrap_or_default(),
            sort_dir: parse_opt(request.sort_dir.as_deref(), "sort_dir", SortDirection::parse)?
                .unwrap_or_default(),
        };
        let page = PageRequest::new(request.page, request.page_size);
        Ok(self.job_repo.list_jobs(&query, page)?)
    }

    /// 分页查询单任务的行级错误
    pub fn list_job_errors(
        &self,
        job_id: &str,
        request: &JobErrorsRequest,
    ) -> ApiResult<Page<SyncErrorRecord>> {
        self.get_job(job_id)?;
        let query = ErrorQuery {
            entity_type: parse_opt(request.entity_type.as_deref(), "entity_type", EntityType::parse)?,
            error_kind: parse_opt(request.error_kind.as_deref(), "error_kind", ErrorKind::parse)?,
            sheet_name: non_empty(request.sheet_name.as_deref()),
        };
        let page = PageRequest::new(request.page, request.page_size);
        Ok(self.job_repo.list_errors(job_id, &query, page)?)
    }

    /// 导出单任务全部行级错误为 CSV
    pub fn export_job_errors_csv(&self, job_id: &str) -> ApiResult<String> {
        self.get_job(job_id)?;
        let errors = self.job_repo.list_all_errors(job_id)?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(ERROR_CSV_HEADERS)?;
        for err in &errors {
            writer.write_record([
                err.row_number.to_string().as_str(),
                err.sheet_name.as_str(),
                err.entity_type.as_str(),
                err.error_kind.as_str(),
                err.error_message.as_str(),
                err.field_name.as_deref().unwrap_or(""),
                err.invalid_value.as_deref().unwrap_or(""),
            ])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| ApiError::ExportError(e.to_string()))?;
        let csv = String::from_utf8(bytes).map_err(|e| ApiError::ExportError(e.to_string()))?;

        info!(job_id = %job_id, rows = errors.len(), "错误记录已导出");
        Ok(csv)
    }

    /// 分页查询单任务的审计条目
    pub fn list_job_audit(
        &self,
        job_id: &str,
        page: Option<usize>,
        page_size: Option<usize>,
    ) -> ApiResult<Page<SyncAuditEntry>> {
        self.get_job(job_id)?;
        Ok(self
            .job_repo
            .list_audit(job_id, PageRequest::new(page, page_size))?)
    }

    // ==========================================
    // 配置
    // ==========================================

    /// 读取配置（凭证路径脱敏）
    pub fn get_config(&self) -> ApiResult<ConfigView> {
        let settings = self.config_manager.resolve()?.masked();
        let overridden_keys = self.config_manager.list_overrides()?.into_keys().collect();
        Ok(ConfigView {
            settings,
            overridden_keys,
        })
    }

    /// 更新配置（空值清除覆写）
    pub fn update_config(
        &self,
        key: &str,
        value: &str,
        updated_by: Option<&str>,
    ) -> ApiResult<ConfigView> {
        self.config_manager.set_value(key, value, updated_by)?;
        self.get_config()
    }
}

fn non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_opt<T>(raw: Option<&str>, field: &str, parse: fn(&str) -> Option<T>) -> ApiResult<Option<T>> {
    match non_empty(raw) {
        None => Ok(None),
        Some(value) => parse(&value)
            .map(Some)
            .ok_or_else(|| ApiError::InvalidInput(format!("{} 取值无效: {}", field, value))),
    }
}
