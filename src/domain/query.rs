// ==========================================
// 水产销售管理系统 - 查询与分页模型
// ==========================================
// 职责: 历史任务 / 行级错误查询的过滤条件、排序白名单与分页形态
// ==========================================

use crate::domain::types::{EntityType, ErrorKind, SyncStatus};
use serde::{Deserialize, Serialize};

/// 默认每页条数
pub const DEFAULT_PAGE_SIZE: usize = 50;
/// 每页条数上限
pub const MAX_PAGE_SIZE: usize = 500;

// ==========================================
// PageRequest - 分页请求（页码 1 起）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}

impl PageRequest {
    /// 构造并夹紧到合法区间
    pub fn new(page: Option<usize>, page_size: Option<usize>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page - 1) * self.page_size
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

// ==========================================
// Page - 分页结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: usize, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            page_size: request.page_size,
            total_pages: total.div_ceil(request.page_size),
        }
    }
}

// ==========================================
// 排序
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

/// 历史任务排序字段（白名单，直接映射列名）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobSortKey {
    #[default]
    CreatedAt,
    StartedAt,
    CompletedAt,
    Status,
    RecordsProcessed,
    RecordsInserted,
    RecordsFailed,
}

impl JobSortKey {
    pub fn column(&self) -> &'static str {
        match self {
            JobSortKey::CreatedAt => "created_at",
            JobSortKey::StartedAt => "started_at",
            JobSortKey::CompletedAt => "completed_at",
            JobSortKey::Status => "status",
            JobSortKey::RecordsProcessed => "records_processed",
            JobSortKey::RecordsInserted => "records_inserted",
            JobSortKey::RecordsFailed => "records_failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "created_at" => Some(JobSortKey::CreatedAt),
            "started_at" => Some(JobSortKey::StartedAt),
            "completed_at" => Some(JobSortKey::CompletedAt),
            "status" => Some(JobSortKey::Status),
            "records_processed" => Some(JobSortKey::RecordsProcessed),
            "records_inserted" => Some(JobSortKey::RecordsInserted),
            "records_failed" => Some(JobSortKey::RecordsFailed),
            _ => None,
        }
    }
}

// ==========================================
// 过滤条件
// ==========================================

/// 历史任务查询
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobQuery {
    pub status: Option<SyncStatus>,
    pub source: Option<String>,
    pub triggered_by: Option<String>,
    pub sort_by: JobSortKey,
    pub sort_dir: SortDirection,
}

/// 单任务行级错误查询
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorQuery {
    pub entity_type: Option<EntityType>,
    pub error_kind: Option<ErrorKind>,
    pub sheet_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_clamp() {
        let req = PageRequest::new(Some(0), Some(10_000));
        assert_eq!(req.page, 1);
        assert_eq!(req.page_size, MAX_PAGE_SIZE);

        let req = PageRequest::new(Some(3), Some(0));
        assert_eq!(req.page_size, 1);
        assert_eq!(req.offset(), 2);

        assert_eq!(PageRequest::default().page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_total_pages() {
        let page: Page<u8> = Page::new(vec![], 101, PageRequest::new(Some(1), Some(50)));
        assert_eq!(page.total_pages, 3);

        let empty: Page<u8> = Page::new(vec![], 0, PageRequest::default());
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn test_sort_key_whitelist() {
        assert_eq!(JobSortKey::parse("records_failed"), Some(JobSortKey::RecordsFailed));
        assert_eq!(JobSortKey::parse("job_id; DROP TABLE sync_jobs"), None);
        assert_eq!(SortDirection::parse("ASC"), Some(SortDirection::Asc));
    }
}
