// ==========================================
// 水产销售管理系统 - 同步编排器
// ==========================================
// 职责: 任务生命周期 + 实体依赖顺序 + 逐行事务落库 + 终态判定
// 流程: 触发(pending) → 加锁 → running → 读取全部工作表 → 解析/校验
//       → 逐行落库 → 错误落库 + 终态 → 释放锁
// 红线: 触发方只等待任务创建；运行在后台任务中执行
//       行处理阶段在阻塞线程池执行，连接按行加锁（不跨行持有）
// ==========================================

use crate::config::{SyncConfigReader, SyncSettings};
use crate::domain::sheet::{ParsedRow, ValidationError};
use crate::domain::sync_job::{ErrorSummary, SyncCounts, SyncErrorRecord, SyncJob, SyncJobMetadata};
use crate::domain::types::{in_sync_order, EntityType, SyncMode, SyncStatus};
use crate::engine::error::{SyncEngineError, SyncEngineResult};
use crate::engine::repositories::SyncRepositories;
use crate::engine::row_sync::{sync_row, RowOutcome, SyncTarget};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::row_parser::{parse_rows, CellGrid};
use crate::importer::sheet_transport::{
    SheetRange, SheetTransport, SheetTransportFactory, TransportSettings,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{JobCompletion, TargetStoreRepository};
use crate::validation::{
    validate_rows, BatchValidator, CustomerValidator, OrderValidator, RowValidator,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn, Span};

/// 同步锁有效期 = 运行超时 + 宽限（超过后视为进程中断遗留）
pub const LOCK_STALE_GRACE_SECS: u64 = 300;

/// 时长上限（超大配置值按此截断）
const MAX_WINDOW_SECS: u64 = 365 * 24 * 3600;

// ==========================================
// SyncRequest - 触发参数
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct SyncRequest {
    /// 表格标识（为空则取配置的默认表格）
    pub sheet_id: Option<String>,
    /// 实体类型子集（为空则同步全部）
    pub entity_types: Vec<String>,
    /// 导入模式（为空则 insert_only）
    pub mode: Option<String>,
    pub triggered_by: Option<String>,
}

// ==========================================
// TriggeredSync - 触发结果
// ==========================================
// handle 完成时返回任务终态
#[derive(Debug)]
pub struct TriggeredSync {
    pub job_id: String,
    pub status: SyncStatus,
    pub handle: JoinHandle<SyncStatus>,
}

/// 一次运行中已读取的工作表
struct FetchedTab {
    entity_type: EntityType,
    range: SheetRange,
    grid: CellGrid,
}

/// 行处理阶段累计
#[derive(Default)]
struct RunTally {
    counts: SyncCounts,
    errors: Vec<ValidationError>,
    deadline_hit: bool,
}

// ==========================================
// SyncOrchestrator
// ==========================================
#[derive(Clone)]
pub struct SyncOrchestrator {
    repos: SyncRepositories,
    config: Arc<dyn SyncConfigReader>,
    transports: Arc<dyn SheetTransportFactory>,
}

impl SyncOrchestrator {
    /// 创建编排器
    ///
    /// # 参数
    /// - repos: 仓储集合
    /// - config: 配置读取器（每次触发时解析）
    /// - transports: 表格传输层工厂（每次运行构造一个传输层）
    pub fn new(
        repos: SyncRepositories,
        config: Arc<dyn SyncConfigReader>,
        transports: Arc<dyn SheetTransportFactory>,
    ) -> Self {
        Self {
            repos,
            config,
            transports,
        }
    }

    /// 触发同步
    ///
    /// 同步完成任务创建后立即返回；运行在后台任务中继续
    ///
    /// # 返回
    /// - Ok(TriggeredSync): 任务已创建（pending）
    /// - Err: 触发被拒绝（未创建任务）
    pub async fn trigger_sync(&self, request: SyncRequest) -> SyncEngineResult<TriggeredSync> {
        let settings = self.config.load_settings().await?;
        if !settings.enabled {
            return Err(SyncEngineError::SyncDisabled);
        }

        let sheet_id = request
            .sheet_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| settings.default_sheet_id.clone())
            .ok_or(SyncEngineError::MissingSheetId)?;

        let entity_types = resolve_entity_types(&request.entity_types)?;
        let mode = match request.mode.as_deref() {
            None => SyncMode::default(),
            Some(raw) => {
                SyncMode::parse(raw).ok_or_else(|| SyncEngineError::UnsupportedMode(raw.to_string()))?
            }
        };

        let metadata = SyncJobMetadata {
            sheet_id,
            entity_types,
            mode,
        };
        let job = SyncJob::pending(
            uuid::Uuid::new_v4().to_string(),
            request.triggered_by.clone(),
            metadata.clone(),
        );
        self.repos.job_repo.insert(&job)?;

        info!(
            job_id = %job.job_id,
            sheet_id = %metadata.sheet_id,
            entity_types = ?metadata.entity_types,
            triggered_by = ?job.triggered_by,
            "同步任务已创建"
        );

        let this = self.clone();
        let job_id = job.job_id.clone();
        let handle = tokio::spawn(async move { this.run_job(job_id, metadata, settings).await });

        Ok(TriggeredSync {
            job_id: job.job_id,
            status: job.status,
            handle,
        })
    }

    /// 单次运行（后台任务入口）
    #[instrument(skip(self, metadata, settings), fields(job_id = %job_id, sheet_id = %metadata.sheet_id))]
    async fn run_job(
        &self,
        job_id: String,
        metadata: SyncJobMetadata,
        settings: SyncSettings,
    ) -> SyncStatus {
        let lock_key = metadata.sheet_id.clone();
        let stale_after = lock_stale_after(settings.run_timeout_secs);
        if let Err(e) = self.repos.job_repo.acquire_lock(&lock_key, &job_id, stale_after) {
            let message = match &e {
                RepositoryError::SyncLockHeld { holder_job_id, .. } => {
                    format!("表格 {} 正在被任务 {} 同步", lock_key, holder_job_id)
                }
                other => format!("获取同步锁失败: {}", other),
            };
            warn!(error = %message, "未获取到同步锁");
            return self.finish(&job_id, JobCompletion::fatal(message));
        }
        info!(lock_key = %lock_key, "已获取同步锁");

        let completion = self.execute(&job_id, &metadata, &settings).await;
        let status = self.finish(&job_id, completion);

        match self.repos.job_repo.release_lock(&lock_key, &job_id) {
            Ok(_) => {}
            Err(e) => error!(lock_key = %lock_key, error = %e, "释放同步锁失败"),
        }
        status
    }

    /// running 阶段: 读取 → 解析/校验 → 落库
    async fn execute(
        &self,
        job_id: &str,
        metadata: &SyncJobMetadata,
        settings: &SyncSettings,
    ) -> JobCompletion {
        if let Err(e) = self.repos.job_repo.mark_running(job_id) {
            error!(error = %e, "任务无法进入 running");
            return JobCompletion::fatal(e.to_string());
        }
        let deadline =
            Instant::now() + Duration::from_secs(settings.run_timeout_secs.min(MAX_WINDOW_SECS));

        // 运行级致命错误（任何行处理之前）
        let tabs = match self.fetch_all(metadata, settings).await {
            Ok(tabs) => tabs,
            Err(e) => {
                error!(error = %e, "读取表格失败，任务终止");
                return JobCompletion::fatal(e.to_string());
            }
        };

        // 行处理阶段移出异步工作线程
        let target_repo = Arc::clone(&self.repos.target_repo);
        let row_job_id = job_id.to_string();
        let span = Span::current();
        let joined = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            process_tabs(&target_repo, &row_job_id, tabs, deadline)
        })
        .await;

        match joined {
            Ok(Ok(tally)) => build_completion(job_id, tally, settings.run_timeout_secs),
            Ok(Err(e)) => {
                error!(error = %e, "数据库连接不可用，任务终止");
                JobCompletion::fatal(e.to_string())
            }
            Err(e) => {
                error!(error = %e, "行处理任务异常退出");
                JobCompletion::fatal(format!("行处理任务异常退出: {}", e))
            }
        }
    }

    /// 构造传输层并按依赖顺序读取全部工作表
    async fn fetch_all(
        &self,
        metadata: &SyncJobMetadata,
        settings: &SyncSettings,
    ) -> ImportResult<Vec<FetchedTab>> {
        let transport = self.transports.create(&TransportSettings {
            sheet_id: metadata.sheet_id.clone(),
            credentials_path: settings.credentials_path.clone(),
        })?;

        let mut tabs = Vec::with_capacity(metadata.entity_types.len());
        for entity_type in in_sync_order(&metadata.entity_types) {
            let range = SheetRange::parse(settings.range_for(entity_type))?;
            let grid = fetch_with_timeout(
                transport.as_ref(),
                &metadata.sheet_id,
                &range,
                settings.fetch_timeout_secs,
            )
            .await?;
            info!(
                entity_type = %entity_type,
                range = %range,
                transport = transport.name(),
                grid_rows = grid.len(),
                "工作表读取完成"
            );
            tabs.push(FetchedTab {
                entity_type,
                range,
                grid,
            });
        }
        Ok(tabs)
    }

    /// 终态落库（落库失败时退回为仅记录致命错误）
    fn finish(&self, job_id: &str, completion: JobCompletion) -> SyncStatus {
        let status = completion.status;
        match self.repos.job_repo.finalize(job_id, &completion) {
            Ok(()) => {
                info!(
                    job_id = %job_id,
                    status = %status,
                    processed = completion.counts.processed,
                    inserted = completion.counts.inserted,
                    skipped = completion.counts.skipped,
                    failed = completion.counts.failed,
                    errors = completion.errors.len(),
                    "同步任务结束"
                );
                status
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "任务终态落库失败");
                let fallback = JobCompletion::fatal(format!("任务终态落库失败: {}", e));
                if let Err(e) = self.repos.job_repo.finalize(job_id, &fallback) {
                    error!(job_id = %job_id, error = %e, "任务无法标记为 failed");
                }
                SyncStatus::Failed
            }
        }
    }
}

/// 同步锁有效期
fn lock_stale_after(run_timeout_secs: u64) -> chrono::Duration {
    let secs = run_timeout_secs
        .saturating_add(LOCK_STALE_GRACE_SECS)
        .min(MAX_WINDOW_SECS);
    chrono::Duration::seconds(secs as i64)
}

/// 行处理阶段累计 → 终态落库参数
///
/// 运行超时记一条额外错误，参与终态判定
fn build_completion(job_id: &str, tally: RunTally, run_timeout_secs: u64) -> JobCompletion {
    let error_message = tally
        .deadline_hit
        .then(|| format!("运行超时（{} 秒），剩余行未处理", run_timeout_secs));
    let error_count = tally.errors.len() + usize::from(tally.deadline_hit);
    let status = SyncStatus::terminal_for(tally.counts.inserted, error_count);

    JobCompletion {
        status,
        counts: tally.counts,
        error_summary: ErrorSummary::from_errors(&tally.errors),
        error_message,
        errors: tally
            .errors
            .into_iter()
            .map(|e| SyncErrorRecord::from_validation_error(job_id, e))
            .collect(),
    }
}

/// 行处理阶段（阻塞线程池中执行）
///
/// # 返回
/// - Err: 数据库连接不可用（锁中毒）
fn process_tabs(
    target_repo: &TargetStoreRepository,
    job_id: &str,
    tabs: Vec<FetchedTab>,
    deadline: Instant,
) -> RepositoryResult<RunTally> {
    let mut tally = RunTally::default();

    for tab in tabs {
        let rows = parse_tab(&tab);
        tally.counts.processed += rows.len();
        let sheet_name = tab.range.tab.as_str();

        let finished = match tab.entity_type {
            EntityType::Customers => sync_entity(
                target_repo,
                &CustomerValidator::new(),
                job_id,
                sheet_name,
                rows,
                deadline,
                &mut tally,
            )?,
            EntityType::Batches => sync_entity(
                target_repo,
                &BatchValidator::new(),
                job_id,
                sheet_name,
                rows,
                deadline,
                &mut tally,
            )?,
            EntityType::Orders => sync_entity(
                target_repo,
                &OrderValidator::new(),
                job_id,
                sheet_name,
                rows,
                deadline,
                &mut tally,
            )?,
        };
        if !finished {
            warn!(entity_type = %tab.entity_type, "运行超时，停止处理");
            tally.deadline_hit = true;
            break;
        }
    }
    Ok(tally)
}

/// 解析实体类型子集（空 → 全部；按依赖顺序去重）
pub fn resolve_entity_types(raw: &[String]) -> SyncEngineResult<Vec<EntityType>> {
    if raw.is_empty() {
        return Ok(EntityType::SYNC_ORDER.to_vec());
    }
    let parsed = raw
        .iter()
        .map(|r| EntityType::parse(r).ok_or_else(|| SyncEngineError::UnknownEntityType(r.clone())))
        .collect::<SyncEngineResult<Vec<_>>>()?;
    Ok(in_sync_order(&parsed))
}

async fn fetch_with_timeout(
    transport: &dyn SheetTransport,
    sheet_id: &str,
    range: &SheetRange,
    seconds: u64,
) -> ImportResult<CellGrid> {
    tokio::time::timeout(Duration::from_secs(seconds), transport.fetch_range(sheet_id, range))
        .await
        .map_err(|_| ImportError::Timeout {
            operation: format!("读取 {}", range),
            seconds,
        })?
}

/// 网格 → 解析行（行号换算为表格物理行号）
fn parse_tab(tab: &FetchedTab) -> Vec<ParsedRow> {
    let mut rows = parse_rows(&tab.grid, 0);
    for row in &mut rows {
        row.row_number += tab.range.first_row;
    }
    rows
}

/// 单实体类型: 校验分区 → 逐行落库（每行单独加锁连接）
///
/// # 返回
/// - Ok(false): 到达运行截止时间，剩余行未处理
fn sync_entity<V>(
    target_repo: &TargetStoreRepository,
    validator: &V,
    job_id: &str,
    sheet_name: &str,
    rows: Vec<ParsedRow>,
    deadline: Instant,
    tally: &mut RunTally,
) -> RepositoryResult<bool>
where
    V: RowValidator,
    V::Draft: SyncTarget,
{
    let entity_type = validator.entity_type();
    let outcome = validate_rows(validator, sheet_name, rows);
    let invalid = outcome.errors.len();
    tally.counts.failed += invalid;
    tally.errors.extend(outcome.errors);

    let inserted_before = tally.counts.inserted_for(entity_type);
    let skipped_before = tally.counts.skipped;
    let failed_before = tally.counts.failed;

    for valid in &outcome.valid {
        if Instant::now() >= deadline {
            return Ok(false);
        }
        let outcome = {
            let mut conn = target_repo.get_conn()?;
            sync_row(&mut conn, job_id, sheet_name, valid)
        };
        match outcome {
            RowOutcome::Inserted { .. } => tally.counts.record_inserted(entity_type),
            RowOutcome::Duplicate(err) => {
                warn!(row_number = err.row_number, entity_type = %entity_type, message = %err.message, "重复记录");
                tally.counts.skipped += 1;
                tally.errors.push(err);
            }
            RowOutcome::Skipped => tally.counts.skipped += 1,
            RowOutcome::Failed(err) => {
                warn!(
                    row_number = err.row_number,
                    entity_type = %entity_type,
                    error_kind = %err.error_kind,
                    message = %err.message,
                    "行落库失败"
                );
                tally.counts.failed += 1;
                tally.errors.push(err);
            }
        }
    }

    info!(
        entity_type = %entity_type,
        sheet_name = %sheet_name,
        invalid,
        inserted = tally.counts.inserted_for(entity_type) - inserted_before,
        skipped = tally.counts.skipped - skipped_before,
        failed = tally.counts.failed - failed_before,
        "实体同步完成"
    );
    Ok(true)
}
