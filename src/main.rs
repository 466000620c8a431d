// ==========================================
// 水产销售管理系统 - 表格同步命令行入口
// ==========================================
// 子命令: sync / job / history / errors / audit / config
// 输出: JSON（errors --csv 时写出 CSV 文件）
// ==========================================

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use aqua_sheet_sync::api::{JobErrorsRequest, JobHistoryRequest, SyncApi};
use aqua_sheet_sync::config::ConfigManager;
use aqua_sheet_sync::engine::SyncRequest;
use aqua_sheet_sync::importer::LocalTransportFactory;
use aqua_sheet_sync::{db, logging};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "aqua-sheet-sync", version, about = "表格 → 客户/批次/订单 仅插入同步")]
struct Cli {
    /// SQLite 数据库路径（默认: 系统数据目录/aqua-sheet-sync/sync.db）
    #[arg(long, global = true, env = "SHEET_SYNC_DB_PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 触发同步并等待完成
    Sync {
        /// 表格标识（工作簿路径或 CSV 目录；默认取配置）
        #[arg(long)]
        sheet_id: Option<String>,
        /// 实体类型子集（可重复: customers / batches / orders）
        #[arg(long = "entity")]
        entities: Vec<String>,
        #[arg(long)]
        mode: Option<String>,
        #[arg(long, env = "USER")]
        triggered_by: Option<String>,
    },
    /// 查询单个任务
    Job { job_id: String },
    /// 历史任务
    History {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        triggered_by: Option<String>,
        #[arg(long)]
        sort_by: Option<String>,
        #[arg(long)]
        sort_dir: Option<String>,
        #[command(flatten)]
        paging: Paging,
    },
    /// 单任务行级错误
    Errors {
        job_id: String,
        #[arg(long)]
        entity_type: Option<String>,
        #[arg(long)]
        error_kind: Option<String>,
        #[arg(long)]
        sheet_name: Option<String>,
        /// 导出全部错误到 CSV 文件（忽略过滤与分页）
        #[arg(long)]
        csv: Option<PathBuf>,
        #[command(flatten)]
        paging: Paging,
    },
    /// 单任务审计条目
    Audit {
        job_id: String,
        #[command(flatten)]
        paging: Paging,
    },
    /// 配置读写
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug)]
struct Paging {
    #[arg(long)]
    page: Option<usize>,
    #[arg(long)]
    page_size: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// 显示当前配置（敏感值脱敏）
    Show,
    /// 写入覆写值（空串清除覆写）
    Set {
        key: String,
        value: String,
        #[arg(long, env = "USER")]
        by: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let cli = Cli::parse();
    let api = open_api(cli.db)?;

    match cli.command {
        Command::Sync {
            sheet_id,
            entities,
            mode,
            triggered_by,
        } => {
            let triggered = api
                .trigger_sync(SyncRequest {
                    sheet_id,
                    entity_types: entities,
                    mode,
                    triggered_by,
                })
                .await?;
            tracing::info!(job_id = %triggered.job_id, "等待同步任务结束");
            triggered.handle.await.context("同步任务异常退出")?;
            print_json(&api.get_job(&triggered.job_id)?)?;
        }
        Command::Job { job_id } => print_json(&api.get_job(&job_id)?)?,
        Command::History {
            status,
            source,
            triggered_by,
            sort_by,
            sort_dir,
            paging,
        } => {
            let page = api.list_jobs(&JobHistoryRequest {
                status,
                source,
                triggered_by,
                sort_by,
                sort_dir,
                page: paging.page,
                page_size: paging.page_size,
            })?;
            print_json(&page)?;
        }
        Command::Errors {
            job_id,
            entity_type,
            error_kind,
            sheet_name,
            csv,
            paging,
        } => match csv {
            Some(path) => {
                let content = api.export_job_errors_csv(&job_id)?;
                std::fs::write(&path, content)
                    .with_context(|| format!("写入 CSV 失败: {}", path.display()))?;
                println!("{}", path.display());
            }
            None => {
                let page = api.list_job_errors(
                    &job_id,
                    &JobErrorsRequest {
                        entity_type,
                        error_kind,
                        sheet_name,
                        page: paging.page,
                        page_size: paging.page_size,
                    },
                )?;
                print_json(&page)?;
            }
        },
        Command::Audit { job_id, paging } => {
            print_json(&api.list_job_audit(&job_id, paging.page, paging.page_size)?)?
        }
        Command::Config { action } => match action {
            ConfigAction::Show => print_json(&api.get_config()?)?,
            ConfigAction::Set { key, value, by } => {
                print_json(&api.update_config(&key, &value, by.as_deref())?)?
            }
        },
    }

    Ok(())
}

/// 打开数据库并组装 API
fn open_api(db_path: Option<PathBuf>) -> Result<SyncApi> {
    let db_path = db_path.unwrap_or_else(db::default_db_path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("无法创建数据目录: {}", parent.display()))?;
    }
    let path_str = db_path.to_string_lossy();
    tracing::debug!(db_path = %path_str, "打开数据库");

    let conn = db::open_and_init(&path_str)
        .with_context(|| format!("无法打开数据库: {}", path_str))?;
    let conn = Arc::new(Mutex::new(conn));
    let config_manager = Arc::new(ConfigManager::from_env(conn.clone())?);

    Ok(SyncApi::new(conn, config_manager, Arc::new(LocalTransportFactory)))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
