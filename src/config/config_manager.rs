// ==========================================
// 水产销售管理系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: sync_config 表 (key-value)；环境变量提供默认值
// ==========================================

use crate::config::sync_config::{config_keys, ConfigError, ConfigResult, SyncSettings};
use crate::config::sync_config_trait::SyncConfigReader;
use crate::repository::error::RepositoryError;
use crate::repository::row_mapping::ts_to_sql;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, Result as SqliteResult};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
    env_defaults: SyncSettings,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    ///
    /// # 参数
    /// - conn: 共享连接（schema 已初始化）
    /// - env_defaults: 环境变量解析出的默认配置
    pub fn new(conn: Arc<Mutex<Connection>>, env_defaults: SyncSettings) -> Self {
        Self { conn, env_defaults }
    }

    /// 以进程环境变量为默认值创建
    pub fn from_env(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        Ok(Self::new(conn, SyncSettings::from_env()?))
    }

    fn get_conn(&self) -> ConfigResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ConfigError::Storage(RepositoryError::LockError(e.to_string())))
    }

    /// 从 sync_config 表读取覆写值
    ///
    /// # 返回
    /// - Some(String): 覆写值
    /// - None: 未覆写
    pub fn get_override(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.get_conn()?;

        let result = conn.query_row(
            "SELECT value FROM sync_config WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(ConfigError::Storage(e.into())),
        }
    }

    /// 全部覆写值
    pub fn list_overrides(&self) -> ConfigResult<BTreeMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn
            .prepare("SELECT key, value FROM sync_config ORDER BY key")
            .map_err(RepositoryError::from)?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(RepositoryError::from)?
            .collect::<SqliteResult<BTreeMap<_, _>>>()
            .map_err(RepositoryError::from)?;
        Ok(rows)
    }

    /// 写入覆写值（先校验；空值表示删除覆写，回落到环境变量）
    ///
    /// # 参数
    /// - key: 配置键（须在 config_keys::ALL 内）
    /// - value: 新值
    /// - updated_by: 操作人
    pub fn set_value(&self, key: &str, value: &str, updated_by: Option<&str>) -> ConfigResult<()> {
        let mut candidate = self.env_defaults.clone();
        candidate.apply(key, value)?;

        let conn = self.get_conn()?;
        let value = value.trim();
        if value.is_empty() {
            conn.execute("DELETE FROM sync_config WHERE key = ?1", params![key])
                .map_err(RepositoryError::from)?;
            info!(config_key = %key, "配置覆写已清除");
            return Ok(());
        }

        conn.execute(
            r#"
            INSERT INTO sync_config (key, value, updated_at, updated_by) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at,
                updated_by = excluded.updated_by
            "#,
            params![key, value, ts_to_sql(&Utc::now()), updated_by],
        )
        .map_err(RepositoryError::from)?;

        // 凭证路径不入日志
        if key == config_keys::CREDENTIALS_PATH {
            info!(config_key = %key, "配置已更新");
        } else {
            info!(config_key = %key, value = %value, "配置已更新");
        }
        Ok(())
    }

    /// 合并环境变量默认值与覆写值
    pub fn resolve(&self) -> ConfigResult<SyncSettings> {
        let mut settings = self.env_defaults.clone();
        for (key, value) in self.list_overrides()? {
            if let Err(e) = settings.apply(&key, &value) {
                warn!(config_key = %key, error = %e, "配置覆写无效，沿用默认值");
            }
        }
        Ok(settings)
    }
}

// ==========================================
// SyncConfigReader Trait 实现
// ==========================================
#[async_trait]
impl SyncConfigReader for ConfigManager {
    async fn load_settings(&self) -> ConfigResult<SyncSettings> {
        self.resolve()
    }
}
