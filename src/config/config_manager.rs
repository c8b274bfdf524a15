// ==========================================
// 设备预防性维护排程系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::scheduler_config_trait::{ConfigReadResult, SchedulerConfigReader};
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

type ManagerResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ManagerResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ManagerResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> ManagerResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供 CLI 等复用）
    pub fn get_global_config_value(&self, key: &str) -> ManagerResult<Option<String>> {
        self.get_config_value(key)
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> ManagerResult<String> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 解析数值配置；格式错误时告警并回退默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> ManagerResult<T>
    where
        T: std::str::FromStr + Copy + std::fmt::Display,
    {
        let Some(raw) = self.get_config_value(key)? else {
            return Ok(default);
        };

        match raw.trim().parse::<T>() {
            Ok(value) => Ok(value),
            Err(_) => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    default = %default,
                    "配置值格式错误，使用默认值"
                );
                Ok(default)
            }
        }
    }

    /// 写入 global scope 配置（存在则覆盖）
    pub fn set_global_value(&self, key: &str, value: &str) -> ManagerResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;

        Ok(())
    }

    /// 获取所有 global 配置的快照（JSON格式，键有序）
    ///
    /// # 用途
    /// - 写入生成报告，便于事后追溯本次排程使用的配置
    pub fn get_config_snapshot(&self) -> ManagerResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }
}

// ==========================================
// SchedulerConfigReader Trait 实现
// ==========================================
#[async_trait]
impl SchedulerConfigReader for ConfigManager {
    async fn get_monthly_interval_days(&self) -> ConfigReadResult<i64> {
        self.get_parsed_or_default(config_keys::MONTHLY_INTERVAL_DAYS, 30)
    }

    async fn get_annual_interval_days(&self) -> ConfigReadResult<i64> {
        self.get_parsed_or_default(config_keys::ANNUAL_INTERVAL_DAYS, 365)
    }

    async fn get_cross_type_conflict_days(&self) -> ConfigReadResult<i64> {
        self.get_parsed_or_default(config_keys::CROSS_TYPE_CONFLICT_DAYS, 7)
    }

    async fn get_max_weekly_assignments(&self) -> ConfigReadResult<usize> {
        self.get_parsed_or_default(config_keys::MAX_WEEKLY_ASSIGNMENTS, 0)
    }

    async fn get_technicians(&self) -> ConfigReadResult<Vec<String>> {
        let value = self.get_config_or_default(config_keys::TECHNICIANS, "[]")?;
        let names: Vec<String> = serde_json::from_str::<Vec<String>>(&value)
            .unwrap_or_else(|_| {
                tracing::warn!(
                    config_key = config_keys::TECHNICIANS,
                    raw_value = %value,
                    "技术员名单格式错误，按未配置处理"
                );
                Vec::new()
            })
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        Ok(names)
    }

    async fn get_config_snapshot_json(&self) -> ConfigReadResult<String> {
        self.get_config_snapshot()
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 再完工间隔
    pub const MONTHLY_INTERVAL_DAYS: &str = "pm.monthly_interval_days";
    pub const ANNUAL_INTERVAL_DAYS: &str = "pm.annual_interval_days";

    // 跨类型冲突窗口
    pub const CROSS_TYPE_CONFLICT_DAYS: &str = "pm.cross_type_conflict_days";

    // 产能
    pub const MAX_WEEKLY_ASSIGNMENTS: &str = "pm.max_weekly_assignments";

    // 技术员名单 (JSON 数组)
    pub const TECHNICIANS: &str = "pm.technicians";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn setup() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_when_unset() {
        let manager = setup();
        assert_eq!(manager.get_monthly_interval_days().await.unwrap(), 30);
        assert_eq!(manager.get_annual_interval_days().await.unwrap(), 365);
        assert_eq!(manager.get_cross_type_conflict_days().await.unwrap(), 7);
        assert_eq!(manager.get_max_weekly_assignments().await.unwrap(), 0);
        assert!(manager.get_technicians().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overrides_and_malformed_values() {
        let manager = setup();
        manager.set_global_value(config_keys::MONTHLY_INTERVAL_DAYS, "28").unwrap();
        manager.set_global_value(config_keys::ANNUAL_INTERVAL_DAYS, "a year").unwrap();
        manager
            .set_global_value(config_keys::TECHNICIANS, r#"["amy", " ", "bob"]"#)
            .unwrap();

        assert_eq!(manager.get_monthly_interval_days().await.unwrap(), 28);
        assert_eq!(manager.get_annual_interval_days().await.unwrap(), 365);
        assert_eq!(manager.get_technicians().await.unwrap(), vec!["amy", "bob"]);

        // 覆盖写入
        manager.set_global_value(config_keys::MONTHLY_INTERVAL_DAYS, "31").unwrap();
        assert_eq!(
            manager
                .get_global_config_value(config_keys::MONTHLY_INTERVAL_DAYS)
                .unwrap()
                .as_deref(),
            Some("31")
        );
    }

    #[test]
    fn test_config_snapshot_contains_global_keys() {
        let manager = setup();
        manager.set_global_value(config_keys::CROSS_TYPE_CONFLICT_DAYS, "5").unwrap();

        let snapshot: BTreeMap<String, String> =
            serde_json::from_str(&manager.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(snapshot.get("pm.cross_type_conflict_days").map(String::as_str), Some("5"));
    }
}
