// ==========================================
// 设备预防性维护排程系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供排程引擎所需的表结构（幂等）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 数据库路径覆盖用环境变量
pub const DB_PATH_ENV: &str = "PM_SCHEDULER_DB_PATH";

const DEFAULT_DB_FILE: &str = "pm_scheduler.db";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开共享连接（仓储层统一使用 Arc<Mutex<Connection>>）
pub fn open_shared_connection(db_path: &str) -> rusqlite::Result<Arc<Mutex<Connection>>> {
    Ok(Arc::new(Mutex::new(open_sqlite_connection(db_path)?)))
}

/// 初始化排程引擎 schema（幂等）
///
/// 说明：
/// - weekly_pm_schedules 上的部分唯一索引在存储层兜底
///   "同一 (设备, PM 类型) 至多一条 Scheduled" 约束
/// - equipment / cannot_find_assets / run_to_failure_assets 由外部系统维护，
///   这里建表仅保证本地库可独立运行
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope_type, scope_key)
        );

        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS equipment (
            bfm_equipment_no TEXT PRIMARY KEY,
            description TEXT,
            priority TEXT,
            monthly_pm INTEGER NOT NULL DEFAULT 0,
            annual_pm INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'Active',
            last_monthly_pm TEXT,
            last_annual_pm TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS pm_completions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bfm_equipment_no TEXT NOT NULL,
            pm_type TEXT NOT NULL,
            completion_date TEXT NOT NULL,
            technician_name TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS weekly_pm_schedules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            week_start_date TEXT NOT NULL,
            bfm_equipment_no TEXT NOT NULL,
            pm_type TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('Scheduled', 'Completed', 'Conflicted')),
            seq_no INTEGER NOT NULL DEFAULT 0,
            assigned_technician TEXT,
            note TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS cannot_find_assets (
            bfm_equipment_no TEXT PRIMARY KEY,
            reported_by TEXT,
            reported_date TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS run_to_failure_assets (
            bfm_equipment_no TEXT PRIMARY KEY,
            approved_by TEXT,
            approved_date TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_pm_completions_equipment
            ON pm_completions(bfm_equipment_no, pm_type);
        CREATE INDEX IF NOT EXISTS idx_pm_completions_date
            ON pm_completions(completion_date);
        CREATE INDEX IF NOT EXISTS idx_weekly_pm_week
            ON weekly_pm_schedules(week_start_date);
        CREATE UNIQUE INDEX IF NOT EXISTS uq_weekly_pm_single_active
            ON weekly_pm_schedules(bfm_equipment_no, pm_type)
            WHERE status = 'Scheduled';
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

/// 默认数据库路径
///
/// 优先级:
/// 1. 环境变量 PM_SCHEDULER_DB_PATH
/// 2. 系统数据目录下 pm-scheduler/pm_scheduler.db
/// 3. 当前目录 pm_scheduler.db
pub fn default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    match dirs::data_dir() {
        Some(dir) => {
            let app_dir = dir.join("pm-scheduler");
            if let Err(e) = std::fs::create_dir_all(&app_dir) {
                tracing::warn!(dir = %app_dir.display(), error = %e, "无法创建数据目录，改用当前目录");
                return DEFAULT_DB_FILE.to_string();
            }
            app_dir.join(DEFAULT_DB_FILE).to_string_lossy().to_string()
        }
        None => DEFAULT_DB_FILE.to_string(),
    }
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_single_active_index_rejects_second_scheduled_row() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let insert = "INSERT INTO weekly_pm_schedules
            (week_start_date, bfm_equipment_no, pm_type, status) VALUES (?1, 'E1', 'Monthly', ?2)";
        conn.execute(insert, ["2026-10-05", "Scheduled"]).unwrap();
        conn.execute(insert, ["2026-10-12", "Completed"]).unwrap();
        conn.execute(insert, ["2026-10-19", "Conflicted"]).unwrap();

        let err = conn.execute(insert, ["2026-10-26", "Scheduled"]).unwrap_err();
        assert!(err.to_string().contains("UNIQUE"));
    }

    #[test]
    fn test_read_schema_version_without_table() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);
    }
}
