// ==========================================
// 设备预防性维护排程系统 - 排除名单仓储
// ==========================================
// 数据源: cannot_find_assets / run_to_failure_assets / equipment.status
// 红线: 排程引擎只调用 load_registry（只读）；名单维护由外部流程负责
// ==========================================

use crate::domain::exclusion::ExclusionRegistry;
use crate::domain::types::EquipmentStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

pub struct ExclusionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ExclusionRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn collect_ids(conn: &Connection, sql: &str) -> RepositoryResult<HashSet<String>> {
        let mut stmt = conn.prepare(sql)?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids.into_iter().map(|id| id.trim().to_string()).collect())
    }

    /// 加载排除登记快照
    ///
    /// 合并两类来源:
    /// - 名单表 (cannot_find_assets / run_to_failure_assets)
    /// - 台账状态列 (equipment.status)，与台账读取共用 EquipmentStatus 解析
    pub fn load_registry(&self) -> RepositoryResult<ExclusionRegistry> {
        let conn = self.get_conn()?;

        let mut missing = Self::collect_ids(&conn, "SELECT bfm_equipment_no FROM cannot_find_assets")?;
        let mut run_to_failure =
            Self::collect_ids(&conn, "SELECT bfm_equipment_no FROM run_to_failure_assets")?;

        let mut stmt = conn.prepare(
            "SELECT bfm_equipment_no, status FROM equipment WHERE status IS NOT NULL",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<(String, String)>, _>>()?;

        for (equipment_id, raw_status) in rows {
            // 无法解析的状态由台账读取报告为无效记录
            match raw_status.parse::<EquipmentStatus>() {
                Ok(EquipmentStatus::Missing) => {
                    missing.insert(equipment_id.trim().to_string());
                }
                Ok(EquipmentStatus::RunToFailure) => {
                    run_to_failure.insert(equipment_id.trim().to_string());
                }
                Ok(EquipmentStatus::Active) | Err(_) => {}
            }
        }

        Ok(ExclusionRegistry::new(missing, run_to_failure))
    }

    /// 登记找不到的设备（外部流程/测试使用）
    pub fn add_missing(&self, equipment_id: &str, reported_by: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO cannot_find_assets (bfm_equipment_no, reported_by) VALUES (?1, ?2)",
            params![equipment_id, reported_by],
        )?;
        Ok(())
    }

    /// 登记运行至失效的设备（外部流程/测试使用）
    pub fn add_run_to_failure(&self, equipment_id: &str, approved_by: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO run_to_failure_assets (bfm_equipment_no, approved_by) VALUES (?1, ?2)",
            params![equipment_id, approved_by],
        )?;
        Ok(())
    }

    /// 设备找回后移出名单
    pub fn remove_missing(&self, equipment_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let n = conn.execute(
            "DELETE FROM cannot_find_assets WHERE bfm_equipment_no = ?1",
            params![equipment_id],
        )?;
        Ok(n > 0)
    }
}
