// ==========================================
// 设备预防性维护排程系统 - 完工记录仓储
// ==========================================
// 红线: pm_completions 是"最近完成"的唯一权威来源，优先于台账缓存字段
// 红线: 排程引擎只读本表；record_completion 仅供外部完工登记流程调用
// ==========================================

use crate::domain::schedule::CompletionRecord;
use crate::domain::types::PmType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::{format_datetime, get_datetime, get_enum};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// 完工登记结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutcome {
    pub completion_id: i64,
    /// 被置为 Completed 的排程条目（无未完成条目时为 None）
    pub retired_entry_id: Option<i64>,
}

pub struct CompletionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CompletionRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<CompletionRecord> {
        Ok(CompletionRecord {
            completion_id: Some(row.get(0)?),
            equipment_id: row.get(1)?,
            pm_type: get_enum(row, 2)?,
            completed_at: get_datetime(row, 3)?,
            technician: row.get(4)?,
        })
    }

    /// 查询最近一次完工（按完工时间）
    pub fn last_completion(
        &self,
        equipment_id: &str,
        pm_type: PmType,
    ) -> RepositoryResult<Option<CompletionRecord>> {
        let conn = self.get_conn()?;

        let record = conn
            .query_row(
                r#"SELECT id, bfm_equipment_no, pm_type, completion_date, technician_name
                   FROM pm_completions
                   WHERE bfm_equipment_no = ?1 AND pm_type = ?2
                   ORDER BY completion_date DESC, id DESC
                   LIMIT 1"#,
                params![equipment_id, pm_type.as_str()],
                Self::map_row,
            )
            .optional()?;

        Ok(record)
    }

    /// 批量查询每个 (设备, PM 类型) 的最近完工
    ///
    /// 用于请求级快照，避免逐台设备查询
    pub fn last_completions(&self) -> RepositoryResult<HashMap<(String, PmType), CompletionRecord>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT id, bfm_equipment_no, pm_type, completion_date, technician_name
               FROM pm_completions
               WHERE pm_type IN ('Monthly', 'Annual')
               ORDER BY completion_date ASC, id ASC"#,
        )?;

        let records = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<CompletionRecord>, _>>()?;

        // 升序遍历，后写入者即最近一次
        let mut latest = HashMap::with_capacity(records.len());
        for record in records {
            latest.insert((record.equipment_id.clone(), record.pm_type), record);
        }

        Ok(latest)
    }

    /// 查询设备的完工历史（最近在前）
    pub fn list_for_equipment(&self, equipment_id: &str) -> RepositoryResult<Vec<CompletionRecord>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT id, bfm_equipment_no, pm_type, completion_date, technician_name
               FROM pm_completions
               WHERE bfm_equipment_no = ?1
               ORDER BY completion_date DESC, id DESC"#,
        )?;

        let records = stmt
            .query_map(params![equipment_id], Self::map_row)?
            .collect::<Result<Vec<CompletionRecord>, _>>()?;

        Ok(records)
    }

    /// 登记完工（外部完工登记流程）
    ///
    /// 单事务内:
    /// 1. 写入 pm_completions
    /// 2. 将该 (设备, PM 类型) 的 Scheduled 条目置为 Completed
    pub fn record_completion(&self, record: &CompletionRecord) -> RepositoryResult<CompletionOutcome> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            r#"INSERT INTO pm_completions (
                    bfm_equipment_no, pm_type, completion_date, technician_name
                ) VALUES (?1, ?2, ?3, ?4)"#,
            params![
                &record.equipment_id,
                record.pm_type.as_str(),
                format_datetime(&record.completed_at),
                &record.technician,
            ],
        )?;
        let completion_id = tx.last_insert_rowid();

        let retired_entry_id: Option<i64> = tx
            .query_row(
                r#"SELECT id FROM weekly_pm_schedules
                   WHERE bfm_equipment_no = ?1 AND pm_type = ?2 AND status = 'Scheduled'"#,
                params![&record.equipment_id, record.pm_type.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(entry_id) = retired_entry_id {
            tx.execute(
                "UPDATE weekly_pm_schedules SET status = 'Completed' WHERE id = ?1",
                params![entry_id],
            )?;
        }

        tx.commit()?;

        Ok(CompletionOutcome {
            completion_id,
            retired_entry_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use chrono::NaiveDate;

    fn setup() -> (Arc<Mutex<Connection>>, CompletionRepository) {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        (conn.clone(), CompletionRepository::new(conn))
    }

    fn at(y: i32, m: u32, d: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(10, 0, 0).unwrap()
    }

    #[test]
    fn test_last_completion_picks_latest_timestamp() {
        let (_conn, repo) = setup();
        repo.record_completion(&CompletionRecord::new("E1", PmType::Monthly, at(2026, 8, 1), "amy"))
            .unwrap();
        repo.record_completion(&CompletionRecord::new("E1", PmType::Monthly, at(2026, 9, 1), "bob"))
            .unwrap();
        repo.record_completion(&CompletionRecord::new("E1", PmType::Annual, at(2026, 1, 1), "amy"))
            .unwrap();

        let last = repo.last_completion("E1", PmType::Monthly).unwrap().unwrap();
        assert_eq!(last.completed_at, at(2026, 9, 1));
        assert_eq!(last.technician, "bob");

        let bulk = repo.last_completions().unwrap();
        assert_eq!(bulk.len(), 2);
        assert_eq!(bulk[&("E1".to_string(), PmType::Monthly)].completed_at, at(2026, 9, 1));

        assert!(repo.last_completion("E2", PmType::Monthly).unwrap().is_none());
    }

    #[test]
    fn test_record_completion_retires_active_entry() {
        let (conn, repo) = setup();
        conn.lock()
            .unwrap()
            .execute(
                "INSERT INTO weekly_pm_schedules (week_start_date, bfm_equipment_no, pm_type, status)
                 VALUES ('2026-09-28', 'E1', 'Monthly', 'Scheduled')",
                [],
            )
            .unwrap();

        let outcome = repo
            .record_completion(&CompletionRecord::new("E1", PmType::Monthly, at(2026, 9, 30), "amy"))
            .unwrap();
        assert!(outcome.retired_entry_id.is_some());

        let status: String = conn
            .lock()
            .unwrap()
            .query_row("SELECT status FROM weekly_pm_schedules WHERE bfm_equipment_no = 'E1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(status, "Completed");

        // 无未完成条目时只写完工记录
        let outcome = repo
            .record_completion(&CompletionRecord::new("E1", PmType::Annual, at(2026, 9, 30), "amy"))
            .unwrap();
        assert_eq!(outcome.retired_entry_id, None);
    }
}
