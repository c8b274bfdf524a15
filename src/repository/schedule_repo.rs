// ==========================================
// 设备预防性维护排程系统 - 周排程仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 周快照读取 (scheduled_this_week / active_schedules_outside_week)
//       必须在 replace_week 删除之前完成
// ==========================================

use crate::domain::schedule::{ScheduleEntry, WeekStats};
use crate::domain::types::{PmType, ScheduleStatus};
use crate::domain::week::Week;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::{format_datetime, get_date, get_datetime, get_enum};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::sync::{Arc, Mutex};

/// 周替换结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaceWeekOutcome {
    /// 删除的 Scheduled/Conflicted 行数
    pub deleted: usize,
    /// 新写入行数
    pub inserted: usize,
    /// 保留的 Completed 行数
    pub preserved_completed: usize,
}

// ==========================================
// ScheduleRepository - 周排程仓储
// ==========================================
pub struct ScheduleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ScheduleRepository {
    /// 创建新的ScheduleRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    const SELECT_COLUMNS: &'static str = r#"SELECT id, bfm_equipment_no, pm_type, week_start_date,
                      status, seq_no, assigned_technician, note, created_at
               FROM weekly_pm_schedules"#;

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ScheduleEntry> {
        let week_start = get_date(row, 3)?;
        let week = Week::new(week_start).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;

        Ok(ScheduleEntry {
            entry_id: Some(row.get(0)?),
            equipment_id: row.get(1)?,
            pm_type: get_enum(row, 2)?,
            week,
            status: get_enum(row, 4)?,
            seq_no: row.get(5)?,
            assigned_technician: row.get(6)?,
            note: row.get(7)?,
            created_at: get_datetime(row, 8)?,
        })
    }

    /// 查询指定 (设备, PM 类型) 在目标周之前的未完成条目
    ///
    /// # 返回
    /// - 按周升序
    pub fn uncompleted_schedules(
        &self,
        equipment_id: &str,
        pm_type: PmType,
        before_week: Week,
    ) -> RepositoryResult<Vec<ScheduleEntry>> {
        let conn = self.get_conn()?;

        let sql = format!(
            r#"{}
               WHERE bfm_equipment_no = ?1 AND pm_type = ?2
                 AND status = 'Scheduled' AND week_start_date < ?3
               ORDER BY week_start_date, id"#,
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(
                params![equipment_id, pm_type.as_str(), before_week.to_db_string()],
                Self::map_row,
            )?
            .collect::<Result<Vec<ScheduleEntry>, _>>()?;

        Ok(entries)
    }

    /// 批量查询目标周以外所有周的 Scheduled 条目
    ///
    /// 用于请求级快照：目标周本身的行即将被替换，不能作为"已排程"依据
    pub fn active_schedules_outside_week(&self, week: Week) -> RepositoryResult<Vec<ScheduleEntry>> {
        let conn = self.get_conn()?;

        let sql = format!(
            r#"{}
               WHERE status = 'Scheduled' AND week_start_date <> ?1
               ORDER BY week_start_date, id"#,
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![week.to_db_string()], Self::map_row)?
            .collect::<Result<Vec<ScheduleEntry>, _>>()?;

        Ok(entries)
    }

    /// 查询目标周的全部条目（任意状态），按 seq_no
    pub fn scheduled_this_week(&self, week: Week) -> RepositoryResult<Vec<ScheduleEntry>> {
        let conn = self.get_conn()?;

        let sql = format!(
            r#"{}
               WHERE week_start_date = ?1
               ORDER BY seq_no, id"#,
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![week.to_db_string()], Self::map_row)?
            .collect::<Result<Vec<ScheduleEntry>, _>>()?;

        Ok(entries)
    }

    /// 查询指定 (设备, PM 类型) 当前的 Scheduled 条目
    pub fn find_active(&self, equipment_id: &str, pm_type: PmType) -> RepositoryResult<Option<ScheduleEntry>> {
        let conn = self.get_conn()?;

        let sql = format!(
            r#"{}
               WHERE bfm_equipment_no = ?1 AND pm_type = ?2 AND status = 'Scheduled'"#,
            Self::SELECT_COLUMNS
        );
        let entry = conn
            .query_row(&sql, params![equipment_id, pm_type.as_str()], Self::map_row)
            .optional()?;

        Ok(entry)
    }

    /// 目标周中已完成条目数（用于覆写告警）
    pub fn completions_in_week(&self, week: Week) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;

        let n: i64 = conn.query_row(
            r#"SELECT COUNT(*) FROM weekly_pm_schedules
               WHERE week_start_date = ?1 AND status = 'Completed'"#,
            params![week.to_db_string()],
            |row| row.get(0),
        )?;

        Ok(n as usize)
    }

    /// 周完成率统计
    pub fn week_stats(&self, week: Week) -> RepositoryResult<WeekStats> {
        let conn = self.get_conn()?;

        let (total, scheduled, completed, conflicted): (i64, i64, i64, i64) = conn.query_row(
            r#"SELECT COUNT(*),
                      COALESCE(SUM(CASE WHEN status = 'Scheduled' THEN 1 ELSE 0 END), 0),
                      COALESCE(SUM(CASE WHEN status = 'Completed' THEN 1 ELSE 0 END), 0),
                      COALESCE(SUM(CASE WHEN status = 'Conflicted' THEN 1 ELSE 0 END), 0)
               FROM weekly_pm_schedules
               WHERE week_start_date = ?1"#,
            params![week.to_db_string()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

        Ok(WeekStats {
            week: Some(week),
            total: total as usize,
            scheduled: scheduled as usize,
            completed: completed as usize,
            conflicted: conflicted as usize,
        })
    }

    /// 替换整周排程（不做快照校验）
    ///
    /// # 红线
    /// - 删除 + 写入在同一事务内
    /// - Completed 行不在删除范围内
    pub fn replace_week(
        &self,
        week: Week,
        new_entries: &[ScheduleEntry],
    ) -> RepositoryResult<ReplaceWeekOutcome> {
        self.replace_week_inner(week, None, new_entries)
    }

    /// 替换整周排程，并校验库中行集仍与快照一致
    ///
    /// # 参数
    /// - `snapshot_rows`: 生成前读取的目标周条目 (scheduled_this_week)
    ///
    /// # 返回
    /// - `Err(WeekSnapshotConflict)`: 快照读取后目标周被其他写入修改（如并发完工登记）
    pub fn replace_week_checked(
        &self,
        week: Week,
        snapshot_rows: &[ScheduleEntry],
        new_entries: &[ScheduleEntry],
    ) -> RepositoryResult<ReplaceWeekOutcome> {
        self.replace_week_inner(week, Some(snapshot_rows), new_entries)
    }

    fn replace_week_inner(
        &self,
        week: Week,
        snapshot_rows: Option<&[ScheduleEntry]>,
        new_entries: &[ScheduleEntry],
    ) -> RepositoryResult<ReplaceWeekOutcome> {
        if let Some(entry) = new_entries.iter().find(|e| e.week != week) {
            return Err(RepositoryError::FieldValueError {
                field: "week_start_date".to_string(),
                message: format!(
                    "条目 {}/{} 属于 {}，不属于目标周 {}",
                    entry.equipment_id, entry.pm_type, entry.week, week
                ),
            });
        }

        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        if let Some(expected) = snapshot_rows {
            Self::verify_week_unchanged(&tx, week, expected)?;
        }

        let preserved: i64 = tx.query_row(
            "SELECT COUNT(*) FROM weekly_pm_schedules WHERE week_start_date = ?1 AND status = 'Completed'",
            params![week.to_db_string()],
            |row| row.get(0),
        )?;

        let deleted = tx.execute(
            r#"DELETE FROM weekly_pm_schedules
               WHERE week_start_date = ?1 AND status IN ('Scheduled', 'Conflicted')"#,
            params![week.to_db_string()],
        )?;

        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO weekly_pm_schedules (
                        week_start_date, bfm_equipment_no, pm_type, status,
                        seq_no, assigned_technician, note, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            )?;

            for entry in new_entries {
                stmt.execute(params![
                    entry.week.to_db_string(),
                    &entry.equipment_id,
                    entry.pm_type.as_str(),
                    entry.status.as_str(),
                    entry.seq_no,
                    &entry.assigned_technician,
                    &entry.note,
                    format_datetime(&entry.created_at),
                ])?;
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Ok(ReplaceWeekOutcome {
            deleted,
            inserted: new_entries.len(),
            preserved_completed: preserved as usize,
        })
    }

    /// 比对目标周当前行集 (id, status) 与快照
    fn verify_week_unchanged(
        tx: &Transaction,
        week: Week,
        expected: &[ScheduleEntry],
    ) -> RepositoryResult<()> {
        let mut stmt = tx.prepare(
            "SELECT id, status FROM weekly_pm_schedules WHERE week_start_date = ?1 ORDER BY id",
        )?;
        let current = stmt
            .query_map(params![week.to_db_string()], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<(i64, String)>, _>>()?;

        let mut snapshot: Vec<(i64, String)> = expected
            .iter()
            .filter_map(|e| e.entry_id.map(|id| (id, e.status.as_str().to_string())))
            .collect();
        snapshot.sort();

        if current != snapshot {
            return Err(RepositoryError::WeekSnapshotConflict {
                week: week.to_string(),
                message: format!("快照 {} 行，当前 {} 行或状态已变化", snapshot.len(), current.len()),
            });
        }

        Ok(())
    }

    /// 按状态统计所有周的条目数
    pub fn count_by_status(&self, status: ScheduleStatus) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM weekly_pm_schedules WHERE status = ?1",
            params![status.as_str()],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}
