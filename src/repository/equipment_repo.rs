// ==========================================
// 设备预防性维护排程系统 - 设备台账仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 台账由外部系统维护；排程引擎只读。upsert 仅供导入/测试初始化
// ==========================================

use crate::domain::equipment::{Equipment, InvalidEquipment, RegistryRecord};
use crate::domain::types::{EquipmentStatus, PriorityClass};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::{format_datetime, parse_date_text, parse_datetime_text, DATE_FORMAT};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

/// 台账原始行（未做类型解析）
#[derive(Debug, Clone)]
struct RawEquipmentRow {
    equipment_id: Option<String>,
    description: Option<String>,
    priority: Option<String>,
    monthly_pm: i64,
    annual_pm: i64,
    status: Option<String>,
    last_monthly_pm: Option<String>,
    last_annual_pm: Option<String>,
    created_at: Option<String>,
}

impl RawEquipmentRow {
    /// 解析为领域对象；编号为空、状态或建档时间无法解析时返回 InvalidEquipment
    fn into_record(self) -> RegistryRecord {
        let equipment_id = self.equipment_id.unwrap_or_default().trim().to_string();
        let invalid = |reason: String| InvalidEquipment {
            equipment_id: equipment_id.clone(),
            reason,
        };

        if equipment_id.is_empty() {
            return Err(invalid("设备编号为空".to_string()));
        }

        let priority = PriorityClass::from(self.priority.as_deref().unwrap_or(""));

        let status = self
            .status
            .as_deref()
            .unwrap_or("Active")
            .parse::<EquipmentStatus>()
            .map_err(invalid)?;

        let created_at = match self.created_at.as_deref() {
            Some(raw) => parse_datetime_text(raw)
                .ok_or_else(|| invalid(format!("建档时间无法解析: {}", raw)))?,
            None => return Err(invalid("缺少建档时间".to_string())),
        };

        // 缓存日期解析失败不影响排程（本就不参与判定），按缺失处理
        let last_monthly_date = self.last_monthly_pm.as_deref().and_then(parse_date_text);
        let last_annual_date = self.last_annual_pm.as_deref().and_then(parse_date_text);

        Ok(Equipment {
            equipment_id,
            description: self.description,
            priority,
            supports_monthly: self.monthly_pm != 0,
            supports_annual: self.annual_pm != 0,
            status,
            last_monthly_date,
            last_annual_date,
            created_at,
        })
    }
}

// ==========================================
// EquipmentRepository - 设备台账仓储
// ==========================================
pub struct EquipmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl EquipmentRepository {
    /// 创建新的EquipmentRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    const SELECT_COLUMNS: &'static str = r#"SELECT bfm_equipment_no, description, priority,
                      monthly_pm, annual_pm, status,
                      last_monthly_pm, last_annual_pm, created_at
               FROM equipment"#;

    fn map_raw(row: &rusqlite::Row) -> rusqlite::Result<RawEquipmentRow> {
        Ok(RawEquipmentRow {
            equipment_id: row.get(0)?,
            description: row.get(1)?,
            priority: row.get(2)?,
            monthly_pm: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
            annual_pm: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
            status: row.get(5)?,
            last_monthly_pm: row.get(6)?,
            last_annual_pm: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    /// 读取全部台账记录（逐条解析，无效记录不会中断读取）
    ///
    /// # 返回
    /// - 按设备编号升序
    pub fn list_registry(&self) -> RepositoryResult<Vec<RegistryRecord>> {
        let conn = self.get_conn()?;

        let sql = format!("{} ORDER BY bfm_equipment_no", Self::SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], Self::map_raw)?
            .collect::<Result<Vec<RawEquipmentRow>, _>>()?;

        Ok(rows.into_iter().map(RawEquipmentRow::into_record).collect())
    }

    /// 按设备编号查询
    ///
    /// # 返回
    /// - `Ok(None)`: 未找到
    /// - `Err(FieldValueError)`: 记录存在但无法解析
    pub fn find_by_id(&self, equipment_id: &str) -> RepositoryResult<Option<Equipment>> {
        let conn = self.get_conn()?;

        let sql = format!("{} WHERE bfm_equipment_no = ?1", Self::SELECT_COLUMNS);
        let raw = conn
            .query_row(&sql, params![equipment_id], Self::map_raw)
            .optional()?;

        match raw.map(RawEquipmentRow::into_record) {
            None => Ok(None),
            Some(Ok(equipment)) => Ok(Some(equipment)),
            Some(Err(invalid)) => Err(RepositoryError::FieldValueError {
                field: "equipment".to_string(),
                message: format!("{}: {}", invalid.equipment_id, invalid.reason),
            }),
        }
    }

    /// 插入或更新台账记录
    pub fn upsert(&self, equipment: &Equipment) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::upsert_on(&conn, equipment)
    }

    fn upsert_on(conn: &Connection, equipment: &Equipment) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO equipment (
                    bfm_equipment_no, description, priority, monthly_pm, annual_pm,
                    status, last_monthly_pm, last_annual_pm, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(bfm_equipment_no) DO UPDATE SET
                    description = excluded.description,
                    priority = excluded.priority,
                    monthly_pm = excluded.monthly_pm,
                    annual_pm = excluded.annual_pm,
                    status = excluded.status,
                    last_monthly_pm = excluded.last_monthly_pm,
                    last_annual_pm = excluded.last_annual_pm"#,
            params![
                &equipment.equipment_id,
                &equipment.description,
                equipment.priority.as_str(),
                if equipment.supports_monthly { 1 } else { 0 },
                if equipment.supports_annual { 1 } else { 0 },
                equipment.status.as_str(),
                equipment
                    .last_monthly_date
                    .map(|d| d.format(DATE_FORMAT).to_string()),
                equipment
                    .last_annual_date
                    .map(|d| d.format(DATE_FORMAT).to_string()),
                format_datetime(&equipment.created_at),
            ],
        )?;

        Ok(())
    }

    /// 批量插入或更新（单事务）
    pub fn batch_upsert(&self, items: &[Equipment]) -> RepositoryResult<usize> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        for equipment in items {
            Self::upsert_on(&tx, equipment)?;
        }
        tx.commit()?;

        Ok(items.len())
    }

    /// 设备数量
    pub fn count(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM equipment", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use chrono::NaiveDate;

    fn setup() -> EquipmentRepository {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        EquipmentRepository::new(Arc::new(Mutex::new(conn)))
    }

    fn sample(id: &str) -> Equipment {
        Equipment {
            equipment_id: id.to_string(),
            description: Some("Air compressor".to_string()),
            priority: PriorityClass::P2,
            supports_monthly: true,
            supports_annual: false,
            status: EquipmentStatus::Active,
            last_monthly_date: NaiveDate::from_ymd_opt(2026, 9, 1),
            last_annual_date: None,
            created_at: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_upsert_and_find() {
        let repo = setup();
        repo.upsert(&sample("BFM-001")).unwrap();

        let found = repo.find_by_id("BFM-001").unwrap().unwrap();
        assert_eq!(found, sample("BFM-001"));
        assert!(repo.find_by_id("BFM-404").unwrap().is_none());
    }

    #[test]
    fn test_list_registry_reports_unparseable_rows() {
        let repo = setup();
        repo.upsert(&sample("BFM-001")).unwrap();
        {
            let conn = repo.get_conn().unwrap();
            conn.execute(
                "INSERT INTO equipment (bfm_equipment_no, priority, monthly_pm, status, created_at)
                 VALUES ('BFM-002', 'P1', 1, 'Active', 'last tuesday')",
                [],
            )
            .unwrap();
        }

        let records = repo.list_registry().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].is_ok());
        let invalid = records[1].as_ref().unwrap_err();
        assert_eq!(invalid.equipment_id, "BFM-002");
        assert!(invalid.reason.contains("建档时间"));
    }

    #[test]
    fn test_unknown_priority_falls_into_other_bucket() {
        let repo = setup();
        {
            let conn = repo.get_conn().unwrap();
            conn.execute(
                "INSERT INTO equipment (bfm_equipment_no, priority, monthly_pm, status, created_at)
                 VALUES ('BFM-004', 'P4', 1, 'Active', '2024-01-01 08:00:00')",
                [],
            )
            .unwrap();
        }

        let found = repo.find_by_id("BFM-004").unwrap().unwrap();
        assert_eq!(found.priority, PriorityClass::Other);
    }
}
