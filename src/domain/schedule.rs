// ==========================================
// 设备预防性维护排程系统 - 完工记录与排程条目
// ==========================================
// 红线: CompletionRecord 创建后不可变，是"最近完成"的唯一权威来源
// 红线: 同一 (设备, PM 类型) 在所有周中至多一条 Scheduled 条目
// ==========================================

use crate::domain::types::{PmType, ScheduleStatus};
use crate::domain::week::Week;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// CompletionRecord - PM 完工记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub completion_id: Option<i64>, // 自增主键（未入库时为 None）
    pub equipment_id: String,
    pub pm_type: PmType,
    pub completed_at: NaiveDateTime,
    pub technician: String,
}

impl CompletionRecord {
    pub fn new(
        equipment_id: impl Into<String>,
        pm_type: PmType,
        completed_at: NaiveDateTime,
        technician: impl Into<String>,
    ) -> Self {
        Self {
            completion_id: None,
            equipment_id: equipment_id.into(),
            pm_type,
            completed_at,
            technician: technician.into(),
        }
    }

    pub fn completion_date(&self) -> NaiveDate {
        self.completed_at.date()
    }
}

// ==========================================
// ScheduleEntry - 周排程条目
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub entry_id: Option<i64>,               // 自增主键（未入库时为 None）
    pub equipment_id: String,
    pub pm_type: PmType,
    pub week: Week,                          // week_start_date
    pub status: ScheduleStatus,
    pub seq_no: i32,                         // 周内生成顺序 (1 起)
    pub assigned_technician: Option<String>, // 指派技术员
    pub note: Option<String>,                // 冲突说明等
    pub created_at: NaiveDateTime,
}

impl ScheduleEntry {
    /// 新建 Scheduled 条目
    pub fn scheduled(
        equipment_id: impl Into<String>,
        pm_type: PmType,
        week: Week,
        seq_no: i32,
        assigned_technician: Option<String>,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            entry_id: None,
            equipment_id: equipment_id.into(),
            pm_type,
            week,
            status: ScheduleStatus::Scheduled,
            seq_no,
            assigned_technician,
            note: None,
            created_at,
        }
    }

    /// 新建 Conflicted 条目（保留在周排程中以便可见）
    pub fn conflicted(
        equipment_id: impl Into<String>,
        pm_type: PmType,
        week: Week,
        seq_no: i32,
        note: String,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            entry_id: None,
            equipment_id: equipment_id.into(),
            pm_type,
            week,
            status: ScheduleStatus::Conflicted,
            seq_no,
            assigned_technician: None,
            note: Some(note),
            created_at,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ScheduleStatus::Scheduled
    }

    pub fn key(&self) -> (&str, PmType) {
        (self.equipment_id.as_str(), self.pm_type)
    }
}

// ==========================================
// WeekStats - 周完成率统计
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeekStats {
    pub week: Option<Week>,
    pub total: usize,
    pub scheduled: usize,
    pub completed: usize,
    pub conflicted: usize,
}

impl WeekStats {
    /// 完成率 (%)，无条目时为 0
    pub fn completion_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_rate() {
        let stats = WeekStats {
            week: None,
            total: 8,
            scheduled: 2,
            completed: 6,
            conflicted: 0,
        };
        assert!((stats.completion_rate() - 75.0).abs() < f64::EPSILON);
        assert_eq!(WeekStats::default().completion_rate(), 0.0);
    }
}
