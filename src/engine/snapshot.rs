// ==========================================
// 设备预防性维护排程系统 - 请求级排程快照
// ==========================================
// 红线: 快照在任何删除之前一次性读取，生成全过程只读快照
// 红线: 快照属于单次请求，不在并发调用间共享
// ==========================================

use crate::domain::exclusion::ExclusionRegistry;
use crate::domain::schedule::{CompletionRecord, ScheduleEntry};
use crate::domain::types::{PmType, ScheduleStatus};
use crate::domain::week::Week;
use chrono::NaiveDate;
use std::collections::HashMap;

type PairKey = (String, PmType);

// ==========================================
// ScheduleSnapshot - 生成前的库状态
// ==========================================
#[derive(Debug, Clone)]
pub struct ScheduleSnapshot {
    week: Week,
    /// 目标周的全部行（含 Completed），用于写入前的并发校验
    this_week: Vec<ScheduleEntry>,
    /// 其他周的 Scheduled 条目
    active_elsewhere: HashMap<PairKey, ScheduleEntry>,
    last_completions: HashMap<PairKey, CompletionRecord>,
    registry: ExclusionRegistry,
}

impl ScheduleSnapshot {
    pub fn new(
        week: Week,
        this_week: Vec<ScheduleEntry>,
        active_elsewhere: Vec<ScheduleEntry>,
        last_completions: HashMap<PairKey, CompletionRecord>,
        registry: ExclusionRegistry,
    ) -> Self {
        let mut by_key: HashMap<PairKey, ScheduleEntry> = HashMap::new();
        for entry in active_elsewhere {
            if entry.week == week || entry.status != ScheduleStatus::Scheduled {
                continue;
            }
            let key = (entry.equipment_id.clone(), entry.pm_type);
            match by_key.get(&key) {
                // 唯一索引保证不会出现；出现时保留最早一周
                Some(existing) if existing.week <= entry.week => {
                    tracing::warn!(
                        equipment_id = %entry.equipment_id,
                        pm_type = %entry.pm_type,
                        kept_week = %existing.week,
                        ignored_week = %entry.week,
                        "同一设备/PM 类型存在多条 Scheduled 条目"
                    );
                }
                _ => {
                    by_key.insert(key, entry);
                }
            }
        }

        Self {
            week,
            this_week,
            active_elsewhere: by_key,
            last_completions,
            registry,
        }
    }

    pub fn week(&self) -> Week {
        self.week
    }

    pub fn this_week_rows(&self) -> &[ScheduleEntry] {
        &self.this_week
    }

    /// 目标周内已完工行数（重新生成时保留）
    pub fn completed_this_week(&self) -> usize {
        self.this_week
            .iter()
            .filter(|e| e.status == ScheduleStatus::Completed)
            .count()
    }

    /// 目标周内将被替换的行数
    pub fn replaceable_this_week(&self) -> usize {
        self.this_week.len() - self.completed_this_week()
    }

    /// 其他周中该 (设备, PM 类型) 的 Scheduled 条目
    pub fn active_elsewhere(&self, equipment_id: &str, pm_type: PmType) -> Option<&ScheduleEntry> {
        self.active_elsewhere.get(&(equipment_id.to_string(), pm_type))
    }

    pub fn active_elsewhere_count(&self) -> usize {
        self.active_elsewhere.len()
    }

    pub fn last_completion(&self, equipment_id: &str, pm_type: PmType) -> Option<&CompletionRecord> {
        self.last_completions.get(&(equipment_id.to_string(), pm_type))
    }

    pub fn last_completion_date(&self, equipment_id: &str, pm_type: PmType) -> Option<NaiveDate> {
        self.last_completion(equipment_id, pm_type)
            .map(CompletionRecord::completion_date)
    }

    pub fn registry(&self) -> &ExclusionRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week(y: i32, m: u32, d: u32) -> Week {
        Week::new(NaiveDate::from_ymd_opt(y, m, d).unwrap()).unwrap()
    }

    fn entry(id: &str, pm_type: PmType, w: Week, status: ScheduleStatus) -> ScheduleEntry {
        let mut e = ScheduleEntry::scheduled(
            id,
            pm_type,
            w,
            1,
            None,
            w.start().and_hms_opt(8, 0, 0).unwrap(),
        );
        e.status = status;
        e
    }

    #[test]
    fn test_target_week_rows_never_count_as_elsewhere() {
        let target = week(2026, 10, 5);
        let prior = week(2026, 9, 28);

        let snapshot = ScheduleSnapshot::new(
            target,
            vec![
                entry("E1", PmType::Monthly, target, ScheduleStatus::Scheduled),
                entry("E2", PmType::Monthly, target, ScheduleStatus::Completed),
            ],
            vec![
                entry("E1", PmType::Monthly, target, ScheduleStatus::Scheduled),
                entry("E3", PmType::Annual, prior, ScheduleStatus::Scheduled),
            ],
            HashMap::new(),
            ExclusionRegistry::default(),
        );

        assert!(snapshot.active_elsewhere("E1", PmType::Monthly).is_none());
        assert_eq!(
            snapshot.active_elsewhere("E3", PmType::Annual).map(|e| e.week),
            Some(prior)
        );
        assert_eq!(snapshot.completed_this_week(), 1);
        assert_eq!(snapshot.replaceable_this_week(), 1);
    }

    #[test]
    fn test_duplicate_actives_keep_earliest_week() {
        let target = week(2026, 10, 19);
        let early = week(2026, 10, 5);
        let late = week(2026, 10, 12);

        let snapshot = ScheduleSnapshot::new(
            target,
            vec![],
            vec![
                entry("E1", PmType::Monthly, late, ScheduleStatus::Scheduled),
                entry("E1", PmType::Monthly, early, ScheduleStatus::Scheduled),
            ],
            HashMap::new(),
            ExclusionRegistry::default(),
        );

        assert_eq!(
            snapshot.active_elsewhere("E1", PmType::Monthly).map(|e| e.week),
            Some(early)
        );
    }
}
