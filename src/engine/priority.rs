// ==========================================
// 设备预防性维护排程系统 - 优先级排序
// ==========================================
// 排序键:
// 1) 优先级等级 (P1 → P2 → P3 → Other)
// 2) 逾期天数降序
// 3) 设备编号升序
// 4) Monthly 先于 Annual
// 红线: 仅排序不设闸，低优先级设备同一轮照常参与生成
// ==========================================

use crate::domain::equipment::Equipment;
use crate::domain::types::{PmType, PriorityClass};
use crate::engine::snapshot::ScheduleSnapshot;
use chrono::NaiveDate;
use std::cmp::Ordering;

/// 待判定的 (设备, PM 类型) 组合
#[derive(Debug, Clone)]
pub struct PmCandidate<'a> {
    pub equipment: &'a Equipment,
    pub pm_type: PmType,
    /// 距上次完工（无完工记录时距建档）的天数，以目标周起始日计
    pub overdue_days: i64,
    pub last_completed: Option<NaiveDate>,
}

impl PmCandidate<'_> {
    pub fn priority(&self) -> PriorityClass {
        self.equipment.priority
    }
}

// ==========================================
// PrioritySorter - 候选排序
// ==========================================
pub struct PrioritySorter {
    // 无状态
}

impl PrioritySorter {
    pub fn new() -> Self {
        Self {}
    }

    /// 逾期天数：以完工记录为准，从未完工则按建档日期
    pub fn overdue_days(
        equipment: &Equipment,
        pm_type: PmType,
        snapshot: &ScheduleSnapshot,
    ) -> i64 {
        let reference = snapshot
            .last_completion_date(&equipment.equipment_id, pm_type)
            .unwrap_or_else(|| equipment.created_at.date());
        (snapshot.week().start() - reference).num_days()
    }

    /// 为每台设备的每种 PM 类型生成候选并排序
    ///
    /// 能力标志不在此处过滤，由资格判定给出排除原因
    pub fn build_candidates<'a>(
        &self,
        equipment: &'a [Equipment],
        snapshot: &ScheduleSnapshot,
    ) -> Vec<PmCandidate<'a>> {
        let mut candidates: Vec<PmCandidate<'a>> = equipment
            .iter()
            .flat_map(|e| {
                PmType::ALL.into_iter().map(move |pm_type| PmCandidate {
                    equipment: e,
                    pm_type,
                    overdue_days: Self::overdue_days(e, pm_type, snapshot),
                    last_completed: snapshot.last_completion_date(&e.equipment_id, pm_type),
                })
            })
            .collect();

        self.sort(&mut candidates);
        candidates
    }

    pub fn sort(&self, candidates: &mut [PmCandidate<'_>]) {
        candidates.sort_by(|a, b| self.compare(a, b));
    }

    /// 按优先级分桶（桶内已排序），桶按等级顺序排列
    pub fn bucketize<'a>(&self, candidates: &[PmCandidate<'a>]) -> Vec<(PriorityClass, Vec<PmCandidate<'a>>)> {
        let mut buckets: Vec<(PriorityClass, Vec<PmCandidate<'a>>)> = Vec::new();
        for candidate in candidates {
            match buckets.last_mut() {
                Some((class, items)) if *class == candidate.priority() => items.push(candidate.clone()),
                _ => buckets.push((candidate.priority(), vec![candidate.clone()])),
            }
        }
        buckets
    }

    fn compare(&self, a: &PmCandidate<'_>, b: &PmCandidate<'_>) -> Ordering {
        a.priority()
            .rank()
            .cmp(&b.priority().rank())
            .then_with(|| b.overdue_days.cmp(&a.overdue_days))
            .then_with(|| a.equipment.equipment_id.cmp(&b.equipment.equipment_id))
            .then_with(|| pm_type_order(a.pm_type).cmp(&pm_type_order(b.pm_type)))
    }
}

impl Default for PrioritySorter {
    fn default() -> Self {
        Self::new()
    }
}

fn pm_type_order(pm_type: PmType) -> u8 {
    match pm_type {
        PmType::Monthly => 0,
        PmType::Annual => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::exclusion::ExclusionRegistry;
    use crate::domain::schedule::CompletionRecord;
    use crate::domain::types::EquipmentStatus;
    use crate::domain::week::Week;
    use chrono::Duration;
    use std::collections::HashMap;

    fn target() -> Week {
        Week::new(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()).unwrap()
    }

    fn create_equipment(id: &str, priority: PriorityClass) -> Equipment {
        Equipment {
            equipment_id: id.to_string(),
            description: None,
            priority,
            supports_monthly: true,
            supports_annual: false,
            status: EquipmentStatus::Active,
            last_monthly_date: None,
            last_annual_date: None,
            created_at: (target().start() - Duration::days(1000)).and_hms_opt(0, 0, 0).unwrap(),
        }
    }

    fn snapshot_with(completed_days_ago: &[(&str, PmType, i64)]) -> ScheduleSnapshot {
        let completions: HashMap<_, _> = completed_days_ago
            .iter()
            .map(|(id, pm_type, days)| {
                let at = (target().start() - Duration::days(*days)).and_hms_opt(9, 0, 0).unwrap();
                ((id.to_string(), *pm_type), CompletionRecord::new(*id, *pm_type, at, "amy"))
            })
            .collect();
        ScheduleSnapshot::new(target(), vec![], vec![], completions, ExclusionRegistry::default())
    }

    fn monthly_order(candidates: &[PmCandidate<'_>]) -> Vec<String> {
        candidates
            .iter()
            .filter(|c| c.pm_type == PmType::Monthly)
            .map(|c| c.equipment.equipment_id.clone())
            .collect()
    }

    #[test]
    fn test_more_overdue_first_within_bucket() {
        let equipment = vec![
            create_equipment("B", PriorityClass::P1),
            create_equipment("A", PriorityClass::P1),
        ];
        let snapshot = snapshot_with(&[("A", PmType::Monthly, 40), ("B", PmType::Monthly, 10)]);

        let candidates = PrioritySorter::new().build_candidates(&equipment, &snapshot);
        assert_eq!(monthly_order(&candidates), vec!["A", "B"]);
        assert_eq!(candidates[0].overdue_days, 40);
    }

    #[test]
    fn test_priority_rank_before_overdue() {
        let equipment = vec![
            create_equipment("OTHER", PriorityClass::Other),
            create_equipment("P3", PriorityClass::P3),
            create_equipment("P1", PriorityClass::P1),
        ];
        // P1 最近完工，Other 从未完工
        let snapshot = snapshot_with(&[("P1", PmType::Monthly, 1), ("P3", PmType::Monthly, 500)]);

        let sorter = PrioritySorter::new();
        let candidates = sorter.build_candidates(&equipment, &snapshot);
        assert_eq!(monthly_order(&candidates), vec!["P1", "P3", "OTHER"]);

        let buckets = sorter.bucketize(&candidates);
        let classes: Vec<PriorityClass> = buckets.iter().map(|(c, _)| *c).collect();
        assert_eq!(classes, vec![PriorityClass::P1, PriorityClass::P3, PriorityClass::Other]);
    }

    #[test]
    fn test_never_completed_uses_creation_date() {
        let equipment = create_equipment("E1", PriorityClass::P2);
        let snapshot = snapshot_with(&[]);
        assert_eq!(PrioritySorter::overdue_days(&equipment, PmType::Monthly, &snapshot), 1000);
    }

    #[test]
    fn test_ties_broken_by_id_then_monthly_first() {
        let equipment = vec![
            create_equipment("E2", PriorityClass::P1),
            create_equipment("E1", PriorityClass::P1),
        ];
        let snapshot = snapshot_with(&[]);

        let keys: Vec<(String, PmType)> = PrioritySorter::new()
            .build_candidates(&equipment, &snapshot)
            .iter()
            .map(|c| (c.equipment.equipment_id.clone(), c.pm_type))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("E1".to_string(), PmType::Monthly),
                ("E1".to_string(), PmType::Annual),
                ("E2".to_string(), PmType::Monthly),
                ("E2".to_string(), PmType::Annual),
            ]
        );
    }
}
