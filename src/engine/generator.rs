// ==========================================
// 设备预防性维护排程系统 - 周排程生成
// ==========================================
// 输入: 台账记录 + 请求级快照 + 排程参数
// 输出: 本周新条目 (Scheduled / Conflicted) + 逐项结果
// 红线: 不访问存储，只读快照
// ==========================================
// 流程:
// 1. 无效台账记录 → InvalidRecord（不中断）
// 2. 候选按优先级排序
// 3. 逐个判定资格并产出条目
// ==========================================

use crate::config::SchedulerConfig;
use crate::domain::equipment::{Equipment, RegistryRecord};
use crate::domain::schedule::ScheduleEntry;
use crate::engine::eligibility::{EligibilityChecker, EligibilityResult};
use crate::engine::priority::{PmCandidate, PrioritySorter};
use crate::engine::report::{EquipmentOutcome, GenerationCounts, OutcomeKind, SkipReason};
use crate::engine::snapshot::ScheduleSnapshot;
use chrono::NaiveDateTime;

/// 生成结果
#[derive(Debug, Clone, Default)]
pub struct GenerationOutput {
    pub entries: Vec<ScheduleEntry>,
    pub outcomes: Vec<EquipmentOutcome>,
    pub counts: GenerationCounts,
    /// 台账缓存日期与完工记录不一致的组合数
    pub stale_cached_dates: usize,
}

// ==========================================
// AssignmentGenerator - 周排程生成器
// ==========================================
pub struct AssignmentGenerator<'a> {
    snapshot: &'a ScheduleSnapshot,
    config: &'a SchedulerConfig,
    sorter: PrioritySorter,
}

impl<'a> AssignmentGenerator<'a> {
    pub fn new(snapshot: &'a ScheduleSnapshot, config: &'a SchedulerConfig) -> Self {
        Self {
            snapshot,
            config,
            sorter: PrioritySorter::new(),
        }
    }

    /// 生成快照目标周的排程
    ///
    /// # 参数
    /// - `records`: 台账记录（含无法解析的记录）
    /// - `created_at`: 新条目的创建时间
    pub fn generate(&self, records: &[RegistryRecord], created_at: NaiveDateTime) -> GenerationOutput {
        let mut output = GenerationOutput::default();

        // === 步骤 1: 拆分有效/无效记录 ===
        let mut equipment: Vec<Equipment> = Vec::with_capacity(records.len());
        for record in records {
            match record {
                Ok(e) => equipment.push(e.clone()),
                Err(invalid) => {
                    tracing::warn!(
                        equipment_id = %invalid.equipment_id,
                        reason = %invalid.reason,
                        "台账记录无效，跳过"
                    );
                    let reason = SkipReason::InvalidRecord {
                        message: invalid.reason.clone(),
                    };
                    Self::push_outcome(
                        &mut output,
                        EquipmentOutcome {
                            equipment_id: invalid.equipment_id.clone(),
                            pm_type: None,
                            priority: None,
                            overdue_days: None,
                            message: reason.to_string(),
                            outcome: OutcomeKind::Skipped { reason },
                            stale_cached_date: false,
                        },
                    );
                }
            }
        }

        // === 步骤 2: 排序 ===
        let candidates = self.sorter.build_candidates(&equipment, self.snapshot);
        tracing::debug!(
            valid = equipment.len(),
            candidates = candidates.len(),
            "候选排序完成"
        );
        for (class, bucket) in self.sorter.bucketize(&candidates) {
            tracing::debug!(priority = %class, candidates = bucket.len(), "优先级分桶");
        }

        // === 步骤 3: 逐个判定 ===
        let checker = EligibilityChecker::new(self.snapshot, self.config);
        for candidate in &candidates {
            let stale = self.detect_stale_cache(candidate);
            if stale {
                output.stale_cached_dates += 1;
            }

            let verdict = checker.check(candidate.equipment, candidate.pm_type, &output.entries);
            let (outcome, message) = self.apply_verdict(candidate, verdict, &mut output, created_at);

            tracing::debug!(
                equipment_id = %candidate.equipment.equipment_id,
                pm_type = %candidate.pm_type,
                priority = %candidate.priority(),
                overdue_days = candidate.overdue_days,
                verdict = verdict.label(),
                "资格判定"
            );

            Self::push_outcome(
                &mut output,
                EquipmentOutcome {
                    equipment_id: candidate.equipment.equipment_id.clone(),
                    pm_type: Some(candidate.pm_type),
                    priority: Some(candidate.priority()),
                    overdue_days: Some(candidate.overdue_days),
                    outcome,
                    message,
                    stale_cached_date: stale,
                },
            );
        }

        output
    }

    fn push_outcome(output: &mut GenerationOutput, outcome: EquipmentOutcome) {
        output.counts.record(&outcome.outcome);
        output.outcomes.push(outcome);
    }

    /// 根据判定结果产出条目，返回结果类型与说明
    fn apply_verdict(
        &self,
        candidate: &PmCandidate<'_>,
        verdict: EligibilityResult,
        output: &mut GenerationOutput,
        created_at: NaiveDateTime,
    ) -> (OutcomeKind, String) {
        let week = self.snapshot.week();
        let equipment_id = candidate.equipment.equipment_id.as_str();
        let next_seq = output.entries.len() as i32 + 1;

        let skipped = |reason: SkipReason| {
            let message = reason.to_string();
            (OutcomeKind::Skipped { reason }, message)
        };

        match verdict {
            EligibilityResult::Eligible => {
                let scheduled_so_far = output.counts.scheduled;
                if self.config.capacity_reached(scheduled_so_far) {
                    return skipped(SkipReason::CapacityReached {
                        limit: self.config.max_weekly_assignments,
                    });
                }

                let technician = self.assign_technician(scheduled_so_far);
                output.entries.push(ScheduleEntry::scheduled(
                    equipment_id,
                    candidate.pm_type,
                    week,
                    next_seq,
                    technician.clone(),
                    created_at,
                ));
                (
                    OutcomeKind::Scheduled {
                        seq_no: next_seq,
                        technician,
                    },
                    verdict.to_string(),
                )
            }
            EligibilityResult::Conflicted {
                other_type,
                other_week,
            } => {
                let note = format!(
                    "与 {} 周的 {} PM 相距不足 {} 天",
                    other_week, other_type, self.config.cross_type_conflict_days
                );
                output.entries.push(ScheduleEntry::conflicted(
                    equipment_id,
                    candidate.pm_type,
                    week,
                    next_seq,
                    note.clone(),
                    created_at,
                ));
                (
                    OutcomeKind::Conflicted {
                        seq_no: next_seq,
                        other_type,
                        other_week,
                    },
                    note,
                )
            }
            EligibilityResult::Excluded { reason } => skipped(SkipReason::Excluded { exclusion: reason }),
            EligibilityResult::RecentlyCompleted {
                days_since,
                min_interval,
            } => skipped(SkipReason::RecentlyCompleted {
                days_since,
                min_interval,
            }),
            EligibilityResult::AlreadyScheduled { existing_week } => {
                skipped(SkipReason::AlreadyScheduled { existing_week })
            }
        }
    }

    /// 技术员轮转指派
    fn assign_technician(&self, scheduled_so_far: usize) -> Option<String> {
        if self.config.technicians.is_empty() {
            return None;
        }
        let idx = scheduled_so_far % self.config.technicians.len();
        Some(self.config.technicians[idx].clone())
    }

    /// 台账缓存日期存在且与完工记录不一致时告警
    fn detect_stale_cache(&self, candidate: &PmCandidate<'_>) -> bool {
        let Some(cached) = candidate.equipment.cached_last_date(candidate.pm_type) else {
            return false;
        };
        if Some(cached) == candidate.last_completed {
            return false;
        }

        tracing::warn!(
            equipment_id = %candidate.equipment.equipment_id,
            pm_type = %candidate.pm_type,
            cached = %cached,
            completion_history = ?candidate.last_completed,
            "台账缓存的上次 PM 日期与完工记录不一致，以完工记录为准"
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::equipment::InvalidEquipment;
    use crate::domain::exclusion::{ExclusionReason, ExclusionRegistry};
    use crate::domain::schedule::CompletionRecord;
    use crate::domain::types::{EquipmentStatus, PmType, PriorityClass, ScheduleStatus};
    use crate::domain::week::Week;
    use chrono::{Duration, NaiveDate};
    use std::collections::{HashMap, HashSet};

    fn target() -> Week {
        Week::new(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()).unwrap()
    }

    fn now() -> NaiveDateTime {
        target().start().and_hms_opt(6, 0, 0).unwrap()
    }

    fn equipment(id: &str, priority: PriorityClass, monthly: bool, annual: bool) -> Equipment {
        Equipment {
            equipment_id: id.to_string(),
            description: None,
            priority,
            supports_monthly: monthly,
            supports_annual: annual,
            status: EquipmentStatus::Active,
            last_monthly_date: None,
            last_annual_date: None,
            created_at: (target().start() - Duration::days(900)).and_hms_opt(0, 0, 0).unwrap(),
        }
    }

    fn done(id: &str, pm_type: PmType, days_ago: i64) -> ((String, PmType), CompletionRecord) {
        let at = (target().start() - Duration::days(days_ago)).and_hms_opt(9, 0, 0).unwrap();
        ((id.to_string(), pm_type), CompletionRecord::new(id, pm_type, at, "amy"))
    }

    fn snapshot(
        elsewhere: Vec<ScheduleEntry>,
        completions: Vec<((String, PmType), CompletionRecord)>,
        missing: &[&str],
    ) -> ScheduleSnapshot {
        ScheduleSnapshot::new(
            target(),
            vec![],
            elsewhere,
            completions.into_iter().collect::<HashMap<_, _>>(),
            ExclusionRegistry::new(missing.iter().map(|s| s.to_string()).collect(), HashSet::new()),
        )
    }

    #[test]
    fn test_scenario_e1_recent_monthly_schedules_annual() {
        let snap = snapshot(vec![], vec![done("E1", PmType::Monthly, 10), done("E1", PmType::Annual, 400)], &[]);
        let config = SchedulerConfig::default();
        let records: Vec<RegistryRecord> = vec![Ok(equipment("E1", PriorityClass::P1, true, true))];

        let output = AssignmentGenerator::new(&snap, &config).generate(&records, now());

        assert_eq!(output.entries.len(), 1);
        assert_eq!(output.entries[0].pm_type, PmType::Annual);
        assert_eq!(output.entries[0].status, ScheduleStatus::Scheduled);
        assert_eq!(output.counts.scheduled, 1);
        assert_eq!(output.counts.skipped_recently_completed, 1);
    }

    #[test]
    fn test_missing_equipment_never_scheduled() {
        let snap = snapshot(vec![], vec![], &["LOST"]);
        let config = SchedulerConfig::default();
        let records: Vec<RegistryRecord> = vec![Ok(equipment("LOST", PriorityClass::P1, true, true))];

        let output = AssignmentGenerator::new(&snap, &config).generate(&records, now());

        assert!(output.entries.is_empty());
        assert_eq!(output.counts.skipped_excluded, 2);
        assert!(output.outcomes.iter().all(|o| matches!(
            o.outcome,
            OutcomeKind::Skipped {
                reason: SkipReason::Excluded {
                    exclusion: ExclusionReason::Missing
                }
            }
        )));
    }

    #[test]
    fn test_both_types_due_yields_conflicted_row() {
        let snap = snapshot(vec![], vec![], &[]);
        let config = SchedulerConfig::default();
        let records: Vec<RegistryRecord> = vec![Ok(equipment("E1", PriorityClass::P2, true, true))];

        let output = AssignmentGenerator::new(&snap, &config).generate(&records, now());

        assert_eq!(output.entries.len(), 2);
        assert_eq!(output.entries[0].status, ScheduleStatus::Scheduled);
        assert_eq!(output.entries[0].pm_type, PmType::Monthly);
        assert_eq!(output.entries[1].status, ScheduleStatus::Conflicted);
        assert!(output.entries[1].note.as_deref().unwrap_or("").contains("Monthly"));
        assert_eq!(output.entries[1].seq_no, 2);
        assert_eq!(output.counts.skipped_conflicted, 1);
    }

    #[test]
    fn test_capacity_and_round_robin_technicians() {
        let snap = snapshot(vec![], vec![], &[]);
        let config = SchedulerConfig {
            max_weekly_assignments: 2,
            technicians: vec!["amy".to_string(), "bob".to_string()],
            ..SchedulerConfig::default()
        };
        let records: Vec<RegistryRecord> = vec![
            Ok(equipment("A", PriorityClass::P1, true, false)),
            Ok(equipment("B", PriorityClass::P2, true, false)),
            Ok(equipment("C", PriorityClass::P3, true, false)),
        ];

        let output = AssignmentGenerator::new(&snap, &config).generate(&records, now());

        let techs: Vec<Option<&str>> = output
            .entries
            .iter()
            .map(|e| e.assigned_technician.as_deref())
            .collect();
        assert_eq!(techs, vec![Some("amy"), Some("bob")]);
        assert_eq!(output.counts.skipped_capacity, 1);
        let c = output
            .outcomes
            .iter()
            .find(|o| o.equipment_id == "C" && o.pm_type == Some(PmType::Monthly))
            .unwrap();
        assert_eq!(c.skip_reason(), Some(&SkipReason::CapacityReached { limit: 2 }));
    }

    #[test]
    fn test_invalid_record_skipped_and_generation_continues() {
        let snap = snapshot(vec![], vec![], &[]);
        let config = SchedulerConfig::default();
        let records: Vec<RegistryRecord> = vec![
            Err(InvalidEquipment {
                equipment_id: "BAD".to_string(),
                reason: "建档时间无法解析: someday".to_string(),
            }),
            Ok(equipment("OK", PriorityClass::P1, true, false)),
        ];

        let output = AssignmentGenerator::new(&snap, &config).generate(&records, now());

        assert_eq!(output.counts.skipped_invalid, 1);
        assert_eq!(output.counts.scheduled, 1);
        assert_eq!(output.entries[0].equipment_id, "OK");
    }

    #[test]
    fn test_already_scheduled_elsewhere_not_duplicated() {
        let w1 = target().previous();
        let pinned = ScheduleEntry::scheduled("E2", PmType::Monthly, w1, 1, None, now());
        let snap = snapshot(vec![pinned], vec![], &[]);
        let config = SchedulerConfig::default();
        let records: Vec<RegistryRecord> = vec![Ok(equipment("E2", PriorityClass::P1, true, false))];

        let output = AssignmentGenerator::new(&snap, &config).generate(&records, now());

        assert!(output.entries.is_empty());
        let outcome = &output.outcomes[0];
        assert_eq!(
            outcome.skip_reason(),
            Some(&SkipReason::AlreadyScheduled { existing_week: w1 })
        );
        assert!(outcome.message.contains(&w1.to_string()));
    }

    #[test]
    fn test_stale_cached_date_flagged() {
        let snap = snapshot(vec![], vec![done("E1", PmType::Monthly, 5)], &[]);
        let config = SchedulerConfig::default();
        let mut e = equipment("E1", PriorityClass::P1, true, false);
        e.last_monthly_date = Some(target().start() - Duration::days(90));

        let output = AssignmentGenerator::new(&snap, &config).generate(&[RegistryRecord::Ok(e)], now());

        assert_eq!(output.stale_cached_dates, 1);
        let monthly = output
            .outcomes
            .iter()
            .find(|o| o.pm_type == Some(PmType::Monthly))
            .unwrap();
        assert!(monthly.stale_cached_date);
        // 以完工记录为准
        assert!(matches!(monthly.skip_reason(), Some(SkipReason::RecentlyCompleted { .. })));
    }
}
