// ==========================================
// 设备预防性维护排程系统 - 生成报告
// ==========================================
// 职责: 逐设备结果 + 汇总计数 + 运行轨迹
// 说明: SkipReason 是正常结果，累积进报告，从不作为错误抛出
// ==========================================

use crate::domain::exclusion::ExclusionReason;
use crate::domain::schedule::ScheduleEntry;
use crate::domain::types::{PmType, PriorityClass};
use crate::domain::week::Week;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// SchedulerPhase - 周重新生成状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerPhase {
    Idle,
    SnapshotLoaded,
    OverwriteChecked,
    Generated,
    Persisted,
}

impl SchedulerPhase {
    /// 唯一合法的后继状态
    pub fn next(&self) -> Option<SchedulerPhase> {
        match self {
            SchedulerPhase::Idle => Some(SchedulerPhase::SnapshotLoaded),
            SchedulerPhase::SnapshotLoaded => Some(SchedulerPhase::OverwriteChecked),
            SchedulerPhase::OverwriteChecked => Some(SchedulerPhase::Generated),
            SchedulerPhase::Generated => Some(SchedulerPhase::Persisted),
            SchedulerPhase::Persisted => None,
        }
    }
}

impl fmt::Display for SchedulerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ==========================================
// SkipReason - 跳过原因
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason")]
pub enum SkipReason {
    AlreadyScheduled { existing_week: Week },
    Excluded { exclusion: ExclusionReason },
    RecentlyCompleted { days_since: i64, min_interval: i64 },
    /// 达到每周排程上限
    CapacityReached { limit: usize },
    /// 台账记录无法解析
    InvalidRecord { message: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyScheduled { existing_week } => {
                write!(f, "已在 {} 周排程且未完成", existing_week)
            }
            SkipReason::Excluded { exclusion } => write!(f, "{}", exclusion),
            SkipReason::RecentlyCompleted {
                days_since,
                min_interval,
            } => write!(f, "距上次完工 {} 天，未满 {} 天间隔", days_since, min_interval),
            SkipReason::CapacityReached { limit } => write!(f, "本周排程已达上限 {}", limit),
            SkipReason::InvalidRecord { message } => write!(f, "台账记录无效: {}", message),
        }
    }
}

// ==========================================
// EquipmentOutcome - 单个 (设备, PM 类型) 的结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum OutcomeKind {
    Scheduled {
        seq_no: i32,
        technician: Option<String>,
    },
    /// 写入 Conflicted 条目
    Conflicted {
        seq_no: i32,
        other_type: PmType,
        other_week: Week,
    },
    Skipped { reason: SkipReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentOutcome {
    pub equipment_id: String,
    /// 无效台账记录时为 None
    pub pm_type: Option<PmType>,
    pub priority: Option<PriorityClass>,
    pub overdue_days: Option<i64>,
    pub outcome: OutcomeKind,
    pub message: String,
    /// 台账缓存日期与完工记录不一致
    pub stale_cached_date: bool,
}

impl EquipmentOutcome {
    pub fn is_scheduled(&self) -> bool {
        matches!(self.outcome, OutcomeKind::Scheduled { .. })
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match &self.outcome {
            OutcomeKind::Skipped { reason } => Some(reason),
            _ => None,
        }
    }
}

// ==========================================
// GenerationCounts - 汇总计数
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationCounts {
    pub evaluated: usize,
    pub scheduled: usize,
    pub skipped_already_scheduled: usize,
    pub skipped_excluded: usize,
    pub skipped_recently_completed: usize,
    pub skipped_conflicted: usize,
    pub skipped_capacity: usize,
    pub skipped_invalid: usize,
}

impl GenerationCounts {
    pub fn record(&mut self, outcome: &OutcomeKind) {
        self.evaluated += 1;
        match outcome {
            OutcomeKind::Scheduled { .. } => self.scheduled += 1,
            OutcomeKind::Conflicted { .. } => self.skipped_conflicted += 1,
            OutcomeKind::Skipped { reason } => match reason {
                SkipReason::AlreadyScheduled { .. } => self.skipped_already_scheduled += 1,
                SkipReason::Excluded { .. } => self.skipped_excluded += 1,
                SkipReason::RecentlyCompleted { .. } => self.skipped_recently_completed += 1,
                SkipReason::CapacityReached { .. } => self.skipped_capacity += 1,
                SkipReason::InvalidRecord { .. } => self.skipped_invalid += 1,
            },
        }
    }

    pub fn total_skipped(&self) -> usize {
        self.evaluated - self.scheduled
    }
}

// ==========================================
// GenerationReport - 周排程生成报告
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub run_id: String,
    pub week: Week,
    pub generated_at: NaiveDateTime,
    /// 状态轨迹 Idle → ... → Persisted
    pub phases: Vec<SchedulerPhase>,
    pub counts: GenerationCounts,
    pub outcomes: Vec<EquipmentOutcome>,
    /// 本次写入的条目（按 seq_no）
    pub entries: Vec<ScheduleEntry>,
    /// 被替换（删除）的 Scheduled/Conflicted 行数
    pub replaced_rows: usize,
    /// 保留的 Completed 行数
    pub preserved_completed: usize,
    pub warnings: Vec<String>,
    pub config_snapshot: serde_json::Value,
}

impl GenerationReport {
    pub fn outcome_for(&self, equipment_id: &str, pm_type: PmType) -> Option<&EquipmentOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.equipment_id == equipment_id && o.pm_type == Some(pm_type))
    }

    pub fn scheduled_ids(&self, pm_type: PmType) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.is_active() && e.pm_type == pm_type)
            .map(|e| e.equipment_id.as_str())
            .collect()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
