// ==========================================
// 设备预防性维护排程系统 - 排程资格判定
// ==========================================
// 红线: 排除登记与能力标志是绝对否决，先于任何间隔计算
// 红线: "最近完成"只取完工记录，不读台账缓存日期
// ==========================================
// 判定顺序 (首个命中即返回):
//   Excluded → 能力标志 → AlreadyScheduled → RecentlyCompleted → Conflicted → Eligible
// 输入: 请求级快照 + 本次已生成条目
// 输出: EligibilityResult（纯函数，不访问存储）
// ==========================================

use crate::config::SchedulerConfig;
use crate::domain::equipment::Equipment;
use crate::domain::exclusion::ExclusionReason;
use crate::domain::schedule::ScheduleEntry;
use crate::domain::types::PmType;
use crate::domain::week::Week;
use crate::engine::snapshot::ScheduleSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::instrument;

// ==========================================
// EligibilityResult - 判定结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict")]
pub enum EligibilityResult {
    Eligible,
    Excluded { reason: ExclusionReason },
    RecentlyCompleted { days_since: i64, min_interval: i64 },
    /// 其他周（含之后的周）已有未完成条目
    AlreadyScheduled { existing_week: Week },
    /// 与另一 PM 类型的有效条目间隔不足
    Conflicted { other_type: PmType, other_week: Week },
}

impl EligibilityResult {
    pub fn is_eligible(&self) -> bool {
        matches!(self, EligibilityResult::Eligible)
    }

    pub fn label(&self) -> &'static str {
        match self {
            EligibilityResult::Eligible => "Eligible",
            EligibilityResult::Excluded { .. } => "Excluded",
            EligibilityResult::RecentlyCompleted { .. } => "RecentlyCompleted",
            EligibilityResult::AlreadyScheduled { .. } => "AlreadyScheduled",
            EligibilityResult::Conflicted { .. } => "Conflicted",
        }
    }
}

impl fmt::Display for EligibilityResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EligibilityResult::Eligible => write!(f, "可排程"),
            EligibilityResult::Excluded { reason } => write!(f, "已排除: {}", reason),
            EligibilityResult::RecentlyCompleted {
                days_since,
                min_interval,
            } => write!(f, "距上次完工 {} 天，未满 {} 天间隔", days_since, min_interval),
            EligibilityResult::AlreadyScheduled { existing_week } => {
                write!(f, "已在 {} 周排程且未完成", existing_week)
            }
            EligibilityResult::Conflicted {
                other_type,
                other_week,
            } => write!(f, "与 {} 周的 {} PM 间隔过近", other_week, other_type),
        }
    }
}

// ==========================================
// EligibilityChecker - 资格判定器
// ==========================================
// 红线: 不直接写库，只基于快照计算
pub struct EligibilityChecker<'a> {
    snapshot: &'a ScheduleSnapshot,
    config: &'a SchedulerConfig,
}

impl<'a> EligibilityChecker<'a> {
    pub fn new(snapshot: &'a ScheduleSnapshot, config: &'a SchedulerConfig) -> Self {
        Self { snapshot, config }
    }

    /// 判定单个 (设备, PM 类型) 在快照目标周的资格
    ///
    /// # 参数
    /// - `planned`: 本次生成已产出的条目（参与跨类型冲突判定）
    #[instrument(
        level = "debug",
        skip(self, equipment, planned),
        fields(equipment_id = %equipment.equipment_id, pm_type = %pm_type, week = %self.snapshot.week())
    )]
    pub fn check(
        &self,
        equipment: &Equipment,
        pm_type: PmType,
        planned: &[ScheduleEntry],
    ) -> EligibilityResult {
        let week = self.snapshot.week();
        let id = equipment.equipment_id.as_str();

        // === 步骤 1: 排除登记 ===
        if let Some(reason) = self.snapshot.registry().exclusion_reason(equipment) {
            return EligibilityResult::Excluded { reason };
        }

        // === 步骤 2: 能力标志 ===
        if !equipment.supports(pm_type) {
            return EligibilityResult::Excluded {
                reason: ExclusionReason::Unsupported(pm_type),
            };
        }

        // === 步骤 3: 其他周未完成条目 ===
        if let Some(existing) = self.snapshot.active_elsewhere(id, pm_type) {
            return EligibilityResult::AlreadyScheduled {
                existing_week: existing.week,
            };
        }

        // === 步骤 4: 最小再完工间隔 ===
        if let Some(last_done) = self.snapshot.last_completion_date(id, pm_type) {
            let days_since = (week.start() - last_done).num_days();
            let min_interval = self.config.interval_days(pm_type);
            if days_since < min_interval {
                return EligibilityResult::RecentlyCompleted {
                    days_since,
                    min_interval,
                };
            }
        }

        // === 步骤 5: 跨类型冲突 ===
        if let Some(other_week) = self.conflicting_week(id, pm_type, planned) {
            return EligibilityResult::Conflicted {
                other_type: pm_type.other(),
                other_week,
            };
        }

        EligibilityResult::Eligible
    }

    /// 查找窗口内（含边界）另一 PM 类型的有效条目所在周
    fn conflicting_week(
        &self,
        equipment_id: &str,
        pm_type: PmType,
        planned: &[ScheduleEntry],
    ) -> Option<Week> {
        let week = self.snapshot.week();
        let other = pm_type.other();
        let window = self.config.cross_type_conflict_days;

        let persisted = self
            .snapshot
            .active_elsewhere(equipment_id, other)
            .map(|e| e.week);
        let in_pass = planned
            .iter()
            .filter(|e| e.is_active() && e.equipment_id == equipment_id && e.pm_type == other)
            .map(|e| e.week);

        persisted
            .into_iter()
            .chain(in_pass)
            .find(|other_week| week.days_apart(other_week) <= window)
    }
}
