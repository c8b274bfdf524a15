// ==========================================
// 设备预防性维护排程系统 - 排除登记
// ==========================================
// 职责: 找不到 (Missing) / 运行至失效 (Run-to-Failure) 设备的只读视图
// 红线: 命中排除的设备无论逾期多久、优先级多高，都不得生成排程条目
// ==========================================

use crate::domain::equipment::Equipment;
use crate::domain::types::{EquipmentStatus, PmType};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// 排除原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExclusionReason {
    Missing,
    RunToFailure,
    /// 设备未声明该 PM 类型
    Unsupported(PmType),
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::Missing => write!(f, "设备已登记为找不到 (Missing)"),
            ExclusionReason::RunToFailure => write!(f, "设备已登记为运行至失效 (Run to Failure)"),
            ExclusionReason::Unsupported(pm_type) => write!(f, "设备未声明 {} PM", pm_type),
        }
    }
}

// ==========================================
// ExclusionRegistry - 排除登记快照
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExclusionRegistry {
    missing: HashSet<String>,
    run_to_failure: HashSet<String>,
}

impl ExclusionRegistry {
    pub fn new(missing: HashSet<String>, run_to_failure: HashSet<String>) -> Self {
        Self {
            missing,
            run_to_failure,
        }
    }

    /// 按设备编号查询是否排除（仅名单）
    pub fn is_excluded(&self, equipment_id: &str) -> bool {
        self.missing.contains(equipment_id) || self.run_to_failure.contains(equipment_id)
    }

    /// 综合设备状态与名单判定排除原因
    ///
    /// Missing 优先于 Run-to-Failure
    pub fn exclusion_reason(&self, equipment: &Equipment) -> Option<ExclusionReason> {
        let id = equipment.equipment_id.as_str();
        if equipment.status == EquipmentStatus::Missing || self.missing.contains(id) {
            return Some(ExclusionReason::Missing);
        }
        if equipment.status == EquipmentStatus::RunToFailure || self.run_to_failure.contains(id) {
            return Some(ExclusionReason::RunToFailure);
        }
        None
    }

    pub fn missing_count(&self) -> usize {
        self.missing.len()
    }

    pub fn run_to_failure_count(&self) -> usize {
        self.run_to_failure.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::PriorityClass;
    use chrono::NaiveDate;

    fn equipment(id: &str, status: EquipmentStatus) -> Equipment {
        Equipment {
            equipment_id: id.to_string(),
            description: None,
            priority: PriorityClass::P1,
            supports_monthly: true,
            supports_annual: true,
            status,
            last_monthly_date: None,
            last_annual_date: None,
            created_at: NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_status_flags_exclude_without_list_membership() {
        let registry = ExclusionRegistry::default();
        assert_eq!(
            registry.exclusion_reason(&equipment("E1", EquipmentStatus::Missing)),
            Some(ExclusionReason::Missing)
        );
        assert_eq!(
            registry.exclusion_reason(&equipment("E2", EquipmentStatus::RunToFailure)),
            Some(ExclusionReason::RunToFailure)
        );
        assert_eq!(registry.exclusion_reason(&equipment("E3", EquipmentStatus::Active)), None);
    }

    #[test]
    fn test_list_membership_excludes_active_equipment() {
        let registry = ExclusionRegistry::new(
            ["E1".to_string()].into_iter().collect(),
            ["E2".to_string()].into_iter().collect(),
        );
        assert!(registry.is_excluded("E1"));
        assert!(registry.is_excluded("E2"));
        assert!(!registry.is_excluded("E3"));
        assert_eq!(
            registry.exclusion_reason(&equipment("E2", EquipmentStatus::Active)),
            Some(ExclusionReason::RunToFailure)
        );
    }
}
