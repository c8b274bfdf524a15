// ==========================================
// 设备预防性维护排程系统 - 领域类型定义
// ==========================================
// 职责: PM 类型、优先级、设备状态、排程状态
// 序列化格式: 与数据库文本一致 (Monthly / P1 / Active / Scheduled)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// PM 类型 (PM Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PmType {
    Monthly, // 月度 PM
    Annual,  // 年度 PM
}

impl PmType {
    /// 全部 PM 类型（评估顺序: Monthly 在前）
    pub const ALL: [PmType; 2] = [PmType::Monthly, PmType::Annual];

    /// 默认最小复做间隔（天）
    pub fn default_interval_days(&self) -> i64 {
        match self {
            PmType::Monthly => 30,
            PmType::Annual => 365,
        }
    }

    /// 交叉冲突规则中的"另一种"类型
    pub fn other(&self) -> PmType {
        match self {
            PmType::Monthly => PmType::Annual,
            PmType::Annual => PmType::Monthly,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PmType::Monthly => "Monthly",
            PmType::Annual => "Annual",
        }
    }
}

impl fmt::Display for PmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PmType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" => Ok(PmType::Monthly),
            "annual" => Ok(PmType::Annual),
            other => Err(format!("未知的 PM 类型: {}", other)),
        }
    }
}

// ==========================================
// 优先级 (Priority Class)
// ==========================================
// 排序键: P1 < P2 < P3 < Other (rank 1/2/3/99)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriorityClass {
    P1,
    P2,
    P3,
    Other,
}

impl PriorityClass {
    pub fn rank(&self) -> u32 {
        match self {
            PriorityClass::P1 => 1,
            PriorityClass::P2 => 2,
            PriorityClass::P3 => 3,
            PriorityClass::Other => 99,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityClass::P1 => "P1",
            PriorityClass::P2 => "P2",
            PriorityClass::P3 => "P3",
            PriorityClass::Other => "Other",
        }
    }
}

impl fmt::Display for PriorityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for PriorityClass {
    /// 数字 1/2/3 等同 P1/P2/P3；其余取值（含空值、P4、Low 等）一律归入 Other
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "P1" | "1" => PriorityClass::P1,
            "P2" | "2" => PriorityClass::P2,
            "P3" | "3" => PriorityClass::P3,
            _ => PriorityClass::Other,
        }
    }
}

// ==========================================
// 设备生命周期状态 (Equipment Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EquipmentStatus {
    Active,
    Missing,      // 找不到 (Cannot Find)
    RunToFailure, // 运行至失效
}

impl EquipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentStatus::Active => "Active",
            EquipmentStatus::Missing => "Missing",
            EquipmentStatus::RunToFailure => "Run to Failure",
        }
    }
}

impl fmt::Display for EquipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EquipmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "active" => Ok(EquipmentStatus::Active),
            "missing" | "cannotfind" => Ok(EquipmentStatus::Missing),
            "runtofailure" | "rtf" => Ok(EquipmentStatus::RunToFailure),
            _ => Err(format!("未知的设备状态: {}", s.trim())),
        }
    }
}

// ==========================================
// 排程条目状态 (Schedule Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScheduleStatus {
    Scheduled,
    Completed,
    Conflicted,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Scheduled => "Scheduled",
            ScheduleStatus::Completed => "Completed",
            ScheduleStatus::Conflicted => "Conflicted",
        }
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ScheduleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Scheduled" => Ok(ScheduleStatus::Scheduled),
            "Completed" => Ok(ScheduleStatus::Completed),
            "Conflicted" => Ok(ScheduleStatus::Conflicted),
            other => Err(format!("未知的排程状态: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_rank_order() {
        assert!(PriorityClass::P1.rank() < PriorityClass::P2.rank());
        assert!(PriorityClass::P3.rank() < PriorityClass::Other.rank());
        assert_eq!(PriorityClass::Other.rank(), 99);
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!(PriorityClass::from("p1"), PriorityClass::P1);
        assert_eq!(PriorityClass::from(" 3 "), PriorityClass::P3);
        assert_eq!(PriorityClass::from(""), PriorityClass::Other);
        assert_eq!(PriorityClass::from("P4"), PriorityClass::Other);
        assert_eq!(PriorityClass::from("Low"), PriorityClass::Other);
        assert_eq!(PriorityClass::from("Critical"), PriorityClass::Other);
    }

    #[test]
    fn test_equipment_status_parse_variants() {
        assert_eq!(
            "Run to Failure".parse::<EquipmentStatus>().unwrap(),
            EquipmentStatus::RunToFailure
        );
        assert_eq!(
            "Cannot Find".parse::<EquipmentStatus>().unwrap(),
            EquipmentStatus::Missing
        );
        assert_eq!("active".parse::<EquipmentStatus>().unwrap(), EquipmentStatus::Active);
        assert!("Retired".parse::<EquipmentStatus>().is_err());
    }

    #[test]
    fn test_pm_type_intervals() {
        assert_eq!(PmType::Monthly.default_interval_days(), 30);
        assert_eq!(PmType::Annual.default_interval_days(), 365);
        assert_eq!(PmType::Monthly.other(), PmType::Annual);
    }
}
