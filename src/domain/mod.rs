// ==========================================
// 设备预防性维护排程系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod equipment;
pub mod exclusion;
pub mod schedule;
pub mod types;
pub mod week;

// 重导出核心类型
pub use equipment::{Equipment, InvalidEquipment, RegistryRecord};
pub use exclusion::{ExclusionReason, ExclusionRegistry};
pub use schedule::{CompletionRecord, ScheduleEntry, WeekStats};
pub use types::{EquipmentStatus, PmType, PriorityClass, ScheduleStatus};
pub use week::{Week, WeekError};
