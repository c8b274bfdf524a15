// ==========================================
// 设备预防性维护排程系统 - 引擎层
// ==========================================
// 职责: 资格判定、优先级排序、周排程生成与落库编排
// 红线: Engine 不拼 SQL, 所有判定必须输出原因
// ==========================================

pub mod eligibility;
pub mod events;
pub mod generator;
pub mod priority;
pub mod report;
pub mod repositories;
pub mod scheduler;
pub mod snapshot;
pub mod week_lock;

// 重导出核心引擎
pub use eligibility::{EligibilityChecker, EligibilityResult};
pub use events::{
    NoOpEventPublisher, OptionalEventPublisher, SchedulerEvent, SchedulerEventPublisher,
    SchedulerEventType,
};
pub use generator::{AssignmentGenerator, GenerationOutput};
pub use priority::{PmCandidate, PrioritySorter};
pub use report::{
    EquipmentOutcome, GenerationCounts, GenerationReport, OutcomeKind, SchedulerPhase, SkipReason,
};
pub use repositories::SchedulerRepositories;
pub use scheduler::{SchedulerError, SchedulingService};
pub use snapshot::ScheduleSnapshot;
pub use week_lock::{WeekLockError, WeekLockGuard, WeekLockRegistry};
