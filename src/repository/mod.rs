// ==========================================
// 设备预防性维护排程系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod completion_repo;
pub mod equipment_repo;
pub mod error;
pub mod exclusion_repo;
pub mod row_utils;
pub mod schedule_repo;

// 重导出核心仓储
pub use completion_repo::{CompletionOutcome, CompletionRepository};
pub use equipment_repo::EquipmentRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use exclusion_repo::ExclusionRepository;
pub use schedule_repo::{ReplaceWeekOutcome, ScheduleRepository};
