// ==========================================
// 设备预防性维护排程系统 - API 层
// ==========================================
// 职责: 对外业务入口，参数校验与错误归类
// ==========================================

pub mod error;
pub mod schedule_api;
pub mod validator;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use schedule_api::ScheduleApi;
