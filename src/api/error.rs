// ==========================================
// 设备预防性维护排程系统 - API层错误类型
// ==========================================
// 职责: 定义对外错误分类，转换下层错误为用户可读的错误消息
// 分类: Validation（状态变更前拒绝）/ Conflict（稍后重试）/ Persistence（整体回滚）
// 说明: SkipReason 不是错误，只出现在生成报告中
// ==========================================

use crate::config::ConfigError;
use crate::domain::week::WeekError;
use crate::engine::scheduler::SchedulerError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    /// 周或台账输入非法，未做任何状态变更
    #[error("数据验证失败: {0}")]
    Validation(String),

    /// 同一周并发重新生成，或快照读取后被并发修改；调用方稍后重试
    #[error("并发冲突: {0}")]
    Conflict(String),

    /// 存储失败，整个操作已回滚，原有周排程保持不变
    #[error("持久化失败: {0}")]
    Persistence(String),
}

impl ApiError {
    /// 错误分类代码（CLI 输出使用）
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Conflict(_) => "CONFLICT_ERROR",
            ApiError::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::WeekSnapshotConflict { week, message } => {
                ApiError::Conflict(format!("周 {} 在读取后被修改: {}", week, message))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::Validation(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::NotFound { entity, id } => {
                ApiError::Validation(format!("{}(id={})不存在", entity, id))
            }
            other => ApiError::Persistence(other.to_string()),
        }
    }
}

impl From<WeekError> for ApiError {
    fn from(err: WeekError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Invalid { .. } => ApiError::Validation(err.to_string()),
            ConfigError::Read(msg) => ApiError::Persistence(format!("配置读取失败: {}", msg)),
        }
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::InvalidInput(msg) => ApiError::Validation(msg),
            SchedulerError::RegenerationInProgress(e) => ApiError::Conflict(e.to_string()),
            SchedulerError::ConcurrentModification(e) => ApiError::Conflict(e.to_string()),
            SchedulerError::Config(e) => e.into(),
            SchedulerError::Repository(e) => e.into(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
