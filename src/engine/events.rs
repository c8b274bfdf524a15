// ==========================================
// 设备预防性维护排程系统 - 排程事件发布
// ==========================================
// 职责: 定义排程事件发布 trait，实现依赖倒置
// 说明: 引擎只定义 trait，报表/通知等下游实现适配器
// ==========================================

use crate::domain::week::Week;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 排程事件类型
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerEventType {
    /// 目标周已有完工条目时重新生成（不阻断，必须告知操作人员）
    OverwriteWarning,
    /// 周排程已重新生成并落库
    WeekRegenerated,
}

impl SchedulerEventType {
    pub fn as_str(&self) -> &str {
        match self {
            SchedulerEventType::OverwriteWarning => "OverwriteWarning",
            SchedulerEventType::WeekRegenerated => "WeekRegenerated",
        }
    }
}

/// 排程事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerEvent {
    pub run_id: String,
    pub week: Week,
    pub event_type: SchedulerEventType,
    /// 事件说明（告警文本等）
    pub detail: Option<String>,
    /// 相关行数：OverwriteWarning 为已完工行数，WeekRegenerated 为写入行数
    pub affected_rows: usize,
}

impl SchedulerEvent {
    pub fn overwrite_warning(run_id: &str, week: Week, completed_rows: usize, detail: String) -> Self {
        Self {
            run_id: run_id.to_string(),
            week,
            event_type: SchedulerEventType::OverwriteWarning,
            detail: Some(detail),
            affected_rows: completed_rows,
        }
    }

    pub fn week_regenerated(run_id: &str, week: Week, inserted_rows: usize) -> Self {
        Self {
            run_id: run_id.to_string(),
            week,
            event_type: SchedulerEventType::WeekRegenerated,
            detail: None,
            affected_rows: inserted_rows,
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 排程事件发布者
///
/// # 返回
/// - `Ok(id)`: 下游任务 ID（如支持）或空字符串
pub trait SchedulerEventPublisher: Send + Sync {
    fn publish(&self, event: SchedulerEvent) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl SchedulerEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: SchedulerEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - run_id={}, week={}, event_type={}",
            event.run_id,
            event.week,
            event.event_type.as_str()
        );
        Ok(String::new())
    }
}

/// 可选的事件发布者包装
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn SchedulerEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn SchedulerEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件（如果有发布者）
    pub fn publish(&self, event: SchedulerEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        match &self.inner {
            Some(publisher) => publisher.publish(event),
            None => {
                tracing::debug!(
                    "OptionalEventPublisher: 未配置发布者，跳过事件 - run_id={}, event_type={}",
                    event.run_id,
                    event.event_type.as_str()
                );
                Ok(String::new())
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn week() -> Week {
        Week::new(NaiveDate::from_ymd_opt(2026, 10, 5).unwrap()).unwrap()
    }

    #[test]
    fn test_overwrite_warning_event() {
        let event = SchedulerEvent::overwrite_warning("run-1", week(), 3, "3 条已完工".to_string());
        assert_eq!(event.event_type, SchedulerEventType::OverwriteWarning);
        assert_eq!(event.affected_rows, 3);
        assert!(event.detail.is_some());
    }

    #[test]
    fn test_noop_publisher() {
        let result = NoOpEventPublisher.publish(SchedulerEvent::week_regenerated("run-1", week(), 4));
        assert!(result.unwrap().is_empty());
    }

    #[test]
    fn test_optional_publisher() {
        let publisher = OptionalEventPublisher::none();
        assert!(!publisher.is_configured());
        assert!(publisher
            .publish(SchedulerEvent::week_regenerated("run-1", week(), 0))
            .is_ok());

        let noop = Arc::new(NoOpEventPublisher) as Arc<dyn SchedulerEventPublisher>;
        let publisher = OptionalEventPublisher::with_publisher(noop);
        assert!(publisher.is_configured());
    }
}
