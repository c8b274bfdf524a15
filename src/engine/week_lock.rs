// ==========================================
// 设备预防性维护排程系统 - 周级重新生成锁
// ==========================================
// 红线: 同一周同一时刻只允许一个重新生成流程（快照读取 → 删除写入不得交错）
// 说明: 不同周互不阻塞；第二个调用方立即被拒绝而不是排队等待
// ==========================================

use crate::domain::week::Week;
use chrono::{Local, NaiveDateTime};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WeekLockError {
    #[error("周 {week} 正在重新生成 (run_id={holder}, 开始于 {since})")]
    InProgress {
        week: Week,
        holder: String,
        since: NaiveDateTime,
    },

    #[error("周锁状态不可用: {0}")]
    Poisoned(String),
}

#[derive(Debug, Clone)]
struct LockHolder {
    run_id: String,
    acquired_at: NaiveDateTime,
}

// ==========================================
// WeekLockRegistry - 进程内周锁登记
// ==========================================
#[derive(Debug, Default)]
pub struct WeekLockRegistry {
    active: Mutex<HashMap<Week, LockHolder>>,
}

impl WeekLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 尝试占用某一周
    ///
    /// # 返回
    /// - `Ok(guard)`: 占用成功，guard 释放时自动解锁
    /// - `Err(InProgress)`: 该周已被其他流程占用
    pub fn try_acquire(
        self: &Arc<Self>,
        week: Week,
        run_id: &str,
    ) -> Result<WeekLockGuard, WeekLockError> {
        let mut active = self
            .active
            .lock()
            .map_err(|e| WeekLockError::Poisoned(e.to_string()))?;

        if let Some(holder) = active.get(&week) {
            return Err(WeekLockError::InProgress {
                week,
                holder: holder.run_id.clone(),
                since: holder.acquired_at,
            });
        }

        active.insert(
            week,
            LockHolder {
                run_id: run_id.to_string(),
                acquired_at: Local::now().naive_local(),
            },
        );
        tracing::debug!(week = %week, run_id, "周锁已占用");

        Ok(WeekLockGuard {
            registry: Arc::clone(self),
            week,
        })
    }

    pub fn is_locked(&self, week: Week) -> bool {
        self.active
            .lock()
            .map(|active| active.contains_key(&week))
            .unwrap_or(false)
    }

    fn release(&self, week: Week) {
        let mut active = match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        active.remove(&week);
        tracing::debug!(week = %week, "周锁已释放");
    }
}

/// 周锁持有凭证
#[derive(Debug)]
pub struct WeekLockGuard {
    registry: Arc<WeekLockRegistry>,
    week: Week,
}

impl WeekLockGuard {
    pub fn week(&self) -> Week {
        self.week
    }
}

impl Drop for WeekLockGuard {
    fn drop(&mut self) {
        self.registry.release(self.week);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn week(d: u32) -> Week {
        Week::new(NaiveDate::from_ymd_opt(2026, 10, d).unwrap()).unwrap()
    }

    #[test]
    fn test_same_week_rejected_until_released() {
        let registry = Arc::new(WeekLockRegistry::new());

        let guard = registry.try_acquire(week(5), "run-a").unwrap();
        let err = registry.try_acquire(week(5), "run-b").unwrap_err();
        assert!(matches!(err, WeekLockError::InProgress { ref holder, .. } if holder == "run-a"));
        assert!(registry.is_locked(week(5)));

        drop(guard);
        assert!(!registry.is_locked(week(5)));
        assert!(registry.try_acquire(week(5), "run-b").is_ok());
    }

    #[test]
    fn test_different_weeks_do_not_block() {
        let registry = Arc::new(WeekLockRegistry::new());
        let _a = registry.try_acquire(week(5), "run-a").unwrap();
        let b = registry.try_acquire(week(12), "run-b").unwrap();
        assert_eq!(b.week(), week(12));
    }
}
