// ==========================================
// 设备预防性维护排程系统 - 周排程服务
// ==========================================
// 状态机: Idle → SnapshotLoaded → OverwriteChecked → Generated → Persisted
// 红线: 快照读取必须在任何删除之前完成（请求级快照，显式传递）
// 红线: 同一周的重新生成串行化；不同周可并发
// 红线: 写入失败时整周回滚，调用方要么拿到完整报告，要么拿到单个错误
// ==========================================

use crate::config::{ConfigError, SchedulerConfig, SchedulerConfigReader};
use crate::domain::equipment::RegistryRecord;
use crate::domain::week::Week;
use crate::engine::events::{OptionalEventPublisher, SchedulerEvent};
use crate::engine::generator::AssignmentGenerator;
use crate::engine::report::{GenerationReport, SchedulerPhase};
use crate::engine::repositories::SchedulerRepositories;
use crate::engine::snapshot::ScheduleSnapshot;
use crate::engine::week_lock::{WeekLockError, WeekLockRegistry};
use crate::repository::RepositoryError;
use chrono::Local;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// SchedulerError - 排程服务错误
// ==========================================
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// 输入非法（任何状态变更之前拒绝）
    #[error("输入校验失败: {0}")]
    InvalidInput(String),

    /// 同一周已有重新生成在进行
    #[error(transparent)]
    RegenerationInProgress(#[from] WeekLockError),

    /// 快照读取后目标周被并发修改
    #[error("周排程写入冲突: {0}")]
    ConcurrentModification(RepositoryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// 状态轨迹
#[derive(Debug)]
struct PhaseTrail {
    current: SchedulerPhase,
    trail: Vec<SchedulerPhase>,
}

impl PhaseTrail {
    fn new() -> Self {
        Self {
            current: SchedulerPhase::Idle,
            trail: vec![SchedulerPhase::Idle],
        }
    }

    fn advance(&mut self, to: SchedulerPhase) {
        debug_assert_eq!(self.current.next(), Some(to), "非法状态迁移");
        debug!(from = %self.current, to = %to, "状态迁移");
        self.current = to;
        self.trail.push(to);
    }
}

// ==========================================
// SchedulingService - 周排程服务
// ==========================================
pub struct SchedulingService {
    repos: SchedulerRepositories,
    config: Arc<dyn SchedulerConfigReader>,
    events: OptionalEventPublisher,
    week_locks: Arc<WeekLockRegistry>,
}

impl SchedulingService {
    pub fn new(repos: SchedulerRepositories, config: Arc<dyn SchedulerConfigReader>) -> Self {
        Self {
            repos,
            config,
            events: OptionalEventPublisher::none(),
            week_locks: Arc::new(WeekLockRegistry::new()),
        }
    }

    pub fn with_event_publisher(mut self, events: OptionalEventPublisher) -> Self {
        self.events = events;
        self
    }

    /// 共享周锁登记（多个服务实例操作同一数据库时）
    pub fn with_week_locks(mut self, week_locks: Arc<WeekLockRegistry>) -> Self {
        self.week_locks = week_locks;
        self
    }

    pub fn repositories(&self) -> &SchedulerRepositories {
        &self.repos
    }

    /// 重新生成指定周的排程
    ///
    /// # 返回
    /// - `Ok(report)`: 已整周落库
    /// - `Err(InvalidInput)`: 台账存在重复设备编号
    /// - `Err(RegenerationInProgress)`: 同一周正在重新生成
    /// - `Err(ConcurrentModification)`: 快照读取后目标周或唯一约束被并发改动
    /// - `Err(Config | Repository)`: 读取或写入失败，库中状态保持不变
    #[instrument(skip_all, fields(week = %week))]
    pub async fn generate_weekly_schedule(&self, week: Week) -> Result<GenerationReport, SchedulerError> {
        let run_id = Uuid::new_v4().to_string();
        let _week_guard = self.week_locks.try_acquire(week, &run_id)?;
        let mut phases = PhaseTrail::new();
        let mut warnings: Vec<String> = Vec::new();

        info!(run_id = %run_id, "开始周排程重新生成");

        let config = SchedulerConfig::load(self.config.as_ref()).await?;
        let config_snapshot = self.load_config_snapshot(&mut warnings).await;

        let records = self.repos.equipment_repo.list_registry()?;
        Self::ensure_unique_ids(&records)?;

        // ==========================================
        // 步骤1: 快照 (删除之前)
        // ==========================================
        let snapshot = self.load_snapshot(week)?;
        phases.advance(SchedulerPhase::SnapshotLoaded);
        info!(
            equipment = records.len(),
            this_week_rows = snapshot.this_week_rows().len(),
            replaceable = snapshot.replaceable_this_week(),
            active_elsewhere = snapshot.active_elsewhere_count(),
            "快照已加载"
        );

        // ==========================================
        // 步骤2: 覆写检查
        // ==========================================
        let completed_rows = self.repos.schedule_repo.completions_in_week(week)?;
        if completed_rows > 0 {
            let message = format!(
                "周 {} 已有 {} 条完工条目；完工条目保留，仅替换 Scheduled/Conflicted 条目",
                week, completed_rows
            );
            warn!(completed_rows, "{}", message);
            self.publish(SchedulerEvent::overwrite_warning(&run_id, week, completed_rows, message.clone()));
            warnings.push(message);
        }
        phases.advance(SchedulerPhase::OverwriteChecked);

        // ==========================================
        // 步骤3: 生成
        // ==========================================
        let generated_at = Local::now().naive_local();
        let output = AssignmentGenerator::new(&snapshot, &config).generate(&records, generated_at);
        phases.advance(SchedulerPhase::Generated);
        info!(
            scheduled = output.counts.scheduled,
            conflicted = output.counts.skipped_conflicted,
            skipped = output.counts.total_skipped(),
            "排程生成完成"
        );
        if output.stale_cached_dates > 0 {
            warnings.push(format!(
                "{} 个设备/PM 类型的台账缓存日期与完工记录不一致，已按完工记录判定",
                output.stale_cached_dates
            ));
        }

        // ==========================================
        // 步骤4: 整周替换（含快照一致性校验）
        // ==========================================
        let persisted = self
            .repos
            .schedule_repo
            .replace_week_checked(week, snapshot.this_week_rows(), &output.entries)
            .map_err(|e| match e {
                RepositoryError::WeekSnapshotConflict { .. }
                | RepositoryError::UniqueConstraintViolation(_) => SchedulerError::ConcurrentModification(e),
                other => SchedulerError::Repository(other),
            })?;
        phases.advance(SchedulerPhase::Persisted);
        info!(
            deleted = persisted.deleted,
            inserted = persisted.inserted,
            preserved_completed = persisted.preserved_completed,
            "周排程已落库"
        );

        self.publish(SchedulerEvent::week_regenerated(&run_id, week, persisted.inserted));

        Ok(GenerationReport {
            run_id,
            week,
            generated_at,
            phases: phases.trail,
            counts: output.counts,
            outcomes: output.outcomes,
            entries: output.entries,
            replaced_rows: persisted.deleted,
            preserved_completed: persisted.preserved_completed,
            warnings,
            config_snapshot,
        })
    }

    /// 一次性读取生成所需的全部库状态
    fn load_snapshot(&self, week: Week) -> Result<ScheduleSnapshot, SchedulerError> {
        let this_week = self.repos.schedule_repo.scheduled_this_week(week)?;
        let active_elsewhere = self.repos.schedule_repo.active_schedules_outside_week(week)?;
        let last_completions = self.repos.completion_repo.last_completions()?;
        let registry = self.repos.exclusion_repo.load_registry()?;

        debug!(
            missing = registry.missing_count(),
            run_to_failure = registry.run_to_failure_count(),
            completions = last_completions.len(),
            "排除登记与完工记录已读取"
        );

        Ok(ScheduleSnapshot::new(
            week,
            this_week,
            active_elsewhere,
            last_completions,
            registry,
        ))
    }

    async fn load_config_snapshot(&self, warnings: &mut Vec<String>) -> serde_json::Value {
        let raw = match self.config.get_config_snapshot_json().await {
            Ok(raw) => raw,
            Err(e) => {
                warnings.push(format!("配置快照读取失败: {}", e));
                return serde_json::Value::Null;
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warnings.push(format!("配置快照格式错误: {}", e));
            serde_json::Value::Null
        })
    }

    fn ensure_unique_ids(records: &[RegistryRecord]) -> Result<(), SchedulerError> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(records.len());
        for record in records {
            let id = match record {
                Ok(e) => e.equipment_id.as_str(),
                Err(invalid) => invalid.equipment_id.as_str(),
            };
            if id.is_empty() {
                continue;
            }
            if !seen.insert(id) {
                return Err(SchedulerError::InvalidInput(format!("设备编号重复: {}", id)));
            }
        }
        Ok(())
    }

    fn publish(&self, event: SchedulerEvent) {
        let event_type = event.event_type.as_str().to_string();
        if let Err(e) = self.events.publish(event) {
            warn!(event_type = %event_type, error = %e, "事件发布失败");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::equipment::{Equipment, InvalidEquipment};
    use crate::domain::types::{EquipmentStatus, PriorityClass};
    use chrono::NaiveDate;

    fn equipment(id: &str) -> RegistryRecord {
        Ok(Equipment {
            equipment_id: id.to_string(),
            description: None,
            priority: PriorityClass::P1,
            supports_monthly: true,
            supports_annual: false,
            status: EquipmentStatus::Active,
            last_monthly_date: None,
            last_annual_date: None,
            created_at: NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        })
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let records = vec![
            equipment("E1"),
            Err(InvalidEquipment {
                equipment_id: "E1".to_string(),
                reason: "未知的设备状态: Retired".to_string(),
            }),
        ];
        let err = SchedulingService::ensure_unique_ids(&records).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidInput(ref m) if m.contains("E1")));

        assert!(SchedulingService::ensure_unique_ids(&[equipment("E1"), equipment("E2")]).is_ok());
    }

    #[test]
    fn test_phase_trail_records_order() {
        let mut trail = PhaseTrail::new();
        trail.advance(SchedulerPhase::SnapshotLoaded);
        trail.advance(SchedulerPhase::OverwriteChecked);
        assert_eq!(
            trail.trail,
            vec![
                SchedulerPhase::Idle,
                SchedulerPhase::SnapshotLoaded,
                SchedulerPhase::OverwriteChecked
            ]
        );
    }
}
