// ==========================================
// 设备预防性维护排程系统 - 周排程 API
// ==========================================
// 职责: 周排程生成（唯一入口）、周统计查询、完工登记
// 红线: 调用方要么拿到完整报告，要么拿到单个顶层错误，绝不出现半周状态
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator::{parse_completion_time, parse_pm_type, parse_week, require_non_empty};
use crate::config::{ConfigManager, SchedulerConfigReader};
use crate::domain::schedule::{CompletionRecord, ScheduleEntry, WeekStats};
use crate::domain::week::Week;
use crate::engine::{GenerationReport, SchedulerRepositories, SchedulingService};
use crate::repository::CompletionOutcome;

// ==========================================
// ScheduleApi - 周排程 API
// ==========================================
pub struct ScheduleApi {
    service: Arc<SchedulingService>,
}

impl ScheduleApi {
    pub fn new(service: Arc<SchedulingService>) -> Self {
        Self { service }
    }

    /// 基于共享连接装配（配置从同库 config_kv 读取）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ApiResult<Self> {
        let config = ConfigManager::from_connection(conn.clone())
            .map_err(|e| ApiError::Persistence(format!("配置管理器初始化失败: {}", e)))?;
        let service = SchedulingService::new(
            SchedulerRepositories::from_connection(conn),
            Arc::new(config) as Arc<dyn SchedulerConfigReader>,
        );
        Ok(Self::new(Arc::new(service)))
    }

    pub fn service(&self) -> &Arc<SchedulingService> {
        &self.service
    }

    /// 重新生成指定周的排程
    ///
    /// # 参数
    /// - week: 周起始日（周一，YYYY-MM-DD）
    ///
    /// # 返回
    /// - Ok(GenerationReport): 逐设备结果与汇总计数
    /// - Err(Validation): 周标识非法或台账编号重复，库未改动
    /// - Err(Conflict): 同一周正在重新生成 / 读取后被并发修改
    /// - Err(Persistence): 写入失败，原周排程保持不变
    pub async fn generate_weekly_schedule(&self, week: &str) -> ApiResult<GenerationReport> {
        let week = parse_week(week)?;
        self.generate_for_week(week).await
    }

    pub async fn generate_for_week(&self, week: Week) -> ApiResult<GenerationReport> {
        match self.service.generate_weekly_schedule(week).await {
            Ok(report) => {
                info!(
                    week = %week,
                    run_id = %report.run_id,
                    scheduled = report.counts.scheduled,
                    "周排程生成成功"
                );
                Ok(report)
            }
            Err(e) => {
                let err = ApiError::from(e);
                warn!(week = %week, code = err.code(), error = %err, "周排程生成失败");
                Err(err)
            }
        }
    }

    /// 周完成率统计
    pub fn week_stats(&self, week: &str) -> ApiResult<WeekStats> {
        let week = parse_week(week)?;
        Ok(self.service.repositories().schedule_repo.week_stats(week)?)
    }

    /// 查询某周已落库的条目
    pub fn week_entries(&self, week: &str) -> ApiResult<Vec<ScheduleEntry>> {
        let week = parse_week(week)?;
        Ok(self.service.repositories().schedule_repo.scheduled_this_week(week)?)
    }

    /// 设备完工历史（最近在前）
    pub fn completion_history(&self, equipment_id: &str) -> ApiResult<Vec<CompletionRecord>> {
        let equipment_id = require_non_empty("设备编号", equipment_id)?;
        Ok(self
            .service
            .repositories()
            .completion_repo
            .list_for_equipment(&equipment_id)?)
    }

    /// 登记完工（外部完工登记流程入口）
    ///
    /// 写入完工记录，并将该设备/PM 类型的 Scheduled 条目置为 Completed
    pub fn record_completion(
        &self,
        equipment_id: &str,
        pm_type: &str,
        completed_at: &str,
        technician: &str,
    ) -> ApiResult<CompletionOutcome> {
        let equipment_id = require_non_empty("设备编号", equipment_id)?;
        let pm_type = parse_pm_type(pm_type)?;
        let completed_at = parse_completion_time(completed_at)?;
        let technician = require_non_empty("技术员", technician)?;

        let repos = self.service.repositories();
        if repos.equipment_repo.find_by_id(&equipment_id)?.is_none() {
            return Err(ApiError::Validation(format!("设备不存在: {}", equipment_id)));
        }

        let record = CompletionRecord::new(equipment_id, pm_type, completed_at, technician);
        let outcome = repos.completion_repo.record_completion(&record)?;
        info!(
            equipment_id = %record.equipment_id,
            pm_type = %record.pm_type,
            completion_id = outcome.completion_id,
            retired_entry = ?outcome.retired_entry_id,
            "完工已登记"
        );
        Ok(outcome)
    }
}
