// ==========================================
// 设备预防性维护排程系统 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合排程服务所需的所有 Repository
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::repository::{
    CompletionRepository, EquipmentRepository, ExclusionRepository, ScheduleRepository,
};

/// 排程服务仓储集合
///
/// # 包含的仓储
/// - `equipment_repo`: 设备台账（只读）
/// - `completion_repo`: 完工记录（只读）
/// - `schedule_repo`: 周排程（快照读取 + 整周替换）
/// - `exclusion_repo`: 排除登记（只读）
#[derive(Clone)]
pub struct SchedulerRepositories {
    pub equipment_repo: Arc<EquipmentRepository>,
    pub completion_repo: Arc<CompletionRepository>,
    pub schedule_repo: Arc<ScheduleRepository>,
    pub exclusion_repo: Arc<ExclusionRepository>,
}

impl SchedulerRepositories {
    pub fn new(
        equipment_repo: Arc<EquipmentRepository>,
        completion_repo: Arc<CompletionRepository>,
        schedule_repo: Arc<ScheduleRepository>,
        exclusion_repo: Arc<ExclusionRepository>,
    ) -> Self {
        Self {
            equipment_repo,
            completion_repo,
            schedule_repo,
            exclusion_repo,
        }
    }

    /// 基于同一共享连接创建全部仓储
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self::new(
            Arc::new(EquipmentRepository::new(conn.clone())),
            Arc::new(CompletionRepository::new(conn.clone())),
            Arc::new(ScheduleRepository::new(conn.clone())),
            Arc::new(ExclusionRepository::new(conn)),
        )
    }
}
