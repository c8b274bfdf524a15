// ==========================================
// 设备预防性维护排程系统 - 设备领域模型
// ==========================================
// 归属: 设备台账 (外部系统)，排程引擎只读
// 注意: last_*_date 为台账缓存字段，可能滞后于完工记录，不参与排程判定
// ==========================================

use crate::domain::types::{EquipmentStatus, PmType, PriorityClass};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Equipment - 设备台账记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub equipment_id: String,                // 设备编号 (bfm_equipment_no)
    pub description: Option<String>,         // 设备描述
    pub priority: PriorityClass,             // 优先级
    pub supports_monthly: bool,              // 需要月度 PM
    pub supports_annual: bool,               // 需要年度 PM
    pub status: EquipmentStatus,             // 生命周期状态
    pub last_monthly_date: Option<NaiveDate>, // 缓存: 最近月度 PM 日期
    pub last_annual_date: Option<NaiveDate>,  // 缓存: 最近年度 PM 日期
    pub created_at: NaiveDateTime,           // 建档时间
}

impl Equipment {
    /// 是否具备指定 PM 类型的能力标记
    pub fn supports(&self, pm_type: PmType) -> bool {
        match pm_type {
            PmType::Monthly => self.supports_monthly,
            PmType::Annual => self.supports_annual,
        }
    }

    /// 台账缓存的最近完成日期（仅用于漂移检测）
    pub fn cached_last_date(&self, pm_type: PmType) -> Option<NaiveDate> {
        match pm_type {
            PmType::Monthly => self.last_monthly_date,
            PmType::Annual => self.last_annual_date,
        }
    }
}

// ==========================================
// InvalidEquipment - 无法解析的台账记录
// ==========================================
// 单条记录解析失败不影响整周生成，计入跳过原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidEquipment {
    pub equipment_id: String,
    pub reason: String,
}

/// 台账读取结果：有效设备或无效记录
pub type RegistryRecord = Result<Equipment, InvalidEquipment>;
