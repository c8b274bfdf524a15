// ==========================================
// 设备预防性维护排程系统 - 导入模块
// ==========================================
// 职责: 设备台账 CSV 导入
// ==========================================

pub mod equipment_importer;
pub mod error;

pub use equipment_importer::{EquipmentCsvImporter, ImportRejection, ImportSummary};
pub use error::ImportError;
