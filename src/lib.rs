// ==========================================
// 设备预防性维护排程系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 每周生成月度/年度 PM 任务清单 (人工执行、外部登记完工)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 资格判定/排序/生成
pub mod engine;

// 导入层 - 台账 CSV
pub mod importer;

// 配置层 - 排程参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{EquipmentStatus, PmType, PriorityClass, ScheduleStatus};

// 领域实体
pub use domain::{
    CompletionRecord, Equipment, ExclusionReason, ExclusionRegistry, ScheduleEntry, Week,
    WeekStats,
};

// 引擎
pub use engine::{
    AssignmentGenerator, EligibilityChecker, EligibilityResult, GenerationReport, PrioritySorter,
    ScheduleSnapshot, SchedulingService, SkipReason, WeekLockRegistry,
};

// 配置
pub use config::{ConfigManager, SchedulerConfig};

// API
pub use api::{ApiError, ApiResult, ScheduleApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "设备预防性维护排程系统";
