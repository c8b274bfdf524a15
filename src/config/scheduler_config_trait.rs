// ==========================================
// 设备预防性维护排程系统 - 排程配置读取 Trait
// ==========================================
// 职责: 定义排程引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

/// 配置读取结果
pub type ConfigReadResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// SchedulerConfigReader Trait
// ==========================================
// 用途: 排程引擎所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）；测试中使用 mock
#[async_trait]
pub trait SchedulerConfigReader: Send + Sync {
    // ===== 间隔配置 =====

    /// 获取 Monthly PM 最小再完工间隔（天）
    ///
    /// # 默认值
    /// - 30
    async fn get_monthly_interval_days(&self) -> ConfigReadResult<i64>;

    /// 获取 Annual PM 最小再完工间隔（天）
    ///
    /// # 默认值
    /// - 365
    async fn get_annual_interval_days(&self) -> ConfigReadResult<i64>;

    /// 获取跨类型冲突窗口（天，含边界）
    ///
    /// # 默认值
    /// - 7
    async fn get_cross_type_conflict_days(&self) -> ConfigReadResult<i64>;

    // ===== 产能与人员 =====

    /// 获取每周最大排程条数
    ///
    /// # 返回
    /// - 0: 不限制
    async fn get_max_weekly_assignments(&self) -> ConfigReadResult<usize>;

    /// 获取可指派技术员名单（按轮转顺序）
    ///
    /// # 默认值
    /// - 空（不指派）
    async fn get_technicians(&self) -> ConfigReadResult<Vec<String>>;

    /// 获取当前配置快照（JSON），写入生成报告
    async fn get_config_snapshot_json(&self) -> ConfigReadResult<String>;
}
