// ==========================================
// 设备预防性维护排程系统 - 排程参数
// ==========================================
// 职责: 每次周排程生成前一次性解析全部配置，生成过程中只读
// ==========================================

use crate::config::scheduler_config_trait::SchedulerConfigReader;
use crate::domain::types::PmType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 配置加载错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置读取失败: {0}")]
    Read(String),

    #[error("配置值非法 ({key}): {message}")]
    Invalid { key: &'static str, message: String },
}

// ==========================================
// SchedulerConfig - 单次生成使用的参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub monthly_interval_days: i64,
    pub annual_interval_days: i64,
    pub cross_type_conflict_days: i64,
    /// 0 表示不限制
    pub max_weekly_assignments: usize,
    pub technicians: Vec<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            monthly_interval_days: PmType::Monthly.default_interval_days(),
            annual_interval_days: PmType::Annual.default_interval_days(),
            cross_type_conflict_days: 7,
            max_weekly_assignments: 0,
            technicians: Vec::new(),
        }
    }
}

impl SchedulerConfig {
    /// 从配置读取器加载并校验
    pub async fn load(reader: &dyn SchedulerConfigReader) -> Result<Self, ConfigError> {
        let read_err = |e: Box<dyn std::error::Error + Send + Sync>| ConfigError::Read(e.to_string());

        let config = Self {
            monthly_interval_days: reader.get_monthly_interval_days().await.map_err(read_err)?,
            annual_interval_days: reader.get_annual_interval_days().await.map_err(read_err)?,
            cross_type_conflict_days: reader
                .get_cross_type_conflict_days()
                .await
                .map_err(read_err)?,
            max_weekly_assignments: reader
                .get_max_weekly_assignments()
                .await
                .map_err(read_err)?,
            technicians: reader.get_technicians().await.map_err(read_err)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        use crate::config::config_manager::config_keys;

        // 间隔只允许在默认值基础上放宽，不允许缩短
        for (pm_type, key, days) in [
            (PmType::Monthly, config_keys::MONTHLY_INTERVAL_DAYS, self.monthly_interval_days),
            (PmType::Annual, config_keys::ANNUAL_INTERVAL_DAYS, self.annual_interval_days),
        ] {
            let floor = pm_type.default_interval_days();
            if days < floor {
                return Err(ConfigError::Invalid {
                    key,
                    message: format!("不得小于 {} 天，实际 {}", floor, days),
                });
            }
        }
        if self.cross_type_conflict_days < 0 {
            return Err(ConfigError::Invalid {
                key: config_keys::CROSS_TYPE_CONFLICT_DAYS,
                message: format!("不能为负数，实际 {}", self.cross_type_conflict_days),
            });
        }
        Ok(())
    }

    /// 指定 PM 类型的最小再完工间隔
    pub fn interval_days(&self, pm_type: PmType) -> i64 {
        match pm_type {
            PmType::Monthly => self.monthly_interval_days,
            PmType::Annual => self.annual_interval_days,
        }
    }

    /// 是否已达到周产能上限
    pub fn capacity_reached(&self, scheduled: usize) -> bool {
        self.max_weekly_assignments > 0 && scheduled >= self.max_weekly_assignments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::scheduler_config_trait::ConfigReadResult;
    use async_trait::async_trait;

    struct FixedReader {
        monthly: i64,
        window: i64,
    }

    #[async_trait]
    impl SchedulerConfigReader for FixedReader {
        async fn get_monthly_interval_days(&self) -> ConfigReadResult<i64> {
            Ok(self.monthly)
        }
        async fn get_annual_interval_days(&self) -> ConfigReadResult<i64> {
            Ok(365)
        }
        async fn get_cross_type_conflict_days(&self) -> ConfigReadResult<i64> {
            Ok(self.window)
        }
        async fn get_max_weekly_assignments(&self) -> ConfigReadResult<usize> {
            Ok(2)
        }
        async fn get_technicians(&self) -> ConfigReadResult<Vec<String>> {
            Ok(vec!["amy".to_string()])
        }
        async fn get_config_snapshot_json(&self) -> ConfigReadResult<String> {
            Ok("{}".to_string())
        }
    }

    #[tokio::test]
    async fn test_load_resolves_reader_values() {
        let config = SchedulerConfig::load(&FixedReader { monthly: 45, window: 7 })
            .await
            .unwrap();
        assert_eq!(config.interval_days(PmType::Monthly), 45);
        assert_eq!(config.interval_days(PmType::Annual), 365);
        assert!(!config.capacity_reached(1));
        assert!(config.capacity_reached(2));
    }

    #[tokio::test]
    async fn test_load_rejects_invalid_values() {
        let err = SchedulerConfig::load(&FixedReader { monthly: 0, window: 7 })
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "pm.monthly_interval_days", .. }));

        let err = SchedulerConfig::load(&FixedReader { monthly: 28, window: 7 })
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "pm.monthly_interval_days", .. }));

        let err = SchedulerConfig::load(&FixedReader { monthly: 30, window: -1 })
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_unlimited_capacity() {
        let config = SchedulerConfig::default();
        assert!(!config.capacity_reached(10_000));
    }
}
