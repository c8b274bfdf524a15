// ==========================================
// 设备预防性维护排程系统 - 排程周
// ==========================================
// 约定: 周以周一为起始日，week_start_date 存储为 YYYY-MM-DD
// ==========================================

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 周标识错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WeekError {
    #[error("周起始日必须为周一: {date} 为 {weekday}")]
    NotWeekStart { date: NaiveDate, weekday: Weekday },

    #[error("无法解析的周起始日期: {0}")]
    Unparseable(String),
}

// ==========================================
// Week - 以周一起始日标识的日历周
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "NaiveDate", into = "NaiveDate")]
pub struct Week(NaiveDate);

impl Week {
    pub const DATE_FORMAT: &'static str = "%Y-%m-%d";

    /// 以周一日期创建周，非周一返回错误
    pub fn new(start: NaiveDate) -> Result<Self, WeekError> {
        if start.weekday() != Weekday::Mon {
            return Err(WeekError::NotWeekStart {
                date: start,
                weekday: start.weekday(),
            });
        }
        Ok(Self(start))
    }

    /// 任意日期所在的周
    pub fn containing(date: NaiveDate) -> Self {
        let offset = date.weekday().num_days_from_monday() as i64;
        Self(date - Duration::days(offset))
    }

    pub fn start(&self) -> NaiveDate {
        self.0
    }

    /// 周日（含）
    pub fn end(&self) -> NaiveDate {
        self.0 + Duration::days(6)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + Duration::days(7))
    }

    pub fn previous(&self) -> Self {
        Self(self.0 - Duration::days(7))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start() && date <= self.end()
    }

    /// 与另一周起始日的天数差（绝对值）
    pub fn days_apart(&self, other: &Week) -> i64 {
        (self.0 - other.0).num_days().abs()
    }

    pub fn to_db_string(&self) -> String {
        self.0.format(Self::DATE_FORMAT).to_string()
    }
}

impl fmt::Display for Week {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::DATE_FORMAT))
    }
}

impl FromStr for Week {
    type Err = WeekError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let date = NaiveDate::parse_from_str(s.trim(), Self::DATE_FORMAT)
            .map_err(|_| WeekError::Unparseable(s.to_string()))?;
        Week::new(date)
    }
}

impl TryFrom<NaiveDate> for Week {
    type Error = WeekError;

    fn try_from(value: NaiveDate) -> Result<Self, Self::Error> {
        Week::new(value)
    }
}

impl From<Week> for NaiveDate {
    fn from(week: Week) -> Self {
        week.0
    }
}
