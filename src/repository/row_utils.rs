// ==========================================
// 设备预防性维护排程系统 - 行映射工具
// ==========================================
// 职责: 日期/枚举列的统一解析与格式化
// 说明: 外部系统写入的日期格式不统一 (带/不带时间、T 分隔)，读取时宽松解析
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use std::error::Error;
use std::str::FromStr;

/// 库内统一的时间格式
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// 库内统一的日期格式
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 宽松解析日期时间文本
///
/// 支持: `2026-10-12 08:30:00` / `2026-10-12T08:30:00` / `2026-10-12`（按 00:00:00）
pub fn parse_datetime_text(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| parse_date_text(raw).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

/// 宽松解析日期文本（忽略时间部分）
pub fn parse_date_text(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, DATE_FORMAT).ok()
}

pub fn format_datetime(value: &NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::<dyn Error + Send + Sync>::from(message),
    )
}

/// 读取日期时间列
pub fn get_datetime(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    parse_datetime_text(&raw).ok_or_else(|| conversion_error(idx, format!("无效的时间: {}", raw)))
}

/// 读取日期列
pub fn get_date(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    parse_date_text(&raw).ok_or_else(|| conversion_error(idx, format!("无效的日期: {}", raw)))
}

/// 读取文本枚举列（PmType / ScheduleStatus 等）
pub fn get_enum<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| conversion_error(idx, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_variants() {
        let expected = NaiveDate::from_ymd_opt(2026, 10, 12)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        assert_eq!(parse_datetime_text("2026-10-12 08:30:00"), Some(expected));
        assert_eq!(parse_datetime_text("2026-10-12T08:30:00"), Some(expected));
        assert_eq!(
            parse_datetime_text("2026-10-12"),
            NaiveDate::from_ymd_opt(2026, 10, 12).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_datetime_text("12/10/2026"), None);
    }

    #[test]
    fn test_parse_date_ignores_time_part() {
        assert_eq!(
            parse_date_text("2026-10-12 23:59:59"),
            NaiveDate::from_ymd_opt(2026, 10, 12)
        );
    }
}
