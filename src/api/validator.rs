// ==========================================
// 设备预防性维护排程系统 - 输入校验
// ==========================================
// 职责: 对外入口的参数解析与校验，任何状态变更之前执行
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::types::PmType;
use crate::domain::week::Week;
use crate::repository::row_utils::parse_datetime_text;

/// 解析周标识（必须为周一，格式 YYYY-MM-DD）
pub fn parse_week(raw: &str) -> ApiResult<Week> {
    if raw.trim().is_empty() {
        return Err(ApiError::Validation("周起始日期不能为空".to_string()));
    }
    Ok(raw.parse::<Week>()?)
}

/// 解析任意日期并归一到所在周
pub fn week_containing(raw: &str) -> ApiResult<Week> {
    let date = NaiveDate::parse_from_str(raw.trim(), Week::DATE_FORMAT)
        .map_err(|_| ApiError::Validation(format!("日期格式错误，应为 YYYY-MM-DD: {}", raw)))?;
    Ok(Week::containing(date))
}

pub fn parse_pm_type(raw: &str) -> ApiResult<PmType> {
    raw.parse::<PmType>().map_err(ApiError::Validation)
}

/// 解析完工时间：接受日期（记为当日 00:00）或日期时间
pub fn parse_completion_time(raw: &str) -> ApiResult<NaiveDateTime> {
    parse_datetime_text(raw)
        .ok_or_else(|| ApiError::Validation(format!("完工时间格式错误: {}", raw)))
}

pub fn require_non_empty(field: &str, value: &str) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation(format!("{}不能为空", field)));
    }
    Ok(trimmed.to_string())
}
