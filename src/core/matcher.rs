use crate::domain::model::{
    CustomerRecord, MatchResult, MonthDay, SkippedRecord, TargetWindow, TimeFrame,
};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];
const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// 解析生日字串。帶時區的時間戳先換算到目標時區再取日期；
/// 純日期字串直接視為日曆日。
pub fn parse_birthday(raw: &str, offset: FixedOffset) -> Result<NaiveDate, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err("birthday is empty".to_string());
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&offset).date_naive());
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Ok(date);
        }
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt.date());
        }
    }

    Err(format!("unrecognised date '{}'", value))
}

/// 依月/日（忽略年份）把客戶分到「今天」與「提前」兩組，保持輸入順序
pub fn match_birthdays(
    records: &[CustomerRecord],
    window: &TargetWindow,
    offset: FixedOffset,
) -> MatchResult {
    let mut result = MatchResult::default();

    for record in records {
        let parsed = match record.birthday.as_deref() {
            Some(raw) => parse_birthday(raw, offset),
            None => Err("birthday is missing".to_string()),
        };

        let birthday = match parsed {
            Ok(date) => MonthDay::from(date),
            Err(reason) => {
                tracing::warn!(
                    customer_id = %record.id,
                    customer = %record.display_name(),
                    "Skipping record: {}",
                    reason
                );
                result.skipped.push(SkippedRecord {
                    customer_id: record.id.clone(),
                    customer_name: record.display_name().to_string(),
                    raw_birthday: record.birthday.clone(),
                    reason,
                });
                continue;
            }
        };

        tracing::debug!(
            customer_id = %record.id,
            "Checking {} ({}) against today {} / advance {}",
            record.display_name(),
            birthday,
            window.today_month_day(),
            window.advance_month_day()
        );

        match window.frame_for(birthday) {
            Some(TimeFrame::Today) => result.due_today.push(record.clone()),
            Some(TimeFrame::Advance) => result.due_in_advance.push(record.clone()),
            None => {}
        }
    }

    result
}
