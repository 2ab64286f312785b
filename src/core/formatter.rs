use crate::core::matcher::parse_birthday;
use crate::domain::model::{CustomerRecord, TimeFrame};
use chrono::FixedOffset;

pub const INVALID_DATE: &str = "Invalid date";

#[derive(Debug, Clone, Copy)]
pub struct MessageFormatter {
    offset: FixedOffset,
    advance_days: u32,
}

impl MessageFormatter {
    pub fn new(offset: FixedOffset, advance_days: u32) -> Self {
        Self {
            offset,
            advance_days,
        }
    }

    /// dd/mm/yyyy；無法解析時回傳佔位字串，不中斷整批發送
    pub fn display_date(&self, record: &CustomerRecord) -> String {
        match record
            .birthday
            .as_deref()
            .map(|raw| parse_birthday(raw, self.offset))
        {
            Some(Ok(date)) => date.format("%d/%m/%Y").to_string(),
            Some(Err(reason)) => {
                tracing::warn!(customer_id = %record.id, "Date formatting degraded: {}", reason);
                INVALID_DATE.to_string()
            }
            None => {
                tracing::warn!(customer_id = %record.id, "Date formatting degraded: birthday is missing");
                INVALID_DATE.to_string()
            }
        }
    }

    fn lead_time(&self) -> String {
        match self.advance_days {
            1 => "tomorrow".to_string(),
            days => format!("in {} days", days),
        }
    }

    pub fn format(&self, record: &CustomerRecord, frame: TimeFrame) -> String {
        let who = match record.handle.as_deref().map(str::trim) {
            Some(handle) if !handle.is_empty() => format!(
                "{} (@{})",
                record.display_name(),
                handle.trim_start_matches('@')
            ),
            _ => record.display_name().to_string(),
        };
        let date = self.display_date(record);

        match frame {
            TimeFrame::Advance => format!(
                "🎉 Upcoming Birthday Alert! 🎉\n\nIt's {}'s birthday {}!\n\n📅 Date: {}\n🎂 Get ready to celebrate!",
                who,
                self.lead_time(),
                date
            ),
            TimeFrame::Today => format!(
                "🎂🎉 HAPPY BIRTHDAY! 🎉🎂\n\nToday is {}'s birthday!\n\n📅 Date: {}\n🎈 Don't forget to send your wishes!",
                who, date
            ),
        }
    }
}
