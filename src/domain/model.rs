use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 客戶資料（唯讀）；欄位名稱沿用網頁端寫入的文件格式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default, alias = "instagramHandle")]
    pub handle: Option<String>,
    /// 原始字串；解析在比對階段進行，失敗的記錄會被略過
    #[serde(default, deserialize_with = "lenient_string")]
    pub birthday: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// 非字串的值保留原文，交給比對階段判定為無法解析
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

impl CustomerRecord {
    pub fn new(id: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
            handle: None,
            birthday: None,
            phone: None,
            email: None,
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    pub fn with_birthday(mut self, birthday: impl Into<String>) -> Self {
        self.birthday = Some(birthday.into());
        self
    }

    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            "Unknown"
        } else {
            &self.full_name
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeFrame {
    Today,
    Advance,
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeFrame::Today => f.write_str("today"),
            TimeFrame::Advance => f.write_str("advance"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

impl From<NaiveDate> for MonthDay {
    fn from(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            day: date.day(),
        }
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

/// 本次執行要比對的兩個日曆日（已換算到目標時區）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetWindow {
    pub today: NaiveDate,
    pub advance: NaiveDate,
    pub advance_days: u32,
}

impl TargetWindow {
    pub fn today_month_day(&self) -> MonthDay {
        self.today.into()
    }

    pub fn advance_month_day(&self) -> MonthDay {
        self.advance.into()
    }

    pub fn frame_for(&self, birthday: MonthDay) -> Option<TimeFrame> {
        if birthday == self.today_month_day() {
            Some(TimeFrame::Today)
        } else if birthday == self.advance_month_day() {
            Some(TimeFrame::Advance)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub customer_id: String,
    pub customer_name: String,
    pub raw_birthday: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    pub due_today: Vec<CustomerRecord>,
    pub due_in_advance: Vec<CustomerRecord>,
    pub skipped: Vec<SkippedRecord>,
}

impl MatchResult {
    pub fn is_empty(&self) -> bool {
        self.due_today.is_empty() && self.due_in_advance.is_empty()
    }

    pub fn records(&self, frame: TimeFrame) -> &[CustomerRecord] {
        match frame {
            TimeFrame::Today => &self.due_today,
            TimeFrame::Advance => &self.due_in_advance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationOutcome {
    pub customer_id: String,
    pub customer_name: String,
    pub time_frame: TimeFrame,
    pub delivered: bool,
    pub attempts: u32,
    pub status: Option<u16>,
    pub error_detail: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub window: TargetWindow,
    pub matched_today: usize,
    pub matched_advance: usize,
    pub skipped: usize,
    pub outcomes: Vec<NotificationOutcome>,
}

impl RunSummary {
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.delivered).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.delivered).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &NotificationOutcome> {
        self.outcomes.iter().filter(|o| !o.delivered)
    }

    pub fn is_clean(&self) -> bool {
        self.failed() == 0 && self.skipped == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "matched today={} matched in advance={} delivered={} failed={} skipped={}",
            self.matched_today,
            self.matched_advance,
            self.delivered(),
            self.failed(),
            self.skipped
        )
    }
}
