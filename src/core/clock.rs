use crate::domain::model::TargetWindow;
use crate::domain::ports::Clock;
use chrono::{DateTime, Days, FixedOffset, Utc};

pub const DEFAULT_ADVANCE_DAYS: u32 = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

/// 先把時間點換算到目標時區的民用時間，再取日曆日；
/// 提前日用日期加法，月份與閏年進位由 chrono 處理。
pub fn resolve_window(now: DateTime<Utc>, offset: FixedOffset, advance_days: u32) -> TargetWindow {
    let today = now.with_timezone(&offset).date_naive();
    let advance = today
        .checked_add_days(Days::new(u64::from(advance_days)))
        .unwrap_or(today);

    TargetWindow {
        today,
        advance,
        advance_days,
    }
}
