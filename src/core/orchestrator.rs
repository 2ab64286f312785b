use crate::core::clock::{resolve_window, DEFAULT_ADVANCE_DAYS};
use crate::core::dispatcher::{DispatchItem, Dispatcher};
use crate::core::formatter::MessageFormatter;
use crate::core::matcher::match_birthdays;
use crate::domain::model::{MatchResult, RunSummary, TimeFrame};
use crate::domain::ports::{Clock, Messenger, RecordSource};
use crate::utils::error::{NotifierError, Result};
use chrono::FixedOffset;
use std::fmt;

/// 提前通知先送，當天通知後送（沿用既有行為）
pub const DISPATCH_ORDER: [TimeFrame; 2] = [TimeFrame::Advance, TimeFrame::Today];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Fetching,
    Matching,
    Dispatching(TimeFrame),
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => f.write_str("idle"),
            RunState::Fetching => f.write_str("fetching"),
            RunState::Matching => f.write_str("matching"),
            RunState::Dispatching(frame) => write!(f, "dispatching({})", frame),
            RunState::Done => f.write_str("done"),
            RunState::Failed => f.write_str("failed"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RunSettings {
    pub offset: FixedOffset,
    pub advance_days: u32,
    pub dispatcher: Dispatcher,
}

impl RunSettings {
    pub fn new(offset: FixedOffset) -> Self {
        Self {
            offset,
            advance_days: DEFAULT_ADVANCE_DAYS,
            dispatcher: Dispatcher::default(),
        }
    }

    pub fn with_advance_days(mut self, advance_days: u32) -> Self {
        self.advance_days = advance_days;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }
}

pub struct RunOrchestrator {
    source: Box<dyn RecordSource>,
    messenger: Box<dyn Messenger>,
    clock: Box<dyn Clock>,
    settings: RunSettings,
    history: Vec<RunState>,
}

impl RunOrchestrator {
    pub fn new(
        source: Box<dyn RecordSource>,
        messenger: Box<dyn Messenger>,
        clock: Box<dyn Clock>,
        settings: RunSettings,
    ) -> Self {
        Self {
            source,
            messenger,
            clock,
            settings,
            history: vec![RunState::Idle],
        }
    }

    pub fn state(&self) -> RunState {
        self.history.last().copied().unwrap_or(RunState::Idle)
    }

    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    fn transition(&mut self, next: RunState) {
        tracing::debug!("Run state: {} → {}", self.state(), next);
        self.history.push(next);
    }

    fn fail(&mut self, err: NotifierError) -> NotifierError {
        tracing::error!("❌ Birthday run failed during {}: {}", self.state(), err);
        self.transition(RunState::Failed);
        err
    }

    pub async fn run(&mut self) -> Result<RunSummary> {
        tracing::info!("🎂 Birthday notification run started");

        // 缺少憑證時不讀資料也不送訊息
        if let Err(err) = self.messenger.ensure_configured() {
            return Err(self.fail(err));
        }

        self.transition(RunState::Fetching);
        let fetched = self.source.fetch_all().await;
        let records = match fetched {
            Ok(records) => records,
            Err(err) => return Err(self.fail(err)),
        };
        tracing::info!("Found {} total customers in {}", records.len(), self.source.name());

        self.transition(RunState::Matching);
        let window = resolve_window(
            self.clock.now(),
            self.settings.offset,
            self.settings.advance_days,
        );
        tracing::info!(
            "Checking birthdays for today ({}) and {} days from now ({})",
            window.today_month_day(),
            window.advance_days,
            window.advance_month_day()
        );
        let matches = match_birthdays(&records, &window, self.settings.offset);
        tracing::info!(
            "Found {} birthdays today, {} in {} days, {} records skipped",
            matches.due_today.len(),
            matches.due_in_advance.len(),
            window.advance_days,
            matches.skipped.len()
        );

        let formatter = MessageFormatter::new(self.settings.offset, window.advance_days);
        let mut outcomes = Vec::new();
        for frame in DISPATCH_ORDER {
            self.transition(RunState::Dispatching(frame));
            let items = build_items(&matches, frame, &formatter);
            if items.is_empty() {
                continue;
            }
            tracing::info!("Sending {} {} notifications...", items.len(), frame);
            let dispatched = self
                .settings
                .dispatcher
                .dispatch(self.messenger.as_ref(), items)
                .await;
            match dispatched {
                Ok(batch) => outcomes.extend(batch),
                Err(err) => return Err(self.fail(err)),
            }
        }

        if matches.is_empty() {
            tracing::info!("No birthdays to notify about today.");
        }

        self.transition(RunState::Done);
        let summary = RunSummary {
            window,
            matched_today: matches.due_today.len(),
            matched_advance: matches.due_in_advance.len(),
            skipped: matches.skipped.len(),
            outcomes,
        };

        tracing::info!("✅ Birthday run completed: {}", summary);
        for failure in summary.failures() {
            tracing::warn!(
                customer_id = %failure.customer_id,
                time_frame = %failure.time_frame,
                status = ?failure.status,
                "Delivery failed for {}: {}",
                failure.customer_name,
                failure.error_detail.as_deref().unwrap_or("unknown error")
            );
        }

        Ok(summary)
    }
}

fn build_items(
    matches: &MatchResult,
    frame: TimeFrame,
    formatter: &MessageFormatter,
) -> Vec<DispatchItem> {
    matches
        .records(frame)
        .iter()
        .map(|record| DispatchItem {
            record: record.clone(),
            time_frame: frame,
            message: formatter.format(record, frame),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::FixedClock;
    use crate::domain::model::CustomerRecord;
    use crate::domain::ports::DeliveryError;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::{Arc, Mutex};

    struct StaticSource {
        records: Option<Vec<CustomerRecord>>,
    }

    #[async_trait]
    impl RecordSource for StaticSource {
        fn name(&self) -> &str {
            "static"
        }

        async fn fetch_all(&self) -> Result<Vec<CustomerRecord>> {
            self.records
                .clone()
                .ok_or_else(|| NotifierError::source_unavailable("static", "offline"))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingMessenger {
        configured: bool,
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Messenger for RecordingMessenger {
        fn ensure_configured(&self) -> Result<()> {
            if self.configured {
                Ok(())
            } else {
                Err(NotifierError::MissingConfiguration {
                    field: "telegram.chat_id".to_string(),
                })
            }
        }

        async fn send(&self, text: &str) -> std::result::Result<(), DeliveryError> {
            self.sent.lock().unwrap().push(text.to_string());
            if text.contains("Bob") {
                return Err(DeliveryError::http(500, "Internal Server Error"));
            }
            Ok(())
        }
    }

    fn orchestrator(
        records: Option<Vec<CustomerRecord>>,
        messenger: RecordingMessenger,
    ) -> RunOrchestrator {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 6, 0, 0).unwrap();
        RunOrchestrator::new(
            Box::new(StaticSource { records }),
            Box::new(messenger),
            Box::new(FixedClock::new(now)),
            RunSettings::new(FixedOffset::east_opt(3 * 3600).unwrap()),
        )
    }

    fn configured() -> RecordingMessenger {
        RecordingMessenger {
            configured: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_advance_notifications_are_sent_before_today() {
        let messenger = configured();
        let records = vec![
            CustomerRecord::new("a", "Alice").with_birthday("2024-03-10"),
            CustomerRecord::new("c", "Carol").with_birthday("1990-03-12"),
        ];
        let mut run = orchestrator(Some(records), messenger.clone());

        let summary = run.run().await.unwrap();

        assert_eq!(summary.matched_today, 1);
        assert_eq!(summary.matched_advance, 1);
        assert_eq!(summary.delivered(), 2);
        let sent = messenger.sent.lock().unwrap().clone();
        assert!(sent[0].contains("Carol"));
        assert!(sent[1].contains("Alice"));
        assert_eq!(
            run.history(),
            &[
                RunState::Idle,
                RunState::Fetching,
                RunState::Matching,
                RunState::Dispatching(TimeFrame::Advance),
                RunState::Dispatching(TimeFrame::Today),
                RunState::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_partial_failure_still_reaches_done() {
        let messenger = configured();
        let records = vec![
            CustomerRecord::new("a", "Alice").with_birthday("2024-03-10"),
            CustomerRecord::new("b", "Bob").with_birthday("1999-03-10"),
            CustomerRecord::new("c", "Carol").with_birthday("1990-03-10"),
        ];
        let mut run = orchestrator(Some(records), messenger.clone());

        let summary = run.run().await.unwrap();

        assert_eq!(run.state(), RunState::Done);
        assert_eq!(messenger.sent.lock().unwrap().len(), 3);
        assert_eq!(summary.delivered(), 2);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.failures().next().unwrap().customer_id, "b");
    }

    #[tokio::test]
    async fn test_source_failure_is_fatal() {
        let messenger = configured();
        let mut run = orchestrator(None, messenger.clone());

        let err = run.run().await.unwrap_err();

        assert!(matches!(err, NotifierError::SourceUnavailable { .. }));
        assert_eq!(run.state(), RunState::Failed);
        assert!(messenger.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_configuration_fails_before_fetching() {
        let messenger = RecordingMessenger::default();
        let records = vec![CustomerRecord::new("a", "Alice").with_birthday("2024-03-10")];
        let mut run = orchestrator(Some(records), messenger.clone());

        let err = run.run().await.unwrap_err();

        assert!(matches!(err, NotifierError::MissingConfiguration { .. }));
        assert_eq!(run.history(), &[RunState::Idle, RunState::Failed]);
        assert!(messenger.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_snapshot_succeeds_with_no_sends() {
        let messenger = configured();
        let mut run = orchestrator(Some(Vec::new()), messenger.clone());

        let summary = run.run().await.unwrap();

        assert_eq!(summary.outcomes.len(), 0);
        assert!(summary.is_clean());
        assert_eq!(run.state(), RunState::Done);
    }

    #[tokio::test]
    async fn test_unparseable_birthday_is_skipped_not_fatal() {
        let messenger = configured();
        let records = vec![CustomerRecord::new("x", "Xena").with_birthday("not-a-date")];
        let mut run = orchestrator(Some(records), messenger.clone());

        let summary = run.run().await.unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.matched_today + summary.matched_advance, 0);
        assert!(messenger.sent.lock().unwrap().is_empty());
    }
}
