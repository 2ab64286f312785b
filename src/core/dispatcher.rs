use crate::core::retry::RetryPolicy;
use crate::domain::model::{CustomerRecord, NotificationOutcome, TimeFrame};
use crate::domain::ports::Messenger;
use crate::utils::error::Result;
use futures::stream::{self, StreamExt};

#[derive(Debug, Clone)]
pub struct DispatchItem {
    pub record: CustomerRecord,
    pub time_frame: TimeFrame,
    pub message: String,
}

#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    retry: RetryPolicy,
    max_in_flight: usize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(RetryPolicy::None, 1)
    }
}

impl Dispatcher {
    pub fn new(retry: RetryPolicy, max_in_flight: usize) -> Self {
        Self {
            retry,
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// 每筆獨立投遞；單筆失敗只記錄在結果中，不影響其他筆。
    /// 結果順序與輸入一致（`buffered` 保序）。
    pub async fn dispatch<M>(
        &self,
        messenger: &M,
        items: Vec<DispatchItem>,
    ) -> Result<Vec<NotificationOutcome>>
    where
        M: Messenger + ?Sized,
    {
        messenger.ensure_configured()?;

        let outcomes = stream::iter(items)
            .map(|item| self.deliver(messenger, item))
            .buffered(self.max_in_flight)
            .collect::<Vec<_>>()
            .await;

        Ok(outcomes)
    }

    async fn deliver<M>(&self, messenger: &M, item: DispatchItem) -> NotificationOutcome
    where
        M: Messenger + ?Sized,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match messenger.send(&item.message).await {
                Ok(()) => {
                    tracing::info!(
                        customer_id = %item.record.id,
                        time_frame = %item.time_frame,
                        attempt,
                        "✅ Notification sent for {}",
                        item.record.display_name()
                    );
                    return outcome(&item, true, attempt, None, None);
                }
                Err(err) => {
                    if err.retryable {
                        if let Some(delay) = self.retry.delay_after(attempt) {
                            tracing::debug!(
                                customer_id = %item.record.id,
                                attempt,
                                "Retrying in {:?} after: {}",
                                delay,
                                err
                            );
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                    }

                    tracing::warn!(
                        customer_id = %item.record.id,
                        customer = %item.record.display_name(),
                        time_frame = %item.time_frame,
                        status = ?err.status,
                        attempt,
                        "Failed to send notification: {}",
                        err.detail
                    );
                    return outcome(&item, false, attempt, err.status, Some(err.detail));
                }
            }
        }
    }
}

fn outcome(
    item: &DispatchItem,
    delivered: bool,
    attempts: u32,
    status: Option<u16>,
    error_detail: Option<String>,
) -> NotificationOutcome {
    NotificationOutcome {
        customer_id: item.record.id.clone(),
        customer_name: item.record.display_name().to_string(),
        time_frame: item.time_frame,
        delivered,
        attempts,
        status,
        error_detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::DeliveryError;
    use crate::utils::error::NotifierError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// 依訊息內容決定失敗次數的假 Messenger
    #[derive(Default)]
    struct ScriptedMessenger {
        configured: bool,
        failures: Mutex<HashMap<String, Vec<DeliveryError>>>,
        sent: Mutex<Vec<String>>,
    }

    impl ScriptedMessenger {
        fn configured() -> Self {
            Self {
                configured: true,
                ..Default::default()
            }
        }

        fn fail_on(self, needle: &str, errors: Vec<DeliveryError>) -> Self {
            self.failures
                .lock()
                .unwrap()
                .insert(needle.to_string(), errors);
            self
        }

        fn attempts(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Messenger for ScriptedMessenger {
        fn ensure_configured(&self) -> Result<()> {
            if self.configured {
                Ok(())
            } else {
                Err(NotifierError::MissingConfiguration {
                    field: "telegram.bot_token".to_string(),
                })
            }
        }

        async fn send(&self, text: &str) -> std::result::Result<(), DeliveryError> {
            self.sent.lock().unwrap().push(text.to_string());
            let mut failures = self.failures.lock().unwrap();
            for (needle, queue) in failures.iter_mut() {
                if text.contains(needle.as_str()) && !queue.is_empty() {
                    return Err(queue.remove(0));
                }
            }
            Ok(())
        }
    }

    fn item(id: &str) -> DispatchItem {
        DispatchItem {
            record: CustomerRecord::new(id, format!("Name {}", id)),
            time_frame: TimeFrame::Today,
            message: format!("message for {}", id),
        }
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_rest() {
        let messenger = ScriptedMessenger::configured()
            .fail_on("for b", vec![DeliveryError::http(400, "Bad Request: chat not found")]);

        let outcomes = Dispatcher::default()
            .dispatch(&messenger, vec![item("a"), item("b"), item("c")])
            .await
            .unwrap();

        assert_eq!(messenger.attempts().len(), 3);
        let delivered: Vec<bool> = outcomes.iter().map(|o| o.delivered).collect();
        assert_eq!(delivered, vec![true, false, true]);
        assert_eq!(outcomes[1].customer_id, "b");
        assert_eq!(outcomes[1].status, Some(400));
        assert_eq!(
            outcomes[1].error_detail.as_deref(),
            Some("Bad Request: chat not found")
        );
    }

    #[tokio::test]
    async fn test_missing_configuration_makes_no_attempts() {
        let messenger = ScriptedMessenger::default();

        let err = Dispatcher::default()
            .dispatch(&messenger, vec![item("a"), item("b")])
            .await
            .unwrap_err();

        assert!(matches!(err, NotifierError::MissingConfiguration { .. }));
        assert!(messenger.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_retry_only_for_retryable_errors() {
        let messenger = ScriptedMessenger::configured()
            .fail_on("for a", vec![DeliveryError::http(502, "Bad Gateway")])
            .fail_on("for b", vec![DeliveryError::http(403, "Forbidden")]);
        let dispatcher = Dispatcher::new(
            RetryPolicy::Fixed {
                attempts: 3,
                delay: Duration::from_millis(1),
            },
            1,
        );

        let outcomes = dispatcher
            .dispatch(&messenger, vec![item("a"), item("b")])
            .await
            .unwrap();

        assert!(outcomes[0].delivered);
        assert_eq!(outcomes[0].attempts, 2);
        assert!(!outcomes[1].delivered);
        assert_eq!(outcomes[1].attempts, 1);
    }

    #[test]
    fn test_parallel_dispatch_keeps_input_order() {
        let messenger = ScriptedMessenger::configured()
            .fail_on("for c", vec![DeliveryError::transport("connection reset")]);
        let items: Vec<DispatchItem> = ["a", "b", "c", "d", "e"].iter().map(|id| item(id)).collect();

        let outcomes = tokio_test::block_on(Dispatcher::new(RetryPolicy::None, 4).dispatch(&messenger, items))
            .unwrap();

        let ids: Vec<&str> = outcomes.iter().map(|o| o.customer_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(outcomes.iter().filter(|o| !o.delivered).count(), 1);
        assert_eq!(outcomes[2].status, None);
    }

    #[tokio::test]
    async fn test_empty_batch_is_ok() {
        let messenger = ScriptedMessenger::configured();
        let outcomes = Dispatcher::default().dispatch(&messenger, Vec::new()).await.unwrap();
        assert!(outcomes.is_empty());
    }
}
