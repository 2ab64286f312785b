use std::time::Duration;

/// 單筆投遞的重試策略；每次重試都留在該筆的隔離範圍內
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    #[default]
    None,
    Fixed {
        attempts: u32,
        delay: Duration,
    },
    Backoff {
        attempts: u32,
        base: Duration,
        max: Duration,
    },
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        match self {
            RetryPolicy::None => 1,
            RetryPolicy::Fixed { attempts, .. } | RetryPolicy::Backoff { attempts, .. } => {
                (*attempts).max(1)
            }
        }
    }

    /// 第 `attempt` 次（從 1 起算）失敗後，下一次嘗試前要等待多久；
    /// `None` 表示不再重試。
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts() {
            return None;
        }

        match self {
            RetryPolicy::None => None,
            RetryPolicy::Fixed { delay, .. } => Some(*delay),
            RetryPolicy::Backoff { base, max, .. } => {
                let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
                Some(base.saturating_mul(factor).min(*max))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_never_retries() {
        let policy = RetryPolicy::None;
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.delay_after(1), None);
    }

    #[test]
    fn test_fixed_delay() {
        let policy = RetryPolicy::Fixed {
            attempts: 3,
            delay: Duration::from_millis(250),
        };
        assert_eq!(policy.delay_after(1), Some(Duration::from_millis(250)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_millis(250)));
        assert_eq!(policy.delay_after(3), None);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::Backoff {
            attempts: 5,
            base: Duration::from_millis(100),
            max: Duration::from_millis(300),
        };
        assert_eq!(policy.delay_after(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay_after(3), Some(Duration::from_millis(300)));
        assert_eq!(policy.delay_after(4), Some(Duration::from_millis(300)));
        assert_eq!(policy.delay_after(5), None);
    }

    #[test]
    fn test_zero_attempts_still_sends_once() {
        let policy = RetryPolicy::Fixed {
            attempts: 0,
            delay: Duration::from_millis(10),
        };
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.delay_after(1), None);
    }
}
