use crate::domain::model::CustomerRecord;
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

/// 取得「現在」的來源，測試時可以固定
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 客戶資料來源；失敗時回傳 `SourceUnavailable`
#[async_trait]
pub trait RecordSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch_all(&self) -> Result<Vec<CustomerRecord>>;

    /// 連線檢查用的小量讀取，回傳讀到的筆數
    async fn sample(&self) -> Result<usize> {
        self.fetch_all().await.map(|records| records.len())
    }
}

/// 單筆投遞失敗的細節
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryError {
    pub status: Option<u16>,
    pub detail: String,
    pub retryable: bool,
}

impl DeliveryError {
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            detail: body.into(),
            retryable: status == 429 || status >= 500,
        }
    }

    pub fn transport(detail: impl Into<String>) -> Self {
        Self {
            status: None,
            detail: detail.into(),
            retryable: true,
        }
    }
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.detail),
            None => f.write_str(&self.detail),
        }
    }
}

impl std::error::Error for DeliveryError {}

#[async_trait]
pub trait Messenger: Send + Sync {
    /// 送出任何訊息之前檢查憑證；缺少時回傳 `MissingConfiguration`
    fn ensure_configured(&self) -> Result<()>;
    async fn send(&self, text: &str) -> std::result::Result<(), DeliveryError>;
}
