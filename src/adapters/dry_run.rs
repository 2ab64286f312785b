use crate::domain::ports::{DeliveryError, Messenger};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 只寫日誌、不呼叫外部 API
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunMessenger;

#[async_trait]
impl Messenger for DryRunMessenger {
    fn ensure_configured(&self) -> Result<()> {
        Ok(())
    }

    async fn send(&self, text: &str) -> std::result::Result<(), DeliveryError> {
        tracing::info!("[dry-run] would send:\n{}", text);
        Ok(())
    }
}
