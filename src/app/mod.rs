pub mod check;

use crate::adapters::{DryRunMessenger, FirestoreSource, JsonFileSource, TelegramMessenger};
use crate::config::toml_config::{NotifierConfig, SourceKind};
use crate::core::orchestrator::RunOrchestrator;
use crate::domain::ports::{Clock, Messenger, RecordSource};
use crate::utils::error::{NotifierError, Result};

pub fn build_source(config: &NotifierConfig) -> Result<Box<dyn RecordSource>> {
    match config.source.kind {
        SourceKind::Firestore => Ok(Box::new(FirestoreSource::new(config.firestore_settings()?)?)),
        SourceKind::File => {
            let path = config
                .source
                .path
                .clone()
                .ok_or_else(|| NotifierError::config("source.path is required for the file source"))?;
            Ok(Box::new(JsonFileSource::new(path)))
        }
    }
}

pub fn build_messenger(config: &NotifierConfig, dry_run: bool) -> Result<Box<dyn Messenger>> {
    if dry_run {
        return Ok(Box::new(DryRunMessenger));
    }
    Ok(Box::new(TelegramMessenger::new(config.telegram_settings())?))
}

/// 組裝一次執行所需的元件；設定只在這裡讀取，之後以參數傳入
pub fn build_orchestrator(
    config: &NotifierConfig,
    clock: Box<dyn Clock>,
    dry_run: bool,
) -> Result<RunOrchestrator> {
    Ok(RunOrchestrator::new(
        build_source(config)?,
        build_messenger(config, dry_run)?,
        clock,
        config.run_settings()?,
    ))
}
