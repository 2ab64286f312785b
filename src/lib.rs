pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::NotifierConfig;
pub use core::orchestrator::{RunOrchestrator, RunSettings, RunState};
pub use domain::model::{CustomerRecord, NotificationOutcome, RunSummary, TimeFrame};
pub use utils::error::{NotifierError, Result};
