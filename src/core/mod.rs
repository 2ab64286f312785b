pub mod clock;
pub mod dispatcher;
pub mod formatter;
pub mod matcher;
pub mod orchestrator;
pub mod retry;

pub use crate::domain::model::{CustomerRecord, MatchResult, TargetWindow, TimeFrame};
pub use crate::domain::ports::{Clock, Messenger, RecordSource};
pub use crate::utils::error::Result;
