// Adapters layer: concrete implementations of the domain ports (record sources, messaging).

pub mod dry_run;
pub mod file_source;
pub mod firestore;
pub mod service_account;
pub mod telegram;

pub use dry_run::DryRunMessenger;
pub use file_source::JsonFileSource;
pub use firestore::{FirestoreAuth, FirestoreSettings, FirestoreSource};
pub use service_account::ServiceAccountKey;
pub use telegram::{TelegramMessenger, TelegramSettings};
