pub mod config;
pub mod dispatch;
pub mod error;
pub mod journal;
pub mod mime;
pub mod platform;
pub mod progress;
pub mod recycler;
pub mod relocate;
pub mod restore;
pub mod staging;

pub use config::AppConfig;
pub use dispatch::BatchReport;
pub use error::Error;
pub use journal::{Journal, JournalEntry, JournalLocks};
pub use platform::HostIdentity;
pub use progress::{RecycleReporter, SilentReporter};
pub use recycler::{RecycleOutcome, Recycler, SkipReason};
pub use restore::{RestoreReport, Restorer};
pub use staging::{DateBucket, StagingRoot};
