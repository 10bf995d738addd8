//! Backup engine for savesnap
//!
//! One run copies the local save directory into a new, timestamped snapshot
//! under the backup root and then prunes the oldest snapshots beyond the
//! retention cap.
//!
//! # Architecture
//!
//! - `SyncExecutor`: writes the new snapshot, retrying transient failures
//! - `retention`: decides which snapshots to delete and deletes them
//! - `run`: sequences the two phases and builds the `RunReport`
//!
//! # Severity
//!
//! A failed sync fails the run and skips retention entirely. Failed deletions
//! are only warnings: the run still succeeds if the snapshot was written.
//!
//! # Example
//!
//! ```rust,ignore
//! use savesnap::backup;
//! use savesnap::cancel::CancellationToken;
//! use savesnap::snapshot::SystemClock;
//! use savesnap::transport::LocalTransport;
//!
//! let report = backup::run(&config, &LocalTransport::new(), &SystemClock, &CancellationToken::new());
//! println!("{}", report.summary());
//! ```

mod orchestrator;
mod report;
pub mod retention;
mod sync;

pub use orchestrator::run;
pub use report::RunReport;
pub use retention::{DeletionFailure, RetentionPlan, RetentionPolicy, RetentionReport};
pub use sync::{RetryPolicy, SyncExecutor, SyncOutcome};
