//! The sync engine.
//!
//! - `cycle`: one pass over all users (`SyncCycle`)
//! - `enrollments`: per-user subject/association diff
//! - `posts`: per-subject announcement diff and notification fan-out
//! - `recovery`: bounded resync on an inconsistent snapshot
//! - `scheduler`: interval driver with quiet hours and periodic resync
//! - `users`: registering and removing users

pub mod cycle;
pub mod enrollments;
pub mod posts;
pub mod recovery;
pub mod scheduler;
pub mod users;

pub use cycle::{CycleOutcome, SyncCycle};
pub use enrollments::{EnrollmentDiff, EnrollmentSync};
pub use posts::{PostDiff, PostSettings, PostSync};
pub use recovery::{RecoveryCallback, RecoveryController, RecoveryOutcome, StoreResync};
pub use scheduler::{QuietHours, Scheduler, TickOutcome};
pub use users::{register_user, unregister_user};
