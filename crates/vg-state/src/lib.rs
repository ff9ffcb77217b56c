//! Durable, per-user state for Vectra Guard.
//!
//! Every file lives under the state directory described by
//! [`vg_core::Paths`] and is replaced atomically (write temp + rename).
//! Single-writer-per-session within a process; concurrent processes
//! synchronize only through the filesystem rename.

pub mod diff;
pub mod index;
pub mod lockdown;
pub mod metrics;
pub mod session;
pub mod softdelete;
pub mod trust;

pub use diff::{SessionDiff, summarize_file_ops};
pub use index::WorkspaceIndex;
pub use lockdown::{Lockdown, LockdownState};
pub use metrics::{ExecutionRecord, MetricsCollector, MetricsData};
pub use session::{Session, SessionStore};
pub use softdelete::{BackupEntry, BackupMeta, BackupStats, SoftDeleteManager};
pub use trust::{TrustEntry, TrustStore};
