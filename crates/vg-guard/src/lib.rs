//! Pure decision logic: command classification, guard-level resolution and
//! environment masking. Nothing in this crate performs I/O at decision time;
//! the [`context::DetectionContext`] is assembled up front by the caller.

pub mod analyzer;
pub mod context;
pub mod envprotect;
pub mod level;

pub use analyzer::{CommandAnalyzer, RmInvocation, parse_rm};
pub use context::{DetectionContext, OsFlavor};
pub use envprotect::EnvProtector;
pub use level::{decide, resolve_effective};
