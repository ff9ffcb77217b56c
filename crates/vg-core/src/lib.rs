//! Shared vocabulary for the Vectra Guard workspace: risk and guard levels,
//! findings, decisions, the typed error enum, the explicit [`Paths`] value,
//! atomic state-file replacement and cooperative cancellation.

pub mod advisory;
pub mod cancel;
pub mod error;
pub mod fsx;
pub mod paths;
pub mod types;

pub use cancel::CancelToken;
pub use error::GuardError;
pub use paths::Paths;
pub use types::{
    Classification, CommandRecord, Decision, ExecMode, ExecOutcome, FileOp, FileOperation,
    Finding, GuardLevel, Language, RiskLevel, SecretFinding, Severity,
};
