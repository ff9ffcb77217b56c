//! Static scanning: a shared file walk feeding per-language lexical rules,
//! a secret detector and the agent-script validator. Scanners never abort on
//! a single unreadable file; problems surface as warnings on the outcome.

pub mod code;
pub mod report;
pub mod rules;
pub mod scripts;
pub mod secrets;
pub mod walk;

pub use code::{CodeScanner, ScanOutcome};
pub use report::AuditReport;
pub use scripts::{ScriptFinding, ScriptValidator};
pub use secrets::{SecretOutcome, SecretScanner};
