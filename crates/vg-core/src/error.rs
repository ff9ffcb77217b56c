#[derive(thiserror::Error, Debug)]
pub enum GuardError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown guard level '{0}': expected off, low, medium, high, paranoid or auto")]
    UnknownGuardLevel(String),

    #[error("Command blocked: {}", .reasons.join("; "))]
    PolicyViolation { reasons: Vec<String> },

    #[error("Lockdown is enabled{}", .reason.as_deref().map(|r| format!(" ({r})")).unwrap_or_default())]
    LockdownEnabled { reason: Option<String> },

    #[error("sandbox setup failed: {step}: {detail}")]
    SandboxSetup { step: String, detail: String },

    #[error("No usable sandbox runtime available")]
    NoRuntime,

    #[error("Session '{0}' not found")]
    SessionNotFound(String),

    #[error("Backup '{0}' not found")]
    BackupNotFound(String),

    #[error("Ledger write failed: {0}")]
    Ledger(String),
}
