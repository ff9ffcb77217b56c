//! Core data model: risk buckets, guard levels, decisions, findings and the
//! records appended to the session ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Risk bucket assigned to a single analyzed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Session risk-score weight for a command at this level.
    pub fn weight(self) -> u64 {
        match self {
            RiskLevel::Critical => 100,
            RiskLevel::High => 50,
            RiskLevel::Medium => 10,
            RiskLevel::Low => 0,
        }
    }

    /// Whether a command at this level counts as a session violation.
    pub fn is_violation(self) -> bool {
        matches!(self, RiskLevel::High | RiskLevel::Critical)
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
            RiskLevel::Critical => write!(f, "critical"),
        }
    }
}

/// Guard aggressiveness level. Ordering is significant: `Off` is the most
/// permissive, `Paranoid` the least.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardLevel {
    Off,
    Low,
    Medium,
    High,
    Paranoid,
}

impl std::str::FromStr for GuardLevel {
    type Err = crate::GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(GuardLevel::Off),
            "low" => Ok(GuardLevel::Low),
            "medium" => Ok(GuardLevel::Medium),
            "high" => Ok(GuardLevel::High),
            "paranoid" => Ok(GuardLevel::Paranoid),
            other => Err(crate::GuardError::UnknownGuardLevel(other.to_string())),
        }
    }
}

impl std::fmt::Display for GuardLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardLevel::Off => write!(f, "off"),
            GuardLevel::Low => write!(f, "low"),
            GuardLevel::Medium => write!(f, "medium"),
            GuardLevel::High => write!(f, "high"),
            GuardLevel::Paranoid => write!(f, "paranoid"),
        }
    }
}

/// Outcome of the guard decision table for one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    AllowHost,
    AllowSandbox,
    RequireApproval,
    Block,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::AllowHost => write!(f, "allow_host"),
            Decision::AllowSandbox => write!(f, "allow_sandbox"),
            Decision::RequireApproval => write!(f, "require_approval"),
            Decision::Block => write!(f, "block"),
        }
    }
}

/// Classification produced by the command analyzer. Pure data; the caller
/// decides what to do with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub risk_level: RiskLevel,
    pub reasons: Vec<String>,
    pub matched_rules: Vec<String>,
}

impl Classification {
    pub fn low() -> Self {
        Classification {
            risk_level: RiskLevel::Low,
            reasons: Vec::new(),
            matched_rules: Vec::new(),
        }
    }

    /// Record a match, raising the level if the new tier is higher.
    pub fn record(&mut self, level: RiskLevel, rule: &str, reason: impl Into<String>) {
        if level > self.risk_level {
            self.risk_level = level;
        }
        self.matched_rules.push(rule.to_string());
        self.reasons.push(reason.into());
    }
}

/// Finding severity. Separate from [`RiskLevel`] because findings and
/// commands are ranked by different pipelines even though the buckets match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Scanner language / rule family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Go,
    Python,
    C,
    Config,
    Secret,
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Language::Go => write!(f, "go"),
            Language::Python => write!(f, "python"),
            Language::C => write!(f, "c"),
            Language::Config => write!(f, "config"),
            Language::Secret => write!(f, "secret"),
        }
    }
}

/// One structured scanner observation. The `code` string is part of the
/// external contract consumed by CI; renaming a code is a breaking change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub file: String,
    /// 1-based line number.
    pub line: usize,
    pub language: Language,
    pub severity: Severity,
    pub code: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

/// A secret finding carries the captured substring (not necessarily the full
/// line), the detector id and the measured entropy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretFinding {
    #[serde(flatten)]
    pub finding: Finding,
    #[serde(rename = "match")]
    pub matched: String,
    pub pattern_id: String,
    pub entropy: f64,
}

/// Where a command actually ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecMode {
    Host,
    Sandbox,
}

impl std::fmt::Display for ExecMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecMode::Host => write!(f, "host"),
            ExecMode::Sandbox => write!(f, "sandbox"),
        }
    }
}

/// Final result of the execution pipeline. A sum type, not an error:
/// blocked commands and sandbox setup failures are expected outcomes.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecOutcome {
    /// The command ran; carries its exit code.
    Allowed(i32),
    /// The command was refused; carries the matched reasons.
    Blocked(Vec<String>),
    /// The selected runtime could not establish isolation.
    SandboxFailed { step: String, detail: String },
}

/// Immutable per-command record appended to the session ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRecord {
    pub command_text: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub effective_level: GuardLevel,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub reasons: Vec<String>,
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub exit_code: i32,
    #[serde(default)]
    pub findings_refs: Vec<String>,
}

/// Kind of a recorded filesystem operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOp {
    Create,
    Modify,
    Delete,
    Read,
}

/// Per-file-operation record appended to the session ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileOperation {
    pub timestamp: DateTime<Utc>,
    pub operation: FileOp,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub risk_level: RiskLevel,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
