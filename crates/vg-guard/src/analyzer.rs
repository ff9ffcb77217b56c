//! Command risk classification.
//!
//! A pure lexical pass over a single command string. Rules are evaluated
//! critical → high → medium; the first match within a tier wins that tier's
//! contribution and the highest matched tier sets the risk level. The
//! configured denylist/allowlist is applied as an overlay afterwards and can
//! never override a critical match.

use crate::context::{DetectionContext, OsFlavor};
use crate::envprotect;
use anyhow::{Context, Result};
use regex::Regex;
use vg_core::{Classification, RiskLevel};
use vg_config::AnalyzerConfig;

/// Directories whose modification is always critical, by OS flavor.
fn critical_prefixes(os: OsFlavor) -> &'static [&'static str] {
    match os {
        OsFlavor::Unix => &[
            "/bin", "/sbin", "/boot", "/dev", "/proc", "/sys", "/lib", "/lib64",
        ],
        OsFlavor::Macos => &[
            "/bin", "/sbin", "/boot", "/dev", "/proc", "/sys", "/lib", "/lib64", "/System",
            "/Library", "/private",
        ],
        OsFlavor::Wsl => &[
            "/bin",
            "/sbin",
            "/boot",
            "/dev",
            "/proc",
            "/sys",
            "/lib",
            "/lib64",
            "/mnt/c/Windows",
            "/mnt/c/Program Files",
            "/mnt/c/Program Files (x86)",
        ],
    }
}

/// System directories whose modification is high (not critical) risk.
const SYSTEM_WRITE_PREFIXES: &[&str] = &["/etc", "/var", "/usr"];

/// Verbs that modify their path arguments.
const WRITE_VERBS: &[&str] = &[
    "rm", "mv", "cp", "tee", "dd", "truncate", "chmod", "chown", "ln", "touch", "mkdir", "rmdir",
    "install",
];

/// Verbs that read file contents.
const READ_VERBS: &[&str] = &[
    "cat", "less", "more", "head", "tail", "grep", "cut", "awk", "sed", "source", ".",
];

/// A parsed `rm` invocation (also consumed by the soft-delete manager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RmInvocation {
    pub recursive: bool,
    pub force: bool,
    pub targets: Vec<String>,
}

/// Parse a command as `rm` (optionally behind `sudo`). Returns `None` when
/// the command is not an rm at all.
pub fn parse_rm(command: &str) -> Option<RmInvocation> {
    let mut tokens = command.split_whitespace().peekable();
    let mut first = tokens.next()?;
    if first == "sudo" {
        first = tokens.next()?;
    }
    if first != "rm" {
        return None;
    }

    let mut invocation = RmInvocation {
        recursive: false,
        force: false,
        targets: Vec::new(),
    };
    for token in tokens {
        match token {
            "--recursive" => invocation.recursive = true,
            "--force" => invocation.force = true,
            "--" => continue,
            _ if token.starts_with('-') && token.len() > 1 && !token.starts_with("--") => {
                invocation.recursive |= token.contains('r') || token.contains('R');
                invocation.force |= token.contains('f');
            }
            _ => invocation.targets.push(token.to_string()),
        }
    }
    Some(invocation)
}

pub struct CommandAnalyzer {
    curl_pipe_shell: Regex,
    git_force_push: Regex,
    git_history_rewrite: Regex,
    sql_drop: Regex,
    sql_unconditional: Regex,
    network_installer: Regex,
    env_var_ref: Regex,
}

impl CommandAnalyzer {
    pub fn new() -> Result<Self> {
        Ok(CommandAnalyzer {
            curl_pipe_shell: Regex::new(r"(?i)\b(?:curl|wget)\b[^|;&]*\|\s*(?:sudo\s+)?(?:ba|z|da)?sh\b")
                .context("compile curl-pipe-shell pattern")?,
            git_force_push: Regex::new(r"\bgit\s+push\b.*(?:\s--force(?:-with-lease)?\b|\s-f\b|\s\+\S+:\S+)")
                .context("compile git-force-push pattern")?,
            git_history_rewrite: Regex::new(
                r"\bgit\s+(?:rebase|filter-branch|filter-repo|reset\s+--hard)\b",
            )
            .context("compile git-history-rewrite pattern")?,
            sql_drop: Regex::new(r"(?i)\b(?:DROP\s+(?:TABLE|DATABASE|SCHEMA|INDEX)|TRUNCATE(?:\s+TABLE)?\s+\S+)")
                .context("compile sql-drop pattern")?,
            sql_unconditional: Regex::new(r"(?i)\b(?:DELETE\s+FROM\s+\S+|UPDATE\s+\S+\s+SET\b)")
                .context("compile sql-unconditional pattern")?,
            network_installer: Regex::new(
                r"\b(?:pip3?\s+install|npm\s+install|yarn\s+add|pnpm\s+add|cargo\s+install|gem\s+install|go\s+install|apt(?:-get)?\s+install|brew\s+install)\b",
            )
            .context("compile network-installer pattern")?,
            env_var_ref: Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?")
                .context("compile env-var-reference pattern")?,
        })
    }

    /// Classify one command. Pure: the only inputs are the command text, the
    /// policy and the pre-assembled detection context.
    pub fn analyze(
        &self,
        command: &str,
        policy: &AnalyzerConfig,
        ctx: &DetectionContext,
    ) -> Classification {
        let mut classification = Classification::low();
        let tokens: Vec<&str> = command.split_whitespace().collect();

        if let Some((rule, reason)) = self.critical_match(command, &tokens, ctx) {
            classification.record(RiskLevel::Critical, rule, reason);
        }
        if let Some((rule, reason)) = self.high_match(command, &tokens, policy) {
            classification.record(RiskLevel::High, rule, reason);
        }
        if let Some((rule, reason)) = self.medium_match(command, &tokens, policy) {
            classification.record(RiskLevel::Medium, rule, reason);
        }

        // Denylist promotes to at least high; allowlist demotes to low.
        // Critical matches are never overridden by either.
        for pattern in &policy.denylist {
            if !pattern.is_empty() && command.contains(pattern.as_str()) {
                classification.record(
                    RiskLevel::High,
                    "DENYLIST",
                    format!("matches denylist entry '{pattern}'"),
                );
                break;
            }
        }
        if classification.risk_level != RiskLevel::Critical {
            for pattern in &policy.allowlist {
                if !pattern.is_empty() && command.contains(pattern.as_str()) {
                    classification.risk_level = RiskLevel::Low;
                    classification.matched_rules.push("ALLOWLIST".to_string());
                    classification
                        .reasons
                        .push(format!("matches allowlist entry '{pattern}'"));
                    break;
                }
            }
        }

        classification
    }

    fn critical_match(
        &self,
        command: &str,
        tokens: &[&str],
        ctx: &DetectionContext,
    ) -> Option<(&'static str, String)> {
        if let Some(rm) = parse_rm(command) {
            if rm.recursive && rm.force {
                for target in &rm.targets {
                    if matches!(target.as_str(), "/" | "/*" | "~" | "$HOME" | "${HOME}") {
                        return Some((
                            "RM_DESTRUCTIVE",
                            format!("recursive force rm targets '{target}'"),
                        ));
                    }
                }
            }
            if let Some(target) = rm
                .targets
                .iter()
                .find(|t| path_has_prefix(t, critical_prefixes(ctx.os)))
            {
                return Some((
                    "PROTECTED_PATH_WRITE",
                    format!("rm targets protected path '{target}'"),
                ));
            }
        }

        let compact: String = command.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.contains(":(){:|:&};:") {
            return Some(("FORK_BOMB", "fork bomb".to_string()));
        }

        if command_token(tokens)
            .map(|t| t.starts_with("mkfs"))
            .unwrap_or(false)
        {
            return Some(("MKFS", "filesystem creation destroys existing data".to_string()));
        }

        if command.contains("dd if=") {
            return Some(("DD_RAW_COPY", "raw dd copy can clobber devices".to_string()));
        }

        if self.curl_pipe_shell.is_match(command) {
            return Some((
                "CURL_PIPE_SHELL",
                "downloads and executes a remote script".to_string(),
            ));
        }

        if has_write_indicator(command, tokens) {
            if let Some(path) = tokens
                .iter()
                .find(|t| path_has_prefix(t, critical_prefixes(ctx.os)))
            {
                return Some((
                    "PROTECTED_PATH_WRITE",
                    format!("write targets protected path '{path}'"),
                ));
            }
        }

        None
    }

    fn high_match(
        &self,
        command: &str,
        tokens: &[&str],
        policy: &AnalyzerConfig,
    ) -> Option<(&'static str, String)> {
        if tokens.iter().any(|t| *t == "sudo") {
            return Some(("SUDO", "privilege escalation via sudo".to_string()));
        }

        if policy.block_force_git && self.git_force_push.is_match(command) {
            return Some(("GIT_FORCE_PUSH", "force push rewrites remote history".to_string()));
        }

        if policy.only_destructive_sql {
            if self.sql_drop.is_match(command) {
                return Some(("SQL_DESTRUCTIVE", "destructive SQL statement".to_string()));
            }
            if self.sql_unconditional.is_match(command)
                && !command.to_ascii_lowercase().contains("where")
            {
                return Some((
                    "SQL_DESTRUCTIVE",
                    "unconditional DELETE/UPDATE affects every row".to_string(),
                ));
            }
        }

        if has_write_indicator(command, tokens) {
            if let Some(path) = tokens
                .iter()
                .find(|t| path_has_prefix(t, SYSTEM_WRITE_PREFIXES))
            {
                return Some((
                    "SYSTEM_DIR_WRITE",
                    format!("write under system directory '{path}'"),
                ));
            }
        }

        None
    }

    fn medium_match(
        &self,
        command: &str,
        tokens: &[&str],
        policy: &AnalyzerConfig,
    ) -> Option<(&'static str, String)> {
        if policy.protect_env_reads {
            let reads = tokens
                .first()
                .map(|t| READ_VERBS.contains(t) || *t == "printenv" || *t == "env" || *t == "echo")
                .unwrap_or(false);
            if reads && tokens.iter().any(|t| t.ends_with(".env") || *t == ".env") {
                return Some(("ENV_FILE_READ", "reads a .env file".to_string()));
            }
            for captures in self.env_var_ref.captures_iter(command) {
                if let Some(name) = captures.get(1) {
                    if envprotect::is_sensitive_name_builtin(name.as_str()) {
                        return Some((
                            "SENSITIVE_ENV_READ",
                            format!("references sensitive variable ${}", name.as_str()),
                        ));
                    }
                }
            }
        }

        if self.network_installer.is_match(command) {
            return Some((
                "NETWORK_INSTALLER",
                "installs packages from the network".to_string(),
            ));
        }

        if self.git_history_rewrite.is_match(command) && !self.git_force_push.is_match(command) {
            return Some((
                "GIT_HISTORY_REWRITE",
                "rewrites local git history".to_string(),
            ));
        }

        None
    }
}

/// First token, skipping a leading `sudo`.
fn command_token<'a>(tokens: &[&'a str]) -> Option<&'a str> {
    match tokens.first() {
        Some(&"sudo") => tokens.get(1).copied(),
        first => first.copied(),
    }
}

fn has_write_indicator(command: &str, tokens: &[&str]) -> bool {
    if command.contains('>') {
        return true;
    }
    tokens.iter().any(|t| WRITE_VERBS.contains(t))
}

fn path_has_prefix(token: &str, prefixes: &[&str]) -> bool {
    let token = token.trim_matches(|c| c == '"' || c == '\'');
    prefixes.iter().any(|prefix| {
        token == *prefix
            || token
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

#[cfg(test)]
#[path = "analyzer_tests.rs"]
mod tests;
