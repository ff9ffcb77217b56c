//! Secret detection: exact regex detectors plus a context-gated entropy
//! heuristic, over the shared file walk with an extra binary sniff.

use crate::walk;
use anyhow::{Context, Result};
use rayon::prelude::*;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::io::Read;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use vg_core::{CancelToken, Finding, Language, SecretFinding, Severity};
use vg_config::ScannerConfig;

/// Keywords that must appear on a line before the entropy heuristic runs.
const CONTEXT_KEYWORDS: &[&str] = &["token", "api_key", "secret", "password", "credential", "auth"];

const ENTROPY_THRESHOLD: f64 = 3.5;
const SNIFF_BYTES: usize = 8192;

#[derive(Debug, Default)]
pub struct SecretOutcome {
    pub findings: Vec<SecretFinding>,
    pub warnings: Vec<String>,
    pub cancelled: bool,
}

struct SecretRule {
    id: &'static str,
    regex: Regex,
    /// Capture group holding the secret value; 0 = whole match.
    value_group: usize,
    description: &'static str,
    remediation: &'static str,
}

pub struct SecretScanner {
    rules: Vec<SecretRule>,
    candidate: Regex,
    uuid: Regex,
    camel: Regex,
    allowlist: HashSet<String>,
    ignore_globs: Vec<glob::Pattern>,
    ignore_prefixes: Vec<String>,
}

impl SecretScanner {
    pub fn new(config: &ScannerConfig) -> Result<Self> {
        let mut ignore_globs = Vec::new();
        let mut ignore_prefixes = Vec::new();
        for pattern in &config.ignore_paths {
            if let Some(prefix) = pattern.strip_suffix('/') {
                ignore_prefixes.push(prefix.to_string());
            } else {
                ignore_globs.push(
                    glob::Pattern::new(pattern)
                        .with_context(|| format!("bad ignore pattern '{pattern}'"))?,
                );
            }
        }

        Ok(SecretScanner {
            rules: vec![
                SecretRule {
                    id: "AWS_ACCESS_KEY_ID",
                    regex: Regex::new(r"\bAKIA[0-9A-Z]{16}\b").context("compile AKIA pattern")?,
                    value_group: 0,
                    description: "AWS access key id",
                    remediation: "rotate the key and move it to a secret manager",
                },
                SecretRule {
                    id: "AWS_SECRET_ACCESS_KEY",
                    regex: Regex::new(
                        r#"(?i)aws_secret_access_key\s*[:=]\s*["']?([A-Za-z0-9/+=_-]{40})"#,
                    )
                    .context("compile AWS secret pattern")?,
                    value_group: 1,
                    description: "AWS secret access key",
                    remediation: "rotate the key and move it to a secret manager",
                },
                SecretRule {
                    id: "GENERIC_API_KEY",
                    regex: Regex::new(
                        r#"(?i)\b(?:api[_-]?key|token|secret)\b\s*[:=]\s*["']?([A-Za-z0-9_\-.=+/]{20,})"#,
                    )
                    .context("compile generic key pattern")?,
                    value_group: 1,
                    description: "hardcoded API credential",
                    remediation: "load the credential from the environment or a secret manager",
                },
                SecretRule {
                    id: "PRIVATE_KEY_BLOCK",
                    regex: Regex::new(r"-----BEGIN [A-Z ]*PRIVATE KEY-----")
                        .context("compile private key pattern")?,
                    value_group: 0,
                    description: "embedded private key",
                    remediation: "remove the key material and rotate it",
                },
            ],
            candidate: Regex::new(r"[A-Za-z0-9+/=_-]{20,}").context("compile candidate pattern")?,
            uuid: Regex::new(
                r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
            )
            .context("compile uuid pattern")?,
            camel: Regex::new(r"^[a-z]+(?:[A-Z][a-z]+)+$").context("compile camel pattern")?,
            allowlist: config.secret_allowlist.iter().cloned().collect(),
            ignore_globs,
            ignore_prefixes,
        })
    }

    fn is_ignored(&self, rel: &Path) -> bool {
        let rel_str = rel.to_string_lossy();
        if self
            .ignore_prefixes
            .iter()
            .any(|prefix| rel_str.starts_with(prefix.as_str()))
        {
            return true;
        }
        self.ignore_globs.iter().any(|g| g.matches_path(rel))
    }

    pub fn scan_path(&self, root: &Path, cancel: &CancelToken) -> SecretOutcome {
        let (files, walk_warnings) = walk::collect_files(root, cancel);
        let mut outcome = SecretOutcome {
            warnings: walk_warnings,
            ..SecretOutcome::default()
        };

        let per_file: Vec<(Vec<SecretFinding>, Vec<String>)> = files
            .par_iter()
            .map(|path| {
                if cancel.is_cancelled() {
                    return (Vec::new(), Vec::new());
                }
                let rel = path.strip_prefix(root).unwrap_or(path);
                if self.is_ignored(rel) {
                    return (Vec::new(), Vec::new());
                }
                match catch_unwind(AssertUnwindSafe(|| self.scan_file(path))) {
                    Ok(result) => result,
                    Err(_) => (
                        Vec::new(),
                        vec![format!("secret scanner panicked on {}", path.display())],
                    ),
                }
            })
            .collect();

        for (findings, warnings) in per_file {
            outcome.findings.extend(findings);
            outcome.warnings.extend(warnings);
        }
        outcome.cancelled = cancel.is_cancelled();
        outcome
    }

    pub fn scan_file(&self, path: &Path) -> (Vec<SecretFinding>, Vec<String>) {
        match probably_binary(path) {
            Ok(true) => return (Vec::new(), Vec::new()),
            Ok(false) => {}
            Err(e) => {
                return (
                    Vec::new(),
                    vec![format!("unreadable file {}: {e}", path.display())],
                );
            }
        }
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "skipping unreadable file");
                return (
                    Vec::new(),
                    vec![format!("unreadable file {}: {e}", path.display())],
                );
            }
        };

        let mut findings = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            self.scan_line(path, index + 1, line, &mut findings);
        }
        (findings, Vec::new())
    }

    fn scan_line(
        &self,
        path: &Path,
        line_number: usize,
        line: &str,
        findings: &mut Vec<SecretFinding>,
    ) {
        let mut matched_rule = false;
        for rule in &self.rules {
            if let Some(captures) = rule.regex.captures(line) {
                let value = captures
                    .get(rule.value_group)
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                if self.allowlist.contains(value) {
                    continue;
                }
                matched_rule = true;
                findings.push(self.finding(
                    path,
                    line_number,
                    rule.id,
                    rule.description,
                    Some(rule.remediation),
                    value,
                    shannon_entropy(value),
                ));
            }
        }

        // Entropy fallback: only when no detector fired and the line carries
        // a secret-flavored keyword.
        if matched_rule {
            return;
        }
        let lower = line.to_ascii_lowercase();
        if !CONTEXT_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            return;
        }
        for m in self.candidate.find_iter(line) {
            let candidate = m.as_str();
            if self.allowlist.contains(candidate) || !self.is_entropy_candidate(candidate) {
                continue;
            }
            let entropy = shannon_entropy(candidate);
            if entropy < ENTROPY_THRESHOLD {
                continue;
            }
            findings.push(self.finding(
                path,
                line_number,
                "ENTROPY_CANDIDATE",
                "high-entropy value next to a secret keyword",
                Some("confirm this is not a live credential"),
                candidate,
                entropy,
            ));
            break;
        }
    }

    fn is_entropy_candidate(&self, candidate: &str) -> bool {
        if candidate.contains('/') {
            return false;
        }
        if self.uuid.is_match(candidate) {
            return false;
        }
        let lower = candidate.to_ascii_lowercase();
        if lower.contains("com/") || lower.contains("org/") || lower.contains("http") {
            return false;
        }
        // Plain identifiers: snake_case, SCREAMING_CASE or camelCase.
        if candidate
            .chars()
            .all(|c| c.is_ascii_lowercase() || c == '_')
        {
            return false;
        }
        if candidate
            .chars()
            .all(|c| c.is_ascii_uppercase() || c == '_')
        {
            return false;
        }
        if self.camel.is_match(candidate) {
            return false;
        }
        true
    }

    #[allow(clippy::too_many_arguments)]
    fn finding(
        &self,
        path: &Path,
        line: usize,
        code: &str,
        description: &str,
        remediation: Option<&str>,
        matched: &str,
        entropy: f64,
    ) -> SecretFinding {
        let severity = if code == "ENTROPY_CANDIDATE" {
            Severity::Medium
        } else {
            Severity::Critical
        };
        SecretFinding {
            finding: Finding {
                file: path.display().to_string(),
                line,
                language: Language::Secret,
                severity,
                code: code.to_string(),
                description: description.to_string(),
                remediation: remediation.map(str::to_string),
            },
            matched: matched.to_string(),
            pattern_id: code.to_string(),
            entropy,
        }
    }
}

/// Sniff the head of a file for NUL bytes / invalid UTF-8.
fn probably_binary(path: &Path) -> std::io::Result<bool> {
    let mut head = vec![0u8; SNIFF_BYTES];
    let mut file = fs::File::open(path)?;
    let n = file.read(&mut head)?;
    head.truncate(n);
    Ok(walk::looks_binary(&head))
}

/// Shannon entropy in bits per character.
pub fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }
    let mut counts = std::collections::HashMap::new();
    for c in s.chars() {
        *counts.entry(c).or_insert(0u32) += 1;
    }
    let len = s.chars().count() as f64;
    counts
        .values()
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

#[cfg(test)]
#[path = "secrets_tests.rs"]
mod tests;
