//! The per-language code scanner: file walk → comment strip → rule table.

use crate::rules::{self, Rule};
use crate::walk;
use anyhow::Result;
use rayon::prelude::*;
use std::fs;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use vg_core::{CancelToken, Finding, Language};

/// Result of one scan. Warnings never abort; `cancelled` marks a partial
/// result cut short by the caller's token.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub findings: Vec<Finding>,
    pub warnings: Vec<String>,
    pub cancelled: bool,
}

impl ScanOutcome {
    pub fn has_findings(&self) -> bool {
        !self.findings.is_empty()
    }
}

pub struct CodeScanner {
    rules: Vec<Rule>,
}

impl CodeScanner {
    pub fn new() -> Result<Self> {
        Ok(CodeScanner {
            rules: rules::rule_table()?,
        })
    }

    /// Map a file to the rule family that applies to it.
    pub fn language_for(path: &Path) -> Option<Language> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "go" => Some(Language::Go),
            "py" => Some(Language::Python),
            "c" | "h" | "cc" | "cpp" | "hpp" => Some(Language::C),
            "yaml" | "yml" | "json" => Some(Language::Config),
            _ => None,
        }
    }

    /// Walk a tree and scan every recognized file. Files run in parallel on
    /// the worker pool; each file is independent.
    pub fn scan_path(&self, root: &Path, cancel: &CancelToken) -> ScanOutcome {
        let (files, walk_warnings) = walk::collect_files(root, cancel);
        let mut outcome = ScanOutcome {
            warnings: walk_warnings,
            ..ScanOutcome::default()
        };

        let per_file: Vec<(Vec<Finding>, Vec<String>)> = files
            .par_iter()
            .map(|path| {
                if cancel.is_cancelled() {
                    return (Vec::new(), Vec::new());
                }
                // A panicking rule must not take down the whole scan.
                match catch_unwind(AssertUnwindSafe(|| self.scan_file(path))) {
                    Ok(result) => result,
                    Err(_) => (
                        Vec::new(),
                        vec![format!("scanner panicked on {}", path.display())],
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

    /// Scan one file. Read errors are absorbed into warnings.
    pub fn scan_file(&self, path: &Path) -> (Vec<Finding>, Vec<String>) {
        let Some(language) = Self::language_for(path) else {
            return (Vec::new(), Vec::new());
        };
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
            self.scan_line(path, language, index + 1, line, &mut findings);
        }
        (findings, Vec::new())
    }

    fn scan_line(
        &self,
        path: &Path,
        language: Language,
        line_number: usize,
        line: &str,
        findings: &mut Vec<Finding>,
    ) {
        let trimmed = line.trim_start();
        // Contract: comment-only noise never produces findings.
        if rules::comment_prefixes(language)
            .iter()
            .any(|prefix| trimmed.starts_with(prefix))
        {
            return;
        }

        for rule in self.rules.iter().filter(|r| r.applies_to(language)) {
            // Rules produce zero or more findings per line: every occurrence
            // that survives the rule's filter is reported.
            for captures in rule.regex.captures_iter(line) {
                if let Some(filter) = rule.filter {
                    if !filter(&captures) {
                        continue;
                    }
                }
                findings.push(Finding {
                    file: path.display().to_string(),
                    line: line_number,
                    language,
                    severity: rule.severity,
                    code: rule.code.to_string(),
                    description: rule.description.to_string(),
                    remediation: rule.remediation.map(str::to_string),
                });
            }
        }
    }
}

#[cfg(test)]
#[path = "code_tests.rs"]
mod tests;
