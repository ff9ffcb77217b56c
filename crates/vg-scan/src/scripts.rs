//! Agent-script validation: a thin adapter that reuses the command analyzer
//! over `.sh` and `.py` files.

use crate::walk;
use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::Path;
use vg_core::{CancelToken, RiskLevel};
use vg_config::AnalyzerConfig;
use vg_guard::{CommandAnalyzer, DetectionContext};

/// Per-line classification of a command found inside a script.
#[derive(Debug, Clone)]
pub struct ScriptFinding {
    pub file: String,
    pub line: usize,
    pub command: String,
    pub risk_level: RiskLevel,
    pub reasons: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ScriptOutcome {
    pub findings: Vec<ScriptFinding>,
    pub warnings: Vec<String>,
    pub cancelled: bool,
}

pub struct ScriptValidator {
    analyzer: CommandAnalyzer,
    py_shell: Regex,
}

impl ScriptValidator {
    pub fn new() -> Result<Self> {
        Ok(ScriptValidator {
            analyzer: CommandAnalyzer::new()?,
            py_shell: Regex::new(
                r#"(?:os\.system|subprocess\.(?:run|call|check_call|check_output|Popen))\s*\(\s*["']([^"']+)["']"#,
            )
            .context("compile python shell-call pattern")?,
        })
    }

    /// Validate every `.sh`/`.py` file under `root`, reporting commands that
    /// classify above `low`.
    pub fn validate_tree(
        &self,
        root: &Path,
        policy: &AnalyzerConfig,
        ctx: &DetectionContext,
        cancel: &CancelToken,
    ) -> ScriptOutcome {
        let (files, walk_warnings) = walk::collect_files(root, cancel);
        let mut outcome = ScriptOutcome {
            warnings: walk_warnings,
            ..ScriptOutcome::default()
        };

        for path in files {
            if cancel.is_cancelled() {
                break;
            }
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase);
            match ext.as_deref() {
                Some("sh") => self.validate_shell(&path, policy, ctx, &mut outcome),
                Some("py") => self.validate_python(&path, policy, ctx, &mut outcome),
                _ => {}
            }
        }
        outcome.cancelled = cancel.is_cancelled();
        outcome
    }

    fn validate_shell(
        &self,
        path: &Path,
        policy: &AnalyzerConfig,
        ctx: &DetectionContext,
        outcome: &mut ScriptOutcome,
    ) {
        let Some(contents) = self.read(path, outcome) else {
            return;
        };
        for (index, line) in contents.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            self.classify(path, index + 1, trimmed, policy, ctx, outcome);
        }
    }

    fn validate_python(
        &self,
        path: &Path,
        policy: &AnalyzerConfig,
        ctx: &DetectionContext,
        outcome: &mut ScriptOutcome,
    ) {
        let Some(contents) = self.read(path, outcome) else {
            return;
        };
        for (index, line) in contents.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.starts_with('#') {
                continue;
            }
            for captures in self.py_shell.captures_iter(line) {
                if let Some(command) = captures.get(1) {
                    self.classify(path, index + 1, command.as_str(), policy, ctx, outcome);
                }
            }
        }
    }

    fn classify(
        &self,
        path: &Path,
        line: usize,
        command: &str,
        policy: &AnalyzerConfig,
        ctx: &DetectionContext,
        outcome: &mut ScriptOutcome,
    ) {
        let classification = self.analyzer.analyze(command, policy, ctx);
        if classification.risk_level > RiskLevel::Low {
            outcome.findings.push(ScriptFinding {
                file: path.display().to_string(),
                line,
                command: command.to_string(),
                risk_level: classification.risk_level,
                reasons: classification.reasons,
            });
        }
    }

    fn read(&self, path: &Path, outcome: &mut ScriptOutcome) -> Option<String> {
        match fs::read_to_string(path) {
            Ok(contents) => Some(contents),
            Err(e) => {
                outcome
                    .warnings
                    .push(format!("unreadable file {}: {e}", path.display()));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn validate(name: &str, contents: &str) -> ScriptOutcome {
        let td = tempdir().unwrap();
        fs::write(td.path().join(name), contents).unwrap();
        ScriptValidator::new().unwrap().validate_tree(
            td.path(),
            &AnalyzerConfig::default(),
            &DetectionContext::empty(),
            &CancelToken::new(),
        )
    }

    #[test]
    fn test_shell_script_destructive_line_flagged() {
        let outcome = validate("deploy.sh", "#!/bin/sh\necho starting\nrm -rf /\n");
        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].line, 3);
        assert_eq!(outcome.findings[0].risk_level, RiskLevel::Critical);
    }

    #[test]
    fn test_shell_comments_are_skipped() {
        let outcome = validate("x.sh", "# rm -rf /\necho fine\n");
        assert!(outcome.findings.is_empty());
    }

    #[test]
    fn test_python_shell_calls_are_extracted() {
        let outcome = validate(
            "tool.py",
            "import os\nos.system(\"sudo systemctl stop nginx\")\nsubprocess.run('git push --force')\n",
        );
        assert_eq!(outcome.findings.len(), 2);
        assert_eq!(outcome.findings[0].risk_level, RiskLevel::High);
    }

    #[test]
    fn test_benign_scripts_produce_nothing() {
        let outcome = validate("ok.sh", "echo hello\nls -la\n");
        assert!(outcome.findings.is_empty());
    }

    #[test]
    fn test_non_script_files_are_ignored() {
        let outcome = validate("notes.md", "rm -rf /\n");
        assert!(outcome.findings.is_empty());
    }
}
