//! Environment protector: masks sensitive values in env maps and in
//! `NAME=value` command output.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use vg_config::MaskMode;

/// Built-in substrings that mark a variable name as sensitive.
pub const SENSITIVE_NAME_PATTERNS: &[&str] = &[
    "PASSWORD",
    "SECRET",
    "KEY",
    "TOKEN",
    "API_KEY",
    "AWS_SECRET",
    "AWS_ACCESS_KEY",
    "GITHUB_TOKEN",
    "SSH_KEY",
    "DB_PASSWORD",
    "DATABASE_URL",
    "PRIVATE_KEY",
    "AUTH_TOKEN",
    "CREDENTIALS",
    "CERT",
    "APIKEY",
    "ACCESS_KEY",
    "SESSION",
];

/// Names always allowed through unmasked.
pub const READ_ALLOW: &[&str] = &[
    "HOME", "USER", "PATH", "SHELL", "TERM", "LANG", "PWD", "TMPDIR", "EDITOR", "PAGER",
];

/// Sensitivity check against only the built-in pattern list (used by the
/// analyzer, which has no protector instance).
pub fn is_sensitive_name_builtin(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    if READ_ALLOW.contains(&upper.as_str()) {
        return false;
    }
    SENSITIVE_NAME_PATTERNS.iter().any(|p| upper.contains(p))
}

pub struct EnvProtector {
    mode: MaskMode,
    extra_sensitive: HashSet<String>,
    assignment: Regex,
}

impl EnvProtector {
    pub fn new(mode: MaskMode, extra_sensitive: &[String]) -> anyhow::Result<Self> {
        Ok(EnvProtector {
            mode,
            extra_sensitive: extra_sensitive
                .iter()
                .map(|s| s.to_ascii_uppercase())
                .collect(),
            assignment: Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)=(.*)$")
                .map_err(anyhow::Error::from)?,
        })
    }

    pub fn is_sensitive(&self, name: &str) -> bool {
        let upper = name.to_ascii_uppercase();
        if READ_ALLOW.contains(&upper.as_str()) {
            return false;
        }
        self.extra_sensitive.contains(&upper) || is_sensitive_name_builtin(name)
    }

    /// Mask one value according to the configured mode.
    pub fn mask_value(&self, name: &str, value: &str) -> String {
        match self.mode {
            MaskMode::Full => "********".to_string(),
            MaskMode::Partial => partial_mask(value),
            MaskMode::Hash => {
                let digest = Sha256::digest(value.as_bytes());
                format!("sha256:{}...", &hex::encode(digest)[..16])
            }
            MaskMode::Fake => fake_value(name),
        }
    }

    /// Sanitized copy of an environment map.
    pub fn sanitize_env(&self, env: &HashMap<String, String>) -> HashMap<String, String> {
        env.iter()
            .map(|(name, value)| {
                if self.is_sensitive(name) {
                    (name.clone(), self.mask_value(name, value))
                } else {
                    (name.clone(), value.clone())
                }
            })
            .collect()
    }

    /// Line-oriented sanitizer for `NAME=value` text (e.g. `env` output).
    pub fn sanitize_output(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for (i, line) in text.lines().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            if let Some(captures) = self.assignment.captures(line) {
                let name = &captures[1];
                if self.is_sensitive(name) {
                    out.push_str(name);
                    out.push('=');
                    out.push_str(&self.mask_value(name, &captures[2]));
                    continue;
                }
            }
            out.push_str(line);
        }
        if text.ends_with('\n') {
            out.push('\n');
        }
        out
    }
}

fn partial_mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let n = chars.len();
    if n <= 6 {
        return "***".to_string();
    }
    if n < 12 {
        let head: String = chars[..2].iter().collect();
        let tail: String = chars[n - 2..].iter().collect();
        return format!("{head}...{tail}");
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[n - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Deterministic fake value keyed by the name's inferred kind. The same name
/// always produces the same fake so diffs stay stable.
fn fake_value(name: &str) -> String {
    let digest = Sha256::digest(name.as_bytes());
    let tag = &hex::encode(digest)[..8];
    let upper = name.to_ascii_uppercase();
    if upper.contains("URL") {
        format!("https://fake-{tag}.invalid/service")
    } else if upper.contains("EMAIL") || upper.contains("MAIL") {
        format!("user-{tag}@example.invalid")
    } else if upper.contains("PORT") {
        "8080".to_string()
    } else if upper.contains("PASSWORD") {
        format!("fake-password-{tag}")
    } else if upper.contains("TOKEN") || upper.contains("KEY") {
        format!("fake-token-{tag}")
    } else {
        format!("fake-value-{tag}")
    }
}
