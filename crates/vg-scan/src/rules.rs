//! The code-scanner rule table.
//!
//! Rules are data, not subclasses: each entry carries its languages, a
//! compiled regex, a severity, the stable code string and an optional filter
//! closure for extra gating (e.g. the external-HTTP localhost check). Rule
//! codes are part of the external contract consumed by CI.

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use vg_core::{Language, Severity};

pub struct Rule {
    pub languages: &'static [Language],
    pub regex: Regex,
    pub severity: Severity,
    pub code: &'static str,
    pub description: &'static str,
    pub remediation: Option<&'static str>,
    /// Return `false` to suppress a textual match.
    pub filter: Option<fn(&Captures) -> bool>,
}

impl Rule {
    pub fn applies_to(&self, language: Language) -> bool {
        self.languages.contains(&language)
    }
}

/// Comment prefixes per language; lines whose trimmed start matches one are
/// skipped before any rule runs.
pub fn comment_prefixes(language: Language) -> &'static [&'static str] {
    match language {
        Language::Python | Language::Config => &["#"],
        Language::Go | Language::C => &["//", "/*"],
        Language::Secret => &[],
    }
}

/// Strip a trailing `:port` (and IPv6 brackets) from a captured host.
pub fn normalize_host(raw: &str) -> &str {
    let host = raw.trim_end_matches('/');
    if let Some(stripped) = host.strip_prefix('[') {
        return stripped.split(']').next().unwrap_or(stripped);
    }
    host.rsplit_once(':')
        .map(|(h, port)| {
            if port.chars().all(|c| c.is_ascii_digit()) {
                h
            } else {
                host
            }
        })
        .unwrap_or(host)
}

/// Local hosts the external-HTTP rules must never fire on.
pub fn is_local_host(host: &str) -> bool {
    host == "localhost" || host == "::1" || host.starts_with("127.")
}

fn external_host_filter(captures: &Captures) -> bool {
    captures
        .get(1)
        .map(|host| !is_local_host(normalize_host(host.as_str())))
        .unwrap_or(false)
}

const GO: &[Language] = &[Language::Go];
const PY: &[Language] = &[Language::Python];
const C: &[Language] = &[Language::C];
const CONF: &[Language] = &[Language::Config];
const ALL_CODE: &[Language] = &[Language::Go, Language::Python, Language::C, Language::Config];

const EXTERNAL_HTTP_PATTERN: &str = r#"https?://([^\s/"'<>`)\],]+)"#;

struct RuleSpec {
    languages: &'static [Language],
    pattern: &'static str,
    severity: Severity,
    code: &'static str,
    description: &'static str,
    remediation: Option<&'static str>,
    filter: Option<fn(&Captures) -> bool>,
}

const RULE_SPECS: &[RuleSpec] = &[
    // Go
    RuleSpec {
        languages: GO,
        pattern: r"exec\.Command\s*\(",
        severity: Severity::High,
        code: "GO_EXEC_COMMAND",
        description: "spawns an external process via exec.Command",
        remediation: Some("validate arguments and avoid shelling out where possible"),
        filter: None,
    },
    RuleSpec {
        languages: GO,
        pattern: r#"rm\s+-rf\s+/|curl[^"`]*\|\s*(?:ba)?sh"#,
        severity: Severity::Critical,
        code: "GO_DANGEROUS_SHELL",
        description: "embeds a destructive shell command",
        remediation: Some("remove the destructive shell invocation"),
        filter: None,
    },
    RuleSpec {
        languages: GO,
        pattern: r#""net/http"|http\.(?:Get|Post|Head|ListenAndServe|NewRequest)\s*\("#,
        severity: Severity::Medium,
        code: "GO_NET_HTTP",
        description: "uses net/http",
        remediation: None,
        filter: None,
    },
    RuleSpec {
        languages: GO,
        pattern: r"os\.(?:Getenv|LookupEnv|Environ)\s*\(",
        severity: Severity::Medium,
        code: "GO_ENV_READ",
        description: "reads process environment variables",
        remediation: None,
        filter: None,
    },
    RuleSpec {
        languages: GO,
        pattern: r#"(?:os\.Create|os\.WriteFile|os\.OpenFile|ioutil\.WriteFile)\s*\(\s*"(?:/etc|/var|/usr)"#,
        severity: Severity::High,
        code: "GO_SYSTEM_WRITE",
        description: "writes under a system directory",
        remediation: Some("write below the workspace instead of system paths"),
        filter: None,
    },
    RuleSpec {
        languages: GO,
        pattern: EXTERNAL_HTTP_PATTERN,
        severity: Severity::Medium,
        code: "GO_EXTERNAL_HTTP",
        description: "contacts an external HTTP endpoint",
        remediation: None,
        filter: Some(external_host_filter),
    },
    // Python
    RuleSpec {
        languages: PY,
        pattern: r"\beval\s*\(",
        severity: Severity::High,
        code: "PY_EVAL",
        description: "eval() executes arbitrary expressions",
        remediation: Some("use ast.literal_eval or explicit parsing"),
        filter: None,
    },
    RuleSpec {
        languages: PY,
        pattern: r"\bexec\s*\(",
        severity: Severity::High,
        code: "PY_EXEC",
        description: "exec() executes arbitrary code",
        remediation: Some("avoid dynamic code execution"),
        filter: None,
    },
    RuleSpec {
        languages: PY,
        pattern: r"subprocess\.\w+|os\.system\s*\(",
        severity: Severity::Medium,
        code: "PY_SUBPROCESS",
        description: "spawns a subprocess",
        remediation: None,
        filter: None,
    },
    RuleSpec {
        languages: PY,
        pattern: r"requests\.(?:get|post|put|delete|head|patch)\s*\(|urllib\.request|\burlopen\s*\(|httpx\.",
        severity: Severity::Medium,
        code: "PY_REMOTE_HTTP",
        description: "performs HTTP requests",
        remediation: None,
        filter: None,
    },
    RuleSpec {
        languages: PY,
        pattern: r"os\.environ|os\.getenv\s*\(",
        severity: Severity::Medium,
        code: "PY_ENV_ACCESS",
        description: "reads process environment variables",
        remediation: None,
        filter: None,
    },
    RuleSpec {
        languages: PY,
        pattern: EXTERNAL_HTTP_PATTERN,
        severity: Severity::Medium,
        code: "PY_EXTERNAL_HTTP",
        description: "contacts an external HTTP endpoint",
        remediation: None,
        filter: Some(external_host_filter),
    },
    // C
    RuleSpec {
        languages: C,
        pattern: r"\b(?:system|popen|execl|execlp|execle|execv|execvp|execve)\s*\(",
        severity: Severity::High,
        code: "C_SHELL_EXEC",
        description: "executes a shell or external program",
        remediation: Some("validate inputs before exec; prefer posix_spawn with fixed argv"),
        filter: None,
    },
    RuleSpec {
        languages: C,
        pattern: r"\bgets\s*\(",
        severity: Severity::Critical,
        code: "C_GETS",
        description: "gets() has no bounds checking",
        remediation: Some("use fgets with an explicit buffer size"),
        filter: None,
    },
    RuleSpec {
        languages: C,
        pattern: r"\b(?:strcpy|strcat)\s*\(",
        severity: Severity::High,
        code: "C_UNSAFE_STRING",
        description: "unbounded string copy",
        remediation: Some("use strncpy/strlcpy with explicit sizes"),
        filter: None,
    },
    RuleSpec {
        languages: C,
        pattern: r"\bmemcpy\s*\(",
        severity: Severity::Medium,
        code: "C_MEMCPY",
        description: "raw memcpy; verify the length argument",
        remediation: None,
        filter: None,
    },
    RuleSpec {
        languages: C,
        pattern: r"\bSOCK_RAW\b",
        severity: Severity::Medium,
        code: "C_RAW_SOCKET",
        description: "opens a raw socket",
        remediation: None,
        filter: None,
    },
    // Cross-language
    RuleSpec {
        languages: ALL_CODE,
        pattern: r"\b0\.0\.0\.0\b",
        severity: Severity::Medium,
        code: "BIND_ALL_INTERFACES",
        description: "binds to every network interface",
        remediation: Some("bind to 127.0.0.1 unless external access is intended"),
        filter: None,
    },
    // Config
    RuleSpec {
        languages: CONF,
        pattern: r#"(?i)trust[-_]?proxy["']?\s*[:=]\s*["']?(?:true|1|localhost)"#,
        severity: Severity::Medium,
        code: "LOCALHOST_TRUST_PROXY",
        description: "trusts proxy headers from localhost",
        remediation: None,
        filter: None,
    },
    RuleSpec {
        languages: CONF,
        pattern: r#"(?i)\b(?:auth|secure|authentication)["']?\s*[:=]\s*["']?(?:false|0|off|no|disabled)\b"#,
        severity: Severity::High,
        code: "UNAUTHENTICATED_ACCESS",
        description: "authentication is disabled",
        remediation: Some("require authentication for every deployment profile"),
        filter: None,
    },
];

/// Compile the full rule table once.
pub fn rule_table() -> Result<Vec<Rule>> {
    RULE_SPECS
        .iter()
        .map(|spec| {
            Ok(Rule {
                languages: spec.languages,
                regex: Regex::new(spec.pattern)
                    .with_context(|| format!("compile rule {}", spec.code))?,
                severity: spec.severity,
                code: spec.code,
                description: spec.description,
                remediation: spec.remediation,
                filter: spec.filter,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_table_compiles() {
        let rules = rule_table().unwrap();
        assert!(rules.len() >= 20);
    }

    #[test]
    fn test_rule_codes_are_unique() {
        let rules = rule_table().unwrap();
        let mut codes: Vec<_> = rules.iter().map(|r| r.code).collect();
        codes.sort_unstable();
        let before = codes.len();
        codes.dedup();
        assert_eq!(codes.len(), before);
    }

    #[test]
    fn test_normalize_host_strips_ports_and_brackets() {
        assert_eq!(normalize_host("example.com:8080"), "example.com");
        assert_eq!(normalize_host("example.com"), "example.com");
        assert_eq!(normalize_host("[::1]:3000"), "::1");
        assert_eq!(normalize_host("[::1]"), "::1");
    }

    #[test]
    fn test_local_hosts() {
        for host in ["localhost", "127.0.0.1", "127.1.2.3", "::1"] {
            assert!(is_local_host(host), "{host} should be local");
        }
        assert!(!is_local_host("example.com"));
        assert!(!is_local_host("10.0.0.1"));
    }

    #[test]
    fn test_comment_prefixes() {
        assert_eq!(comment_prefixes(Language::Python), &["#"]);
        assert!(comment_prefixes(Language::Go).contains(&"//"));
    }
}
