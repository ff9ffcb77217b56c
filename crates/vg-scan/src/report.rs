//! Stable output rendering: per-finding text lines and the audit JSON shape
//! consumed by CI.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vg_core::Finding;

/// `vg scan` text line. The shape is part of the external contract.
pub fn format_finding_line(finding: &Finding) -> String {
    format!(
        "[WARN] security finding file={} line={} language={} severity={} code={} description={}",
        finding.file,
        finding.line,
        finding.language,
        finding.severity,
        finding.code,
        finding.description
    )
}

/// `vg audit` text line: `<file>:<line>  <CODE>  <description>  → <remediation>`.
pub fn format_audit_line(finding: &Finding) -> String {
    match &finding.remediation {
        Some(remediation) => format!(
            "{}:{}  {}  {}  → {}",
            finding.file, finding.line, finding.code, finding.description, remediation
        ),
        None => format!(
            "{}:{}  {}  {}",
            finding.file, finding.line, finding.code, finding.description
        ),
    }
}

/// Aggregate audit output (stable JSON shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub path: String,
    pub code_findings: Vec<Finding>,
    pub code_by_severity: BTreeMap<String, usize>,
    pub secrets_total: usize,
    #[serde(default)]
    pub package_audits: Vec<serde_json::Value>,
}

impl AuditReport {
    pub fn new(path: &str, code_findings: Vec<Finding>, secrets_total: usize) -> Self {
        let mut code_by_severity = BTreeMap::new();
        for finding in &code_findings {
            *code_by_severity
                .entry(finding.severity.to_string())
                .or_insert(0) += 1;
        }
        AuditReport {
            path: path.to_string(),
            code_findings,
            code_by_severity,
            secrets_total,
            package_audits: Vec::new(),
        }
    }

    pub fn has_findings(&self) -> bool {
        !self.code_findings.is_empty() || self.secrets_total > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vg_core::{Language, Severity};

    fn finding(code: &str, severity: Severity, remediation: Option<&str>) -> Finding {
        Finding {
            file: "src/x.py".to_string(),
            line: 3,
            language: Language::Python,
            severity,
            code: code.to_string(),
            description: "eval() executes arbitrary expressions".to_string(),
            remediation: remediation.map(str::to_string),
        }
    }

    #[test]
    fn test_scan_line_shape() {
        let line = format_finding_line(&finding("PY_EVAL", Severity::High, None));
        assert_eq!(
            line,
            "[WARN] security finding file=src/x.py line=3 language=python severity=high code=PY_EVAL description=eval() executes arbitrary expressions"
        );
    }

    #[test]
    fn test_audit_line_with_remediation() {
        let line = format_audit_line(&finding("PY_EVAL", Severity::High, Some("use ast.literal_eval")));
        assert_eq!(
            line,
            "src/x.py:3  PY_EVAL  eval() executes arbitrary expressions  → use ast.literal_eval"
        );
    }

    #[test]
    fn test_audit_line_without_remediation() {
        let line = format_audit_line(&finding("PY_EVAL", Severity::High, None));
        assert!(!line.contains('→'));
    }

    #[test]
    fn test_report_counts_by_severity() {
        let report = AuditReport::new(
            ".",
            vec![
                finding("PY_EVAL", Severity::High, None),
                finding("PY_EXEC", Severity::High, None),
                finding("BIND_ALL_INTERFACES", Severity::Medium, None),
            ],
            2,
        );
        assert_eq!(report.code_by_severity["high"], 2);
        assert_eq!(report.code_by_severity["medium"], 1);
        assert_eq!(report.secrets_total, 2);
        assert!(report.has_findings());
    }

    #[test]
    fn test_report_json_shape() {
        let report = AuditReport::new(".", vec![], 0);
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("path").is_some());
        assert!(json.get("code_findings").is_some());
        assert!(json.get("code_by_severity").is_some());
        assert!(json.get("secrets_total").is_some());
        assert!(json.get("package_audits").is_some());
        assert!(!report.has_findings());
    }
}
