//! Guard-level resolution and the decision table.

use crate::context::DetectionContext;
use vg_config::GuardLevelSetting;
use vg_core::{Decision, GuardLevel, RiskLevel};

/// Branches that always imply the most defensive posture.
const PARANOID_BRANCHES: &[&str] = &["main", "master", "production", "release"];

/// Keywords that mark a deployment-flavored context.
const RISK_KEYWORDS: &[&str] = &["prod", "production", "prd", "live", "staging", "stg"];

/// Token boundary characters for keyword matching. `prod` matches in
/// `deploy/prod` or `ENV=prod` but not in `products` or `reproduction`.
fn is_boundary(c: Option<char>) -> bool {
    match c {
        None => true,
        Some(c) => matches!(c, '/' | '-' | '_' | ':' | '.' | '=' | ' ' | '\t'),
    }
}

/// Whether `needle` occurs in `haystack` as a bounded token.
pub fn contains_risk_token(haystack: &str, needle: &str) -> bool {
    let hay = haystack.to_ascii_lowercase();
    let mut offset = 0;
    while let Some(pos) = hay[offset..].find(needle) {
        let start = offset + pos;
        let end = start + needle.len();
        let before = hay[..start].chars().next_back();
        let after = hay[end..].chars().next();
        if is_boundary(before) && is_boundary(after) {
            return true;
        }
        offset = end;
    }
    false
}

fn detect_from_context(ctx: &DetectionContext, command: &str) -> GuardLevel {
    let mut level = GuardLevel::Medium;

    if let Some(branch) = &ctx.git_branch {
        if PARANOID_BRANCHES.iter().any(|b| branch == b) {
            return GuardLevel::Paranoid;
        }
    }

    let workdir = ctx
        .working_dir
        .as_deref()
        .map(|dir| dir.to_string_lossy().to_string());
    let mut texts: Vec<&str> = Vec::new();
    if let Some(branch) = &ctx.git_branch {
        texts.push(branch.as_str());
    }
    texts.push(command);
    if let Some(dir) = &workdir {
        texts.push(dir.as_str());
    }
    for key in ["ENV", "ENVIRONMENT"] {
        if let Some(value) = ctx.env_value(key) {
            texts.push(value);
        }
    }

    for text in texts {
        if RISK_KEYWORDS.iter().any(|kw| contains_risk_token(text, kw)) {
            level = level.max(GuardLevel::High);
        }
    }

    level
}

/// Resolve the effective guard level. A fixed setting is used as-is; `auto`
/// derives the level from the detection context, floored at `floor`.
pub fn resolve_effective(
    setting: GuardLevelSetting,
    floor: GuardLevel,
    ctx: &DetectionContext,
    command: &str,
) -> GuardLevel {
    match setting {
        GuardLevelSetting::Fixed(level) => level,
        GuardLevelSetting::Auto => detect_from_context(ctx, command).max(floor),
    }
}

/// The decision table. Total over (risk, level); no other outcomes exist.
pub fn decide(level: GuardLevel, risk: RiskLevel) -> Decision {
    match (risk, level) {
        (RiskLevel::Critical, _) => Decision::Block,
        (RiskLevel::High, GuardLevel::Off) => Decision::AllowHost,
        (RiskLevel::High, GuardLevel::Paranoid) => Decision::Block,
        (RiskLevel::High, _) => Decision::RequireApproval,
        (RiskLevel::Medium, GuardLevel::High | GuardLevel::Paranoid) => Decision::RequireApproval,
        (RiskLevel::Medium, _) => Decision::AllowHost,
        (RiskLevel::Low, GuardLevel::Paranoid) => Decision::RequireApproval,
        (RiskLevel::Low, _) => Decision::AllowHost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ctx_with_branch(branch: &str) -> DetectionContext {
        let mut ctx = DetectionContext::empty();
        ctx.git_branch = Some(branch.to_string());
        ctx
    }

    // ── Token matching ──────────────────────────────────────────────

    #[test]
    fn test_token_matches_with_delimiters() {
        assert!(contains_risk_token("deploy/prod", "prod"));
        assert!(contains_risk_token("env:prod", "prod"));
        assert!(contains_risk_token("prod", "prod"));
        assert!(contains_risk_token("my-stg-cluster", "stg"));
    }

    #[test]
    fn test_token_rejects_embedded_occurrences() {
        assert!(!contains_risk_token("products", "prod"));
        assert!(!contains_risk_token("reproduction", "prod"));
        assert!(!contains_risk_token("restaging-x", "stg"));
    }

    #[test]
    fn test_token_matching_is_case_insensitive() {
        assert!(contains_risk_token("DEPLOY/PROD", "prod"));
    }

    // ── Auto resolution ─────────────────────────────────────────────

    #[test]
    fn test_main_branch_resolves_paranoid() {
        let level = resolve_effective(
            GuardLevelSetting::Auto,
            GuardLevel::Off,
            &ctx_with_branch("main"),
            "echo ok",
        );
        assert_eq!(level, GuardLevel::Paranoid);
    }

    #[test]
    fn test_prod_keyword_in_command_resolves_high() {
        let level = resolve_effective(
            GuardLevelSetting::Auto,
            GuardLevel::Off,
            &DetectionContext::empty(),
            "kubectl apply -f prod/deploy.yaml",
        );
        assert_eq!(level, GuardLevel::High);
    }

    #[test]
    fn test_env_variable_value_resolves_high() {
        let mut ctx = DetectionContext::empty();
        ctx.env.insert("ENVIRONMENT".to_string(), "staging".to_string());
        let level = resolve_effective(GuardLevelSetting::Auto, GuardLevel::Off, &ctx, "make test");
        assert_eq!(level, GuardLevel::High);
    }

    #[test]
    fn test_working_dir_keyword_resolves_high() {
        let mut ctx = DetectionContext::empty();
        ctx.working_dir = Some(PathBuf::from("/home/dev/services/prod-api"));
        let level = resolve_effective(GuardLevelSetting::Auto, GuardLevel::Off, &ctx, "ls");
        assert_eq!(level, GuardLevel::High);
    }

    #[test]
    fn test_quiet_context_resolves_medium() {
        let level = resolve_effective(
            GuardLevelSetting::Auto,
            GuardLevel::Off,
            &ctx_with_branch("feature/cleanup"),
            "cargo build",
        );
        assert_eq!(level, GuardLevel::Medium);
    }

    #[test]
    fn test_fixed_setting_wins() {
        let level = resolve_effective(
            GuardLevelSetting::Fixed(GuardLevel::Low),
            GuardLevel::Off,
            &ctx_with_branch("main"),
            "echo ok",
        );
        assert_eq!(level, GuardLevel::Low);
    }

    #[test]
    fn test_floor_raises_auto_result() {
        let level = resolve_effective(
            GuardLevelSetting::Auto,
            GuardLevel::High,
            &ctx_with_branch("feature/cleanup"),
            "echo ok",
        );
        assert_eq!(level, GuardLevel::High);
    }

    // ── Decision table (every cell) ─────────────────────────────────

    #[test]
    fn test_decision_table_is_exact() {
        use Decision::*;
        use GuardLevel::*;
        use RiskLevel::*;

        let expected = [
            (RiskLevel::Low, Off, AllowHost),
            (RiskLevel::Low, GuardLevel::Low, AllowHost),
            (RiskLevel::Low, GuardLevel::Medium, AllowHost),
            (RiskLevel::Low, GuardLevel::High, AllowHost),
            (RiskLevel::Low, Paranoid, RequireApproval),
            (RiskLevel::Medium, Off, AllowHost),
            (RiskLevel::Medium, GuardLevel::Low, AllowHost),
            (RiskLevel::Medium, GuardLevel::Medium, AllowHost),
            (RiskLevel::Medium, GuardLevel::High, RequireApproval),
            (RiskLevel::Medium, Paranoid, RequireApproval),
            (RiskLevel::High, Off, AllowHost),
            (RiskLevel::High, GuardLevel::Low, RequireApproval),
            (RiskLevel::High, GuardLevel::Medium, RequireApproval),
            (RiskLevel::High, GuardLevel::High, RequireApproval),
            (RiskLevel::High, Paranoid, Block),
            (Critical, Off, Block),
            (Critical, GuardLevel::Low, Block),
            (Critical, GuardLevel::Medium, Block),
            (Critical, GuardLevel::High, Block),
            (Critical, Paranoid, Block),
        ];

        for (risk, level, want) in expected {
            assert_eq!(decide(level, risk), want, "risk={risk} level={level}");
        }
    }

    #[test]
    fn test_critical_blocks_at_every_level() {
        for level in [
            GuardLevel::Off,
            GuardLevel::Low,
            GuardLevel::Medium,
            GuardLevel::High,
            GuardLevel::Paranoid,
        ] {
            assert_eq!(decide(level, RiskLevel::Critical), Decision::Block);
        }
    }
}
