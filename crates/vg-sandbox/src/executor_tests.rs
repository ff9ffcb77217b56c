use super::*;
use std::fs;
use tempfile::tempdir;
use vg_config::GuardLevelSetting;

fn executor_with(home: &Path, mutate: impl FnOnce(&mut Config)) -> Executor {
    let mut config = Config::default();
    // Keep tests hermetic: never select a real isolation backend.
    config.sandbox.runtime = "none".to_string();
    config.metrics.enabled = true;
    mutate(&mut config);
    Executor::new(config, Paths::under(home)).unwrap()
}

fn request<'a>(command: &'a str, workspace: &'a Path) -> ExecRequest<'a> {
    ExecRequest {
        command,
        workspace,
        session_id: None,
    }
}

#[test]
fn test_benign_command_runs_on_host() {
    let home = tempdir().unwrap();
    let ws = tempdir().unwrap();
    let executor = executor_with(home.path(), |_| {});
    let outcome = executor
        .execute(&request("true", ws.path()), &DetectionContext::empty())
        .unwrap();
    assert_eq!(outcome, ExecOutcome::Allowed(0));
}

#[test]
fn test_exit_code_passes_through() {
    let home = tempdir().unwrap();
    let ws = tempdir().unwrap();
    let executor = executor_with(home.path(), |_| {});
    let outcome = executor
        .execute(&request("exit 7", ws.path()), &DetectionContext::empty())
        .unwrap();
    assert_eq!(outcome, ExecOutcome::Allowed(7));
}

#[test]
fn test_destructive_rm_is_blocked() {
    // S1: `rm -rf /` blocks under every configuration.
    let home = tempdir().unwrap();
    let ws = tempdir().unwrap();
    let executor = executor_with(home.path(), |c| {
        c.guard.level = GuardLevelSetting::Fixed(vg_core::GuardLevel::Off);
    });
    let outcome = executor
        .execute(&request("rm -rf /", ws.path()), &DetectionContext::empty())
        .unwrap();
    match outcome {
        ExecOutcome::Blocked(reasons) => {
            assert!(reasons.iter().any(|r| r.contains("RM_DESTRUCTIVE")), "{reasons:?}");
        }
        other => panic!("expected block, got {other:?}"),
    }
    assert!(!ws.path().join("..").join("gone").exists());
}

#[test]
fn test_blocked_command_recorded_with_failure_exit() {
    let home = tempdir().unwrap();
    let ws = tempdir().unwrap();
    let executor = executor_with(home.path(), |_| {});
    let store = SessionStore::new(Paths::under(home.path()));
    let session = store.create("codex", ws.path()).unwrap();

    let req = ExecRequest {
        command: "rm -rf /",
        workspace: ws.path(),
        session_id: Some(&session.id),
    };
    executor.execute(&req, &DetectionContext::empty()).unwrap();

    let loaded = store.load(&session.id).unwrap();
    assert_eq!(loaded.commands.len(), 1);
    assert_eq!(loaded.commands[0].decision, Decision::Block);
    assert_eq!(loaded.commands[0].exit_code, -1);
    assert_eq!(loaded.risk_score, 100);
    assert_eq!(loaded.violations, 1);
}

#[test]
fn test_paranoid_branch_requires_approval_for_everything() {
    // S2: auto + main branch → paranoid; even `echo ok` needs approval.
    let home = tempdir().unwrap();
    let ws = tempdir().unwrap();
    let executor = executor_with(home.path(), |_| {});
    let mut ctx = DetectionContext::empty();
    ctx.git_branch = Some("main".to_string());

    let outcome = executor
        .execute(&request("echo ok", ws.path()), &ctx)
        .unwrap();
    match outcome {
        ExecOutcome::Blocked(reasons) => {
            assert!(
                reasons.iter().any(|r| r.contains("paranoid")),
                "block reason should name the effective level: {reasons:?}"
            );
        }
        other => panic!("expected block, got {other:?}"),
    }
}

#[test]
fn test_trust_entry_satisfies_approval() {
    let home = tempdir().unwrap();
    let ws = tempdir().unwrap();
    let executor = executor_with(home.path(), |c| {
        c.analyzer.denylist = vec!["frobnicate".to_string()];
    });

    // Denylisted → high → require_approval at the default medium level.
    let outcome = executor
        .execute(&request("echo frobnicate", ws.path()), &DetectionContext::empty())
        .unwrap();
    assert!(matches!(outcome, ExecOutcome::Blocked(_)));

    TrustStore::new(&Paths::under(home.path()))
        .add("echo frobnicate", "dev", None)
        .unwrap();
    let outcome = executor
        .execute(&request("echo frobnicate", ws.path()), &DetectionContext::empty())
        .unwrap();
    assert_eq!(outcome, ExecOutcome::Allowed(0));
}

#[test]
fn test_bypass_env_downgrades_approval_but_not_block() {
    let home = tempdir().unwrap();
    let ws = tempdir().unwrap();
    let executor = executor_with(home.path(), |c| {
        c.guard.allow_user_bypass = true;
        c.analyzer.denylist = vec!["frobnicate".to_string()];
    });
    let mut ctx = DetectionContext::empty();
    ctx.env
        .insert("VECTRAGUARD_BYPASS".to_string(), "1".to_string());

    let outcome = executor
        .execute(&request("echo frobnicate", ws.path()), &ctx)
        .unwrap();
    assert_eq!(outcome, ExecOutcome::Allowed(0));

    // Critical commands ignore the bypass entirely.
    let outcome = executor.execute(&request("rm -rf /", ws.path()), &ctx).unwrap();
    assert!(matches!(outcome, ExecOutcome::Blocked(_)));
}

#[test]
fn test_lockdown_blocks_everything() {
    let home = tempdir().unwrap();
    let ws = tempdir().unwrap();
    let executor = executor_with(home.path(), |_| {});
    Lockdown::new(&Paths::under(home.path()))
        .enable(Some("incident"), None)
        .unwrap();

    let outcome = executor
        .execute(&request("true", ws.path()), &DetectionContext::empty())
        .unwrap();
    match outcome {
        ExecOutcome::Blocked(reasons) => {
            assert!(reasons[0].contains("lockdown"));
            assert!(reasons[0].contains("incident"));
        }
        other => panic!("expected block, got {other:?}"),
    }
}

#[test]
fn test_rm_is_soft_deleted_not_executed() {
    let home = tempdir().unwrap();
    let ws = tempdir().unwrap();
    fs::create_dir(ws.path().join("junk")).unwrap();
    fs::write(ws.path().join("junk/data.txt"), "payload").unwrap();

    let executor = executor_with(home.path(), |_| {});
    let store = SessionStore::new(Paths::under(home.path()));
    let session = store.create("codex", ws.path()).unwrap();

    let req = ExecRequest {
        command: "rm -rf junk/",
        workspace: ws.path(),
        session_id: Some(&session.id),
    };
    let outcome = executor.execute(&req, &DetectionContext::empty()).unwrap();
    assert_eq!(outcome, ExecOutcome::Allowed(0));
    assert!(!ws.path().join("junk").exists(), "target was moved aside");

    let manager = SoftDeleteManager::new(
        &Paths::under(home.path()),
        vg_config::SoftDeleteConfig::default(),
    );
    let backups = manager.list().unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].original_command, "rm -rf junk/");

    let loaded = store.load(&session.id).unwrap();
    assert_eq!(loaded.file_ops.len(), 1);
    assert!(loaded.file_ops[0].allowed);
    assert_eq!(loaded.commands.len(), 1);
    assert_eq!(loaded.commands[0].exit_code, 0);
}

#[test]
fn test_soft_delete_can_be_disabled() {
    let home = tempdir().unwrap();
    let ws = tempdir().unwrap();
    fs::write(ws.path().join("gone.txt"), "x").unwrap();

    let executor = executor_with(home.path(), |c| {
        c.soft_delete.enabled = false;
    });
    let outcome = executor
        .execute(&request("rm gone.txt", ws.path()), &DetectionContext::empty())
        .unwrap();
    assert_eq!(outcome, ExecOutcome::Allowed(0));
    assert!(!ws.path().join("gone.txt").exists());
    // Really deleted: no backups.
    let manager = SoftDeleteManager::new(
        &Paths::under(home.path()),
        vg_config::SoftDeleteConfig::default(),
    );
    assert!(manager.list().unwrap().is_empty());
}

#[test]
fn test_metrics_recorded_per_execution() {
    let home = tempdir().unwrap();
    let ws = tempdir().unwrap();
    let executor = executor_with(home.path(), |_| {});
    executor
        .execute(&request("true", ws.path()), &DetectionContext::empty())
        .unwrap();
    executor
        .execute(&request("rm -rf /", ws.path()), &DetectionContext::empty())
        .unwrap();

    let metrics = MetricsCollector::new(&Paths::under(home.path()), true).get();
    assert_eq!(metrics.total, 2);
    assert_eq!(metrics.by_risk_level["low"], 1);
    assert_eq!(metrics.by_risk_level["critical"], 1);
}
