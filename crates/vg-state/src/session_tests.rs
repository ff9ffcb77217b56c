use super::*;
use chrono::Utc;
use tempfile::tempdir;
use vg_core::{Decision, FileOp, GuardLevel, RiskLevel};

fn store(home: &Path) -> SessionStore {
    SessionStore::new(Paths::under(home))
}

fn command(risk: RiskLevel) -> CommandRecord {
    CommandRecord {
        command_text: "cmd".to_string(),
        args: Vec::new(),
        effective_level: GuardLevel::Medium,
        risk_level: risk,
        reasons: Vec::new(),
        decision: Decision::AllowHost,
        approved_by: None,
        started_at: Utc::now(),
        duration_ms: 1,
        exit_code: 0,
        findings_refs: Vec::new(),
    }
}

fn file_op(op: FileOp, allowed: bool) -> FileOperation {
    FileOperation {
        timestamp: Utc::now(),
        operation: op,
        path: "/ws/file".to_string(),
        size: None,
        risk_level: RiskLevel::Low,
        allowed,
        reason: None,
    }
}

#[test]
fn test_create_and_load_roundtrip() {
    let td = tempdir().unwrap();
    let store = store(td.path());
    let session = store.create("codex", td.path()).unwrap();
    let loaded = store.load(&session.id).unwrap();
    assert_eq!(loaded.id, session.id);
    assert_eq!(loaded.agent_name, "codex");
    assert_eq!(loaded.risk_score, 0);
    assert!(loaded.ended_at.is_none());
}

#[test]
fn test_session_ids_are_unique_ulids() {
    let td = tempdir().unwrap();
    let store = store(td.path());
    let a = store.create("a", td.path()).unwrap();
    let b = store.create("b", td.path()).unwrap();
    assert_ne!(a.id, b.id);
    assert_eq!(a.id.len(), 26);
}

#[test]
fn test_risk_score_invariant() {
    // risk_score = Σ weight(cmd) + 25·|disallowed file ops|
    let td = tempdir().unwrap();
    let store = store(td.path());
    let mut session = store.create("codex", td.path()).unwrap();

    store.add_command(&mut session, command(RiskLevel::Critical)).unwrap();
    store.add_command(&mut session, command(RiskLevel::High)).unwrap();
    store.add_command(&mut session, command(RiskLevel::Medium)).unwrap();
    store.add_command(&mut session, command(RiskLevel::Low)).unwrap();
    store
        .add_file_operation(&mut session, file_op(FileOp::Delete, false))
        .unwrap();
    store
        .add_file_operation(&mut session, file_op(FileOp::Create, true))
        .unwrap();

    assert_eq!(session.risk_score, 100 + 50 + 10 + 0 + 25);
    // violations = high/critical commands + disallowed file ops
    assert_eq!(session.violations, 2 + 1);

    let loaded = store.load(&session.id).unwrap();
    assert_eq!(loaded.risk_score, session.risk_score);
    assert_eq!(loaded.violations, session.violations);
}

#[test]
fn test_end_never_precedes_start() {
    let td = tempdir().unwrap();
    let store = store(td.path());
    let mut session = store.create("codex", td.path()).unwrap();
    store.end(&mut session).unwrap();
    assert!(session.ended_at.unwrap() >= session.started_at);
}

#[test]
fn test_load_missing_session_is_not_found() {
    let td = tempdir().unwrap();
    let store = store(td.path());
    let err = store.load("01MISSING").unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn test_list_skips_corrupt_files_with_warning() {
    let td = tempdir().unwrap();
    let store = store(td.path());
    store.create("a", td.path()).unwrap();
    std::fs::write(store.paths().session_dir().join("broken.json"), "{oops").unwrap();

    let (sessions, warnings) = store.list().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("broken.json"));
}

#[test]
fn test_list_empty_store() {
    let td = tempdir().unwrap();
    let (sessions, warnings) = store(td.path()).list().unwrap();
    assert!(sessions.is_empty());
    assert!(warnings.is_empty());
}

#[test]
fn test_workspace_is_symlink_resolved() {
    let td = tempdir().unwrap();
    let real = td.path().join("real");
    std::fs::create_dir(&real).unwrap();
    #[cfg(unix)]
    {
        let link = td.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();
        let store = store(td.path());
        let session = store.create("codex", &link).unwrap();
        assert_eq!(session.workspace, real.canonicalize().unwrap().to_string_lossy());
    }
}

#[test]
fn test_mutations_persist_atomically() {
    let td = tempdir().unwrap();
    let store = store(td.path());
    let mut session = store.create("codex", td.path()).unwrap();
    store.add_command(&mut session, command(RiskLevel::High)).unwrap();

    // No temp droppings next to the ledger.
    let extras: Vec<_> = std::fs::read_dir(store.paths().session_dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|name| !name.ends_with(".json"))
        .collect();
    assert!(extras.is_empty(), "unexpected files: {extras:?}");
}
