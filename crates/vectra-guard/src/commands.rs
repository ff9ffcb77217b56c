//! Subcommand handlers. Each returns the process exit code per the external
//! contract: 0 clean, 1 runtime/config error, 2 findings, 3 blocked, the
//! child's code for exec, 125 for sandbox setup failures.

use crate::cli::{LockdownCommands, RestoreCommands, SessionCommands, TrustCommands};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use vg_config::{Config, PROJECT_CONFIG_FILE};
use vg_core::{CancelToken, ExecOutcome, Paths};
use vg_guard::DetectionContext;
use vg_sandbox::{ExecRequest, Executor, detect_capabilities, detect_environment, select_runtime};
use vg_scan::{
    AuditReport, CodeScanner, ScriptValidator, SecretScanner,
    report::{format_audit_line, format_finding_line},
};
use vg_state::{
    Lockdown, MetricsCollector, SessionStore, SoftDeleteManager, TrustStore, WorkspaceIndex,
    index::SESSION_ENV_VAR, summarize_file_ops,
};

pub const EXIT_OK: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_FINDINGS: i32 = 2;
pub const EXIT_BLOCKED: i32 = 3;
pub const EXIT_SANDBOX_FAILED: i32 = 125;

/// Shared setup for every subcommand.
pub struct App {
    pub config: Config,
    pub paths: Paths,
    pub workdir: PathBuf,
}

impl App {
    pub fn bootstrap() -> Result<Self> {
        let paths = Paths::resolve()?;
        let workdir = std::env::current_dir().context("failed to resolve working directory")?;
        let project_config = workdir.join(PROJECT_CONFIG_FILE);
        let config = vg_config::load_layered(
            &paths.global_config_file(),
            Some(project_config.as_path()),
        )?;
        Ok(App {
            config,
            paths,
            workdir,
        })
    }

    fn session_store(&self) -> SessionStore {
        SessionStore::new(self.paths.clone())
    }

    fn workspace_index(&self) -> WorkspaceIndex {
        WorkspaceIndex::new(self.paths.clone())
    }

    fn active_session(&self) -> Option<String> {
        let env_session = std::env::var(SESSION_ENV_VAR).ok();
        self.workspace_index().resolve_active(
            &self.session_store(),
            env_session.as_deref(),
            Some(&self.workdir),
        )
    }
}

pub fn exec(app: &App, session: Option<String>, command: Vec<String>) -> Result<i32> {
    let command_text = command.join(" ");
    let ctx = DetectionContext::detect(Some(&app.workdir));
    let session_id = session.or_else(|| app.active_session());

    let executor = Executor::new(app.config.clone(), app.paths.clone())?;
    let request = ExecRequest {
        command: &command_text,
        workspace: &app.workdir,
        session_id: session_id.as_deref(),
    };
    match executor.execute(&request, &ctx)? {
        ExecOutcome::Allowed(code) => Ok(code),
        ExecOutcome::Blocked(reasons) => {
            for reason in reasons {
                eprintln!("blocked: {reason}");
            }
            Ok(EXIT_BLOCKED)
        }
        ExecOutcome::SandboxFailed { step, detail } => {
            eprintln!("sandbox setup failed: {step}: {detail}");
            Ok(EXIT_SANDBOX_FAILED)
        }
    }
}

pub fn scan(_app: &App, path: &Path, json: bool) -> Result<i32> {
    let scanner = CodeScanner::new()?;
    let outcome = scanner.scan_path(path, &CancelToken::new());
    for warning in &outcome.warnings {
        tracing::warn!("{warning}");
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.findings)?);
    } else {
        for finding in &outcome.findings {
            println!("{}", format_finding_line(finding));
        }
    }
    Ok(if outcome.has_findings() {
        EXIT_FINDINGS
    } else {
        EXIT_OK
    })
}

pub fn secrets(app: &App, path: &Path, json: bool) -> Result<i32> {
    let scanner = SecretScanner::new(&app.config.scanner)?;
    let outcome = scanner.scan_path(path, &CancelToken::new());
    for warning in &outcome.warnings {
        tracing::warn!("{warning}");
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.findings)?);
    } else {
        for secret in &outcome.findings {
            println!("{}", format_finding_line(&secret.finding));
        }
    }
    Ok(if outcome.findings.is_empty() {
        EXIT_OK
    } else {
        EXIT_FINDINGS
    })
}

pub fn audit(app: &App, path: &Path, json: bool) -> Result<i32> {
    let code = CodeScanner::new()?.scan_path(path, &CancelToken::new());
    let secrets = SecretScanner::new(&app.config.scanner)?.scan_path(path, &CancelToken::new());
    for warning in code.warnings.iter().chain(secrets.warnings.iter()) {
        tracing::warn!("{warning}");
    }

    let report = AuditReport::new(
        &path.to_string_lossy(),
        code.findings,
        secrets.findings.len(),
    );
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for finding in &report.code_findings {
            println!("{}", format_audit_line(finding));
        }
        for secret in &secrets.findings {
            println!("{}", format_audit_line(&secret.finding));
        }
        println!(
            "{} code findings, {} secrets",
            report.code_findings.len(),
            report.secrets_total
        );
    }
    Ok(if report.has_findings() {
        EXIT_FINDINGS
    } else {
        EXIT_OK
    })
}

pub fn validate(app: &App, path: &Path) -> Result<i32> {
    let ctx = DetectionContext::detect(Some(&app.workdir));
    let validator = ScriptValidator::new()?;
    let outcome = validator.validate_tree(path, &app.config.analyzer, &ctx, &CancelToken::new());
    for finding in &outcome.findings {
        println!(
            "{}:{}  {}  {}  ({})",
            finding.file,
            finding.line,
            finding.risk_level,
            finding.command,
            finding.reasons.join("; ")
        );
    }
    Ok(if outcome.findings.is_empty() {
        EXIT_OK
    } else {
        EXIT_FINDINGS
    })
}

pub fn session(app: &App, command: SessionCommands) -> Result<i32> {
    let store = app.session_store();
    match command {
        SessionCommands::Start { agent } => {
            let session = store.create(&agent, &app.workdir)?;
            app.workspace_index().record_active(&app.workdir, &session.id);
            println!("{}", session.id);
            println!("export {SESSION_ENV_VAR}={}", session.id);
        }
        SessionCommands::List => {
            let (sessions, warnings) = store.list()?;
            for warning in warnings {
                tracing::warn!("{warning}");
            }
            for session in sessions {
                let state = if session.ended_at.is_some() { "ended" } else { "active" };
                println!(
                    "{}  {}  {}  risk={} violations={}  {}",
                    session.id,
                    state,
                    session.agent_name,
                    session.risk_score,
                    session.violations,
                    session.workspace
                );
            }
        }
        SessionCommands::Show { id } => {
            let id = resolve_session_arg(app, id)?;
            let session = store.load(&id)?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        SessionCommands::End { id } => {
            let id = resolve_session_arg(app, id)?;
            let mut session = store.load(&id)?;
            store.end(&mut session)?;
            println!("ended {id}");
        }
        SessionCommands::Diff { id } => {
            let id = resolve_session_arg(app, id)?;
            let session = store.load(&id)?;
            let diff = summarize_file_ops(&session.file_ops);
            println!("{}", serde_json::to_string_pretty(&diff)?);
        }
    }
    Ok(EXIT_OK)
}

fn resolve_session_arg(app: &App, id: Option<String>) -> Result<String> {
    id.or_else(|| app.active_session())
        .context("no session id given and no active session for this workspace")
}

pub fn trust(app: &App, command: TrustCommands) -> Result<i32> {
    let store = TrustStore::new(&app.paths);
    match command {
        TrustCommands::Add { ttl_days, command } => {
            let text = command.join(" ");
            let ttl = ttl_days.map(chrono::Duration::days);
            let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
            let entry = store.add(&text, &user, ttl)?;
            println!("trusted: {} ({})", entry.command_text, entry.command_hash);
        }
        TrustCommands::List => {
            for entry in store.list()? {
                let expiry = entry
                    .expires_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{}  uses={}  expires={}  {}",
                    &entry.command_hash[..12],
                    entry.use_count,
                    expiry,
                    entry.command_text
                );
            }
        }
        TrustCommands::Remove { command } => {
            let text = command.join(" ");
            if store.remove(&text)? {
                println!("removed");
            } else {
                println!("no such approval");
            }
        }
        TrustCommands::Clean => {
            println!("pruned {} expired approvals", store.clean_expired()?);
        }
    }
    Ok(EXIT_OK)
}

pub fn restore(app: &App, command: RestoreCommands) -> Result<i32> {
    let manager = SoftDeleteManager::new(&app.paths, app.config.soft_delete.clone());
    match command {
        RestoreCommands::List => {
            for backup in manager.list()? {
                println!(
                    "{}  {}  {} entries  {} bytes  {}",
                    backup.id,
                    backup.created_at.to_rfc3339(),
                    backup.entries.len(),
                    backup.total_bytes(),
                    backup.original_command
                );
            }
        }
        RestoreCommands::Apply { id, to } => {
            let restored = manager.restore(&id, to.as_deref())?;
            println!("restored {restored} entries from {id}");
        }
        RestoreCommands::Stats => {
            let stats = manager.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        RestoreCommands::Show { id } => {
            let meta = manager.show(&id)?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
        }
    }
    Ok(EXIT_OK)
}

pub fn lockdown(app: &App, command: LockdownCommands) -> Result<i32> {
    let lockdown = Lockdown::new(&app.paths);
    let user = std::env::var("USER").ok();
    match command {
        LockdownCommands::On { reason } => {
            lockdown.enable(reason.as_deref(), user.as_deref())?;
            println!("lockdown enabled");
        }
        LockdownCommands::Off => {
            lockdown.disable(user.as_deref())?;
            println!("lockdown disabled");
        }
        LockdownCommands::Status => {
            println!("{}", serde_json::to_string_pretty(&lockdown.status())?);
        }
    }
    Ok(EXIT_OK)
}

pub fn env(app: &App) -> Result<i32> {
    let env_map: std::collections::HashMap<String, String> = std::env::vars().collect();
    let sanitized = if app.config.env.enabled {
        let protector =
            vg_guard::EnvProtector::new(app.config.env.mode, &app.config.env.extra_sensitive)?;
        protector.sanitize_env(&env_map)
    } else {
        env_map
    };
    let mut names: Vec<_> = sanitized.keys().collect();
    names.sort();
    for name in names {
        println!("{name}={}", sanitized[name]);
    }
    Ok(EXIT_OK)
}

pub fn metrics(app: &App) -> Result<i32> {
    let collector = MetricsCollector::new(&app.paths, app.config.metrics.enabled);
    let data = collector.get();
    println!("{}", serde_json::to_string_pretty(&data)?);
    println!("average duration: {:.1} ms", data.average_duration_ms());
    Ok(EXIT_OK)
}

pub fn doctor(app: &App) -> Result<i32> {
    let env_map: std::collections::HashMap<String, String> = std::env::vars().collect();
    let environment = detect_environment(&env_map, &app.workdir);
    let caps = detect_capabilities();
    let runtime = select_runtime(environment, &caps);

    println!("environment: {environment}");
    println!("capabilities:");
    println!("  bubblewrap: {}", caps.bubblewrap);
    println!("  docker: {}", caps.docker);
    println!("  user namespaces: {}", caps.user_ns);
    println!("  mount namespaces: {}", caps.mount_ns);
    println!("  seccomp: {}", caps.seccomp);
    println!("  overlayfs: {}", caps.overlayfs);
    println!("selected runtime: {runtime}");
    println!("state dir: {}", app.paths.state_dir().display());
    println!(
        "lockdown: {}",
        if Lockdown::new(&app.paths).is_enabled() { "ENABLED" } else { "off" }
    );
    let (sessions, warnings) = app.session_store().list()?;
    println!("sessions: {} ({} corrupt)", sessions.len(), warnings.len());
    Ok(EXIT_OK)
}
