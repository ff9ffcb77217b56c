mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::App;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            commands::EXIT_ERROR
        }
    };
    std::process::exit(code);
}

fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();
    let app = App::bootstrap()?;

    match cli.command {
        Commands::Exec { session, command } => commands::exec(&app, session, command),
        Commands::Scan { path, json } => commands::scan(&app, &path, json),
        Commands::Secrets { path, json } => commands::secrets(&app, &path, json),
        Commands::Audit { path, json } => commands::audit(&app, &path, json),
        Commands::Validate { path } => commands::validate(&app, &path),
        Commands::Session { command } => commands::session(&app, command),
        Commands::Trust { command } => commands::trust(&app, command),
        Commands::Restore { command } => commands::restore(&app, command),
        Commands::Lockdown { command } => commands::lockdown(&app, command),
        Commands::Env => commands::env(&app),
        Commands::Metrics => commands::metrics(&app),
        Commands::Doctor => commands::doctor(&app),
    }
}
