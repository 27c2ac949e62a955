//! Task Manager CLI
//!
//! Runs one task operation against the configured SQLite database and
//! prints the result as JSON.

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use task_manager::cli::commands::{execute, principal_from_raw};
use task_manager::cli::{Cli, Command};
use task_manager::config::Config;
use task_manager::db::Database;
use task_manager::directory::Lookups;
use task_manager::error::TaskError;
use task_manager::logging::{self, LogTarget};
use task_manager::service::TaskService;
use tracing::{debug, error};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let Ok(target) = cli.log.parse::<LogTarget>();
    if let Err(e) = logging::init(&target, cli.verbose) {
        eprintln!("failed to initialize logging: {e:#}");
    }

    match run(&cli) {
        Ok(Ok(output)) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Ok(Err(err)) => {
            report(&err);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{e:#}");
            report(&TaskError::storage(format!("{e:#}")));
            ExitCode::FAILURE
        }
    }
}

/// Outer error is startup (config, filesystem); inner is the operation.
fn run(cli: &Cli) -> Result<Result<serde_json::Value, TaskError>> {
    let mut config = Config::resolve(cli.config.as_deref())?;
    if let Some(path) = &cli.database {
        config.server.db_path = path.clone();
    }
    config.ensure_db_dir()?;
    debug!(db_path = %config.server.db_path.display(), "Opening database");

    let db = match Database::open_with_timeout(&config.server.db_path, config.server.busy_timeout_ms)
    {
        Ok(db) => Arc::new(db),
        Err(err) => return Ok(Err(err)),
    };
    if matches!(cli.command, Command::Migrate) {
        return Ok(Ok(serde_json::json!({ "migrated": true })));
    }

    let lookups = Lookups::sqlite(&db);
    let service = match TaskService::bootstrap(db, lookups, &config.statuses) {
        Ok(service) => service,
        Err(err) => return Ok(Err(err)),
    };

    Ok(execute(&service, principal_from_raw(cli.user), &cli.command))
}

fn report(err: &TaskError) {
    match serde_json::to_string(&err.to_body()) {
        Ok(body) => println!("{}", body),
        Err(_) => eprintln!("{}", err),
    }
}
