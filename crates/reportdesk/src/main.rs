#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;
use clap::error::ErrorKind as ClapErrorKind;
use reportdesk::cli::app::{Cli, Command, DatabaseArgs, RuntimeArgs};
use reportdesk::cli::commands::{self, CommandContext};
use reportdesk::error::ErrorKind;
use reportdesk::models::CommandFailure;
use tracing_subscriber::EnvFilter;

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_VALIDATION_FAILURE: i32 = 2;
const EXIT_ACCESS_DENIED: i32 = 3;
const EXIT_NOT_FOUND: i32 = 4;
const EXIT_USAGE_ERROR: i32 = 64;

const LOG_FILTER_ENV: &str = "REPORTDESK_LOG";

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => return exit_code_for_parse_error(error),
    };
    init_tracing();

    let command_name = cli.command.name();
    eprintln!("reportdesk: starting `{command_name}`");

    match execute(cli) {
        Ok(()) => {
            eprintln!("reportdesk: completed `{command_name}` (exit_code={EXIT_SUCCESS})");
            EXIT_SUCCESS
        }
        Err(error) => {
            let exit_code = classify_runtime_error(&error);
            eprintln!("reportdesk: failed `{command_name}` (exit_code={exit_code})");
            eprintln!("{error:#}");
            exit_code
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn execute(cli: Cli) -> Result<()> {
    let context = resolve_context(&cli.runtime, &cli.database)?;

    match cli.command {
        Command::Login(args) => commands::auth::run_login(&args, &context),
        Command::Logout => commands::auth::run_logout(&context),
        Command::Whoami => commands::auth::run_whoami(&context),
        Command::Menu => commands::auth::run_menu(&context),
        Command::Catalog(args) => commands::catalog::run(&args, &context),
        Command::Reports(args) => commands::reports::run(&args, &context),
        Command::Admin => commands::admin::run(&context),
    }
}

fn classify_runtime_error(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<CommandFailure>().map(CommandFailure::kind) {
        Some(ErrorKind::Validation) => EXIT_VALIDATION_FAILURE,
        Some(ErrorKind::AuthenticationRequired | ErrorKind::AuthorizationDenied) => {
            EXIT_ACCESS_DENIED
        }
        Some(ErrorKind::NotFound) => EXIT_NOT_FOUND,
        Some(ErrorKind::Database | ErrorKind::Internal) | None => EXIT_RUNTIME_FAILURE,
    }
}

fn exit_code_for_parse_error(error: clap::Error) -> i32 {
    match error.kind() {
        ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
            let _ = error.print();
            EXIT_SUCCESS
        }
        _ => {
            let _ = error.print();
            EXIT_USAGE_ERROR
        }
    }
}

fn resolve_context(runtime: &RuntimeArgs, database: &DatabaseArgs) -> Result<CommandContext> {
    let home_dir = match &runtime.home_dir {
        Some(path) => path.clone(),
        None => std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("HOME is not set; pass --home-dir"))?,
    };

    let cwd = match &runtime.cwd {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };

    let paths = reportdesk::config::resolve_runtime_paths(
        &home_dir,
        &cwd,
        &runtime.overrides(),
        &database.db_name,
    )?;
    Ok(CommandContext::new(paths, database.settings()))
}
