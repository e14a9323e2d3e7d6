use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use super::commands::{
    auth::LoginArgs, catalog::CatalogArgs, reports::ReportsArgs,
};
use crate::config::PathOverrides;
use crate::db::ConnectionSettings;

#[derive(Debug, Parser)]
#[command(
    name = "reportdesk",
    version,
    about = "Role-gated reporting console over parameterized SQL"
)]
pub struct Cli {
    #[command(flatten)]
    pub runtime: RuntimeArgs,

    #[command(flatten)]
    pub database: DatabaseArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct RuntimeArgs {
    #[arg(long, global = true, env = "REPORTDESK_HOME_DIR", value_name = "PATH")]
    pub home_dir: Option<PathBuf>,

    #[arg(long, global = true, env = "REPORTDESK_CWD", value_name = "PATH")]
    pub cwd: Option<PathBuf>,

    #[arg(long, global = true, env = "REPORTDESK_DATA_DIR", value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    #[arg(long, global = true, env = "REPORTDESK_SQL_DIR", value_name = "PATH")]
    pub sql_dir: Option<PathBuf>,

    #[arg(long, global = true, env = "REPORTDESK_REPORTS_PATH", value_name = "PATH")]
    pub reports_path: Option<PathBuf>,

    /// JSON list of accounts replacing the built-in directory.
    #[arg(long, global = true, env = "REPORTDESK_USERS_PATH", value_name = "PATH")]
    pub users_path: Option<PathBuf>,
}

impl RuntimeArgs {
    #[must_use]
    pub fn overrides(&self) -> PathOverrides {
        PathOverrides {
            data_dir: self.data_dir.clone(),
            sql_dir: self.sql_dir.clone(),
            reports_path: self.reports_path.clone(),
            users_path: self.users_path.clone(),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct DatabaseArgs {
    #[arg(long, global = true, env = "REPORTDESK_DB_HOST", default_value = "127.0.0.1")]
    pub db_host: String,

    #[arg(long, global = true, env = "REPORTDESK_DB_PORT", default_value_t = 3306)]
    pub db_port: u16,

    #[arg(long, global = true, env = "REPORTDESK_DB_USER", default_value = "vehicles")]
    pub db_user: String,

    #[arg(
        long,
        global = true,
        env = "REPORTDESK_DB_PASSWORD",
        default_value = "",
        hide_env_values = true,
        hide_default_value = true
    )]
    pub db_password: String,

    /// Database name; a value that looks like a path selects that file.
    #[arg(long, global = true, env = "REPORTDESK_DB_NAME", default_value = "vehicles")]
    pub db_name: String,
}

impl DatabaseArgs {
    #[must_use]
    pub fn settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            host: self.db_host.clone(),
            port: self.db_port,
            user: self.db_user.clone(),
            password: self.db_password.clone(),
            database: self.db_name.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Authenticate and open a session.
    Login(LoginArgs),
    /// Drop the current session.
    Logout,
    /// Show the principal of the current session.
    Whoami,
    /// List the sections the current principal may open.
    Menu,
    /// Predefined queries.
    Catalog(CatalogArgs),
    /// User-authored reports.
    Reports(ReportsArgs),
    /// Directory, template and report store overview.
    Admin,
}

impl Command {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Login(_) => "login",
            Self::Logout => "logout",
            Self::Whoami => "whoami",
            Self::Menu => "menu",
            Self::Catalog(args) => args.command.name(),
            Self::Reports(args) => args.command.name(),
            Self::Admin => "admin",
        }
    }
}
