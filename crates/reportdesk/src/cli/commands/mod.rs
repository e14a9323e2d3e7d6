pub mod admin;
pub mod auth;
pub mod catalog;
pub mod reports;

use std::collections::BTreeMap;

use anyhow::{Context, Error, Result};

use crate::auth::{Principal, SessionStore, UserDirectory};
use crate::config::RuntimePaths;
use crate::console::Console;
use crate::db::{ConnectionSettings, Database};
use crate::error::ConsoleError;
use crate::models::{CommandFailure, ResponseEnvelope};
use crate::reports::ReportStore;
use crate::sql::SqlTemplateRegistry;

/// Resolved configuration shared by every command.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub paths: RuntimePaths,
    pub settings: ConnectionSettings,
}

impl CommandContext {
    #[must_use]
    pub fn new(paths: RuntimePaths, settings: ConnectionSettings) -> Self {
        Self { paths, settings }
    }

    pub fn directory(&self) -> Result<UserDirectory> {
        match &self.paths.users_path {
            Some(path) => UserDirectory::from_json_file(path),
            None => Ok(UserDirectory::builtin()),
        }
    }

    #[must_use]
    pub fn session(&self) -> SessionStore {
        SessionStore::new(&self.paths.session_path)
    }

    /// Builds the console and loads the session principal once at entry.
    pub fn open_console(&self) -> Result<(Console, Option<Principal>)> {
        let directory = self.directory()?;
        let principal = self.session().load(&directory)?;
        let templates = SqlTemplateRegistry::load(&self.paths.sql_dir).with_context(|| {
            format!(
                "failed to load sql templates from {}",
                self.paths.sql_dir.display()
            )
        })?;
        let database = Database::new(self.settings.clone(), &self.paths.database_path);
        let reports = ReportStore::new(&self.paths.reports_path);

        Ok((
            Console::new(Box::new(directory), templates, database, reports),
            principal,
        ))
    }
}

/// Parses repeated `name=value` pairs; a pair without `=` is a usage error.
pub fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got `{raw}`")),
    }
}

pub(crate) fn into_map(pairs: &[(String, String)]) -> BTreeMap<String, String> {
    pairs.iter().cloned().collect()
}

pub(crate) fn print_envelope(envelope: &ResponseEnvelope) -> Result<()> {
    let encoded =
        serde_json::to_string_pretty(envelope).context("failed to encode response envelope")?;
    println!("{encoded}");
    Ok(())
}

pub(crate) fn console_failure(command: &str, error: &ConsoleError) -> Error {
    Error::new(CommandFailure::from_console_error(command, error))
}
