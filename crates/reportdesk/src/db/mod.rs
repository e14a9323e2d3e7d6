//! Request-scoped database access.
//!
//! A [`DbSession`] owns exactly one connection for the lifetime of one
//! operation. Writes are visible immediately (autocommit); nothing is pooled or
//! reused, and the connection is released when the session is closed or
//! dropped, including on error paths.

mod values;

use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::sql::{CompiledSql, compile_placeholders, split_statements};

pub use values::{QueryParams, ResultSet, Row, SqlValue, json_value_from_sql};

/// Collation registered on every connection for case-insensitive Unicode ordering.
pub const UNICODE_COLLATION: &str = "unicode_ci";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to open database {}", path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to configure database connection")]
    Configure(#[source] rusqlite::Error),

    #[error("no value supplied for query parameter `{name}`")]
    MissingParameter { name: String },

    #[error("failed to prepare statement `{statement}`")]
    Prepare {
        statement: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to execute statement `{statement}`")]
    Execute {
        statement: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to close database connection")]
    Close(#[source] rusqlite::Error),
}

/// The five connection fields from external configuration.
///
/// The SQLite engine opens `database` as a file; host, port and user are
/// carried for diagnostics only.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Debug for ConnectionSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3306,
            user: "vehicles".to_string(),
            password: String::new(),
            database: "vehicles".to_string(),
        }
    }
}

/// Connection factory: settings plus the resolved database file.
#[derive(Debug, Clone)]
pub struct Database {
    settings: ConnectionSettings,
    path: PathBuf,
}

impl Database {
    #[must_use]
    pub fn new(settings: ConnectionSettings, path: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            path: path.into(),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn open_session(&self) -> Result<DbSession, DbError> {
        DbSession::open(self)
    }

    /// Runs `operation` inside a fresh session and releases it afterwards.
    pub fn with_session<T, E>(
        &self,
        operation: impl FnOnce(&DbSession) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let session = self.open_session()?;
        let outcome = operation(&session);
        match outcome {
            Ok(value) => {
                session.close()?;
                Ok(value)
            }
            Err(error) => {
                drop(session);
                Err(error)
            }
        }
    }
}

pub struct DbSession {
    connection: Option<Connection>,
    path: PathBuf,
}

impl Debug for DbSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbSession")
            .field("path", &self.path)
            .field("open", &self.connection.is_some())
            .finish()
    }
}

impl DbSession {
    #[instrument(skip_all, fields(host = %database.settings.host, user = %database.settings.user, db = %database.settings.database))]
    pub fn open(database: &Database) -> Result<Self, DbError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let connection =
            Connection::open_with_flags(&database.path, flags).map_err(|source| {
                DbError::Connect {
                    path: database.path.clone(),
                    source,
                }
            })?;

        connection
            .execute_batch("PRAGMA encoding = 'UTF-8';")
            .map_err(DbError::Configure)?;
        connection
            .create_collation(UNICODE_COLLATION, unicode_ci_compare)
            .map_err(DbError::Configure)?;
        debug!(
            path = %database.path.display(),
            autocommit = connection.is_autocommit(),
            "database session opened"
        );

        Ok(Self {
            connection: Some(connection),
            path: database.path.clone(),
        })
    }

    /// Runs one row-producing statement and returns every row in engine order.
    pub fn execute_query(&self, sql: &str, params: &QueryParams) -> Result<ResultSet, DbError> {
        let compiled = compile_placeholders(sql);
        let mut statement = self.prepare(&compiled)?;
        bind_parameters(&mut statement, &compiled, params)?;
        collect_rows(&mut statement, &compiled)
    }

    /// Runs one statement for effect and returns the affected row count.
    pub fn execute_statement(&self, sql: &str, params: &QueryParams) -> Result<usize, DbError> {
        let compiled = compile_placeholders(sql);
        let mut statement = self.prepare(&compiled)?;
        bind_parameters(&mut statement, &compiled, params)?;

        statement.raw_execute().map_err(|source| DbError::Execute {
            statement: excerpt(&compiled.text),
            source,
        })
    }

    /// Sequential dispatch of a `;`-separated script. Statements run in order;
    /// the returned rows come from the last statement that yields columns
    /// (`SELECT`, `PRAGMA`, `EXPLAIN`, `... RETURNING`), others run for effect
    /// only. A script without one yields an empty result.
    pub fn execute_script(&self, script: &str, params: &QueryParams) -> Result<ResultSet, DbError> {
        let mut result = ResultSet::default();
        for text in split_statements(script) {
            let compiled = compile_placeholders(text);
            let mut statement = self.prepare(&compiled)?;
            bind_parameters(&mut statement, &compiled, params)?;

            if statement.column_count() > 0 {
                result = collect_rows(&mut statement, &compiled)?;
            } else {
                let affected = statement.raw_execute().map_err(|source| DbError::Execute {
                    statement: excerpt(&compiled.text),
                    source,
                })?;
                debug!(affected, statement = %excerpt(text), "script statement applied");
            }
        }
        Ok(result)
    }

    /// Releases the connection, surfacing close failures.
    pub fn close(mut self) -> Result<(), DbError> {
        match self.connection.take() {
            Some(connection) => connection.close().map_err(|(_, source)| DbError::Close(source)),
            None => Ok(()),
        }
    }

    fn connection(&self) -> &Connection {
        match self.connection.as_ref() {
            Some(connection) => connection,
            None => unreachable!("database session used after close"),
        }
    }

    fn prepare(&self, compiled: &CompiledSql) -> Result<rusqlite::Statement<'_>, DbError> {
        self.connection()
            .prepare(&compiled.text)
            .map_err(|source| DbError::Prepare {
                statement: excerpt(&compiled.text),
                source,
            })
    }
}

impl Drop for DbSession {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            match connection.close() {
                Ok(()) => info!(path = %self.path.display(), "database session released"),
                Err((_, error)) => {
                    warn!(path = %self.path.display(), %error, "database session close failed");
                }
            }
        }
    }
}

fn collect_rows(
    statement: &mut rusqlite::Statement<'_>,
    compiled: &CompiledSql,
) -> Result<ResultSet, DbError> {
    let columns = statement
        .column_names()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    let execute_error = |source: rusqlite::Error| DbError::Execute {
        statement: excerpt(&compiled.text),
        source,
    };

    let mut rows = statement.raw_query();
    let mut result = ResultSet::new(columns);
    while let Some(row) = rows.next().map_err(execute_error)? {
        let mut values = Vec::with_capacity(result.columns.len());
        for index in 0..result.columns.len() {
            let value = row.get::<usize, SqlValue>(index).map_err(execute_error)?;
            values.push(json_value_from_sql(value));
        }
        result.push_values(values);
    }

    Ok(result)
}

/// Binds every placeholder the statement still carries; values travel only
/// through the driver's binding API.
fn bind_parameters(
    statement: &mut rusqlite::Statement<'_>,
    compiled: &CompiledSql,
    params: &QueryParams,
) -> Result<(), DbError> {
    for name in &compiled.names {
        let binding = CompiledSql::binding_name(name);
        let index = statement
            .parameter_index(&binding)
            .map_err(|source| DbError::Prepare {
                statement: excerpt(&compiled.text),
                source,
            })?;
        let Some(index) = index else {
            continue;
        };
        let value = params.get(name).ok_or_else(|| DbError::MissingParameter {
            name: name.clone(),
        })?;
        statement
            .raw_bind_parameter(index, value)
            .map_err(|source| DbError::Execute {
                statement: excerpt(&compiled.text),
                source,
            })?;
    }
    Ok(())
}

fn unicode_ci_compare(left: &str, right: &str) -> Ordering {
    left.to_lowercase()
        .cmp(&right.to_lowercase())
        .then_with(|| left.cmp(right))
}

fn excerpt(statement: &str) -> String {
    const MAX_CHARS: usize = 80;
    let flattened = statement.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= MAX_CHARS {
        return flattened;
    }
    let prefix = flattened.chars().take(MAX_CHARS - 3).collect::<String>();
    format!("{prefix}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_debug_redacts_password() {
        let settings = ConnectionSettings {
            password: "hunter2".to_string(),
            ..ConnectionSettings::default()
        };
        let rendered = format!("{settings:?}");

        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("vehicles"));
    }

    #[test]
    fn excerpt_flattens_and_truncates() {
        assert_eq!(excerpt("SELECT 1\n  FROM t"), "SELECT 1 FROM t");
        let long = format!("SELECT {}", "x, ".repeat(60));
        let shortened = excerpt(&long);
        assert_eq!(shortened.chars().count(), 80);
        assert!(shortened.ends_with("..."));
    }

    #[test]
    fn unicode_collation_orders_case_insensitively() {
        assert_eq!(unicode_ci_compare("Фильтр", "фильтр"), Ordering::Less);
        assert_eq!(unicode_ci_compare("абв", "Где"), Ordering::Less);
    }
}
