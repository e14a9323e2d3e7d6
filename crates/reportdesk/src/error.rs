use serde::Serialize;
use thiserror::Error;

use crate::auth::PermissionSet;
use crate::db::DbError;
use crate::notice::Notice;
use crate::reports::StoreError;
use crate::routes::Route;

pub const NOTICE_AUTHENTICATION_REQUIRED: &str = "Authentication required.";
pub const NOTICE_FORBIDDEN: &str = "Insufficient rights for the selected action.";
pub const NOTICE_REPORTS_FORBIDDEN: &str = "Insufficient rights for the reports section.";

/// Malformed user input. Always recoverable by re-rendering the form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Report id, title and SQL must be filled in.")]
    MissingReportFields,

    #[error("A report with id `{0}` already exists.")]
    DuplicateReportId(String),

    #[error("Parameters must be a JSON list of objects with a `name`: {0}")]
    MalformedParams(String),

    #[error("Report `{0}` has no SQL text.")]
    EmptyReportSql(String),

    #[error("Invalid price range: {0}")]
    PriceRange(String),

    #[error("Invalid value for `{field}`: {reason}")]
    InvalidField { field: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AuthenticationRequired,
    AuthorizationDenied,
    Validation,
    Database,
    NotFound,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::AuthenticationRequired => "authentication_required",
            Self::AuthorizationDenied => "authorization_denied",
            Self::Validation => "validation_failed",
            Self::Database => "database_failure",
            Self::NotFound => "not_found",
            Self::Internal => "internal_failure",
        }
    }
}

/// Failure of a console operation, handled at the boundary of that operation.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("authentication required to open {return_to}")]
    AuthenticationRequired { return_to: String },

    #[error("permission denied: requires one of [{}]", crate::auth::display_permissions(.required))]
    AuthorizationDenied {
        required: PermissionSet,
        message: &'static str,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("database failure while running {context}")]
    Database {
        context: String,
        #[source]
        source: DbError,
    },

    #[error("{resource} `{id}` not found")]
    NotFound { resource: &'static str, id: String },

    #[error(transparent)]
    Storage(StoreError),
}

impl From<StoreError> for ConsoleError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Invalid(validation) => Self::Validation(validation),
            other => Self::Storage(other),
        }
    }
}

impl ConsoleError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthenticationRequired { .. } => ErrorKind::AuthenticationRequired,
            Self::AuthorizationDenied { .. } => ErrorKind::AuthorizationDenied,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Database { .. } => ErrorKind::Database,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Storage(_) => ErrorKind::Internal,
        }
    }

    #[must_use]
    pub fn notice(&self) -> Notice {
        match self {
            Self::AuthenticationRequired { .. } => Notice::warning(NOTICE_AUTHENTICATION_REQUIRED),
            Self::AuthorizationDenied { message, .. } => Notice::error(*message),
            Self::Validation(error) => Notice::error(error.to_string()),
            Self::Database { context, .. } => Notice::error(format!("Failed to run {context}.")),
            Self::NotFound { resource, .. } => Notice::error(format!("{} not found.", capitalize(resource))),
            Self::Storage(_) => Notice::error("Report storage is unavailable."),
        }
    }

    /// Where the caller should send the user after showing the notice.
    #[must_use]
    pub fn redirect(&self) -> Option<String> {
        match self {
            Self::AuthenticationRequired { return_to } => Some(Route::login_with_next(return_to)),
            Self::AuthorizationDenied { .. } => Some(Route::Menu.path()),
            Self::NotFound { resource, .. } if *resource == "report" => {
                Some(Route::ReportsList.path())
            }
            Self::NotFound { .. } => Some(Route::QueryIndex.path()),
            Self::Validation(ValidationError::EmptyReportSql(_)) => Some(Route::ReportsList.path()),
            Self::Validation(_) | Self::Database { .. } | Self::Storage(_) => None,
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
