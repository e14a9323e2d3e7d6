use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::{ConsoleError, ErrorKind};
use crate::notice::Notice;

pub const RESPONSE_ENVELOPE_SCHEMA_VERSION: &str = "reportdesk.response.v1";

pub type ResponseMeta = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: String,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Rendered outcome of one console command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub ok: bool,
    pub command: String,
    pub generated_at_utc: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    pub meta: ResponseMeta,
    pub notices: Vec<Notice>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl ResponseEnvelope {
    #[must_use]
    pub fn ok(command: impl Into<String>, data: Value) -> Self {
        Self::base(command, true).with_data(data)
    }

    #[must_use]
    pub fn error(
        command: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut envelope = Self::base(command, false);
        envelope.error = Some(ResponseError {
            code: code.into(),
            message: message.into(),
            details: None,
        });
        envelope
    }

    /// Error envelope carrying the failure's notice and follow-up location.
    #[must_use]
    pub fn from_console_error(command: impl Into<String>, error: &ConsoleError) -> Self {
        let mut envelope = Self::error(command, error.kind().code(), error.to_string())
            .with_notice(error.notice());
        envelope.redirect = error.redirect();
        if let Some(cause) = std::error::Error::source(error) {
            envelope = envelope.with_error_details(json!({ "cause": cause.to_string() }));
        }
        envelope
    }

    fn base(command: impl Into<String>, ok: bool) -> Self {
        let mut meta = ResponseMeta::new();
        meta.insert(
            "schema_version".to_string(),
            json!(RESPONSE_ENVELOPE_SCHEMA_VERSION),
        );

        Self {
            ok,
            command: command.into(),
            generated_at_utc: generated_at_utc_now(),
            data: None,
            meta,
            notices: Vec::new(),
            redirect: None,
            error: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_notice(mut self, notice: Notice) -> Self {
        self.notices.push(notice);
        self
    }

    #[must_use]
    pub fn with_notices(mut self, notices: impl IntoIterator<Item = Notice>) -> Self {
        self.notices.extend(notices);
        self
    }

    #[must_use]
    pub fn with_redirect(mut self, path: impl Into<String>) -> Self {
        self.redirect = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_error_details(mut self, details: Value) -> Self {
        if let Some(error) = self.error.as_mut() {
            error.details = Some(details);
        }
        self
    }
}

/// Failed command: the envelope to print plus the class used for the exit code.
#[derive(Debug, Clone)]
pub struct CommandFailure {
    kind: ErrorKind,
    envelope: ResponseEnvelope,
}

impl CommandFailure {
    #[must_use]
    pub fn new(kind: ErrorKind, envelope: ResponseEnvelope) -> Self {
        Self { kind, envelope }
    }

    #[must_use]
    pub fn from_console_error(command: &str, error: &ConsoleError) -> Self {
        Self::new(
            error.kind(),
            ResponseEnvelope::from_console_error(command, error),
        )
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn envelope(&self) -> &ResponseEnvelope {
        &self.envelope
    }
}

impl Display for CommandFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(&self.envelope) {
            Ok(encoded) => f.write_str(&encoded),
            Err(_) => f.write_str("response envelope serialization failure"),
        }
    }
}

impl std::error::Error for CommandFailure {}

fn generated_at_utc_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
