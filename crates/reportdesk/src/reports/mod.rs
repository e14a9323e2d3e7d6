//! User-authored report definitions and their JSON-file store.

pub mod store;
pub mod view;

use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

pub use store::{ReportStore, StoreError};
pub use view::{ParamValue, ViewPlan, ViewRequest, plan_view};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReportParam {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl ReportParam {
    #[must_use]
    pub fn new(name: impl Into<String>, default: Option<&str>) -> Self {
        Self {
            name: name.into(),
            default: default.map(ToString::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReportDefinition {
    pub id: String,
    pub title: String,

    #[serde(default)]
    pub description: String,

    pub sql: String,

    #[serde(default)]
    pub params: Vec<ReportParam>,
}

/// How the creation form supplied its parameter list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ParamsInput {
    #[default]
    None,
    Structured(Vec<ReportParam>),
    Json(String),
}

/// Submitted creation form, validated by [`ReportDraft::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportDraft {
    pub id: String,
    pub title: String,
    pub description: String,
    pub sql: String,
    pub params: ParamsInput,
}

impl ReportDraft {
    /// Field-level checks; id uniqueness is checked by the store.
    pub fn validate(&self) -> Result<ReportDefinition, ValidationError> {
        let id = self.id.trim();
        let title = self.title.trim();
        let sql = self.sql.trim();
        if id.is_empty() || title.is_empty() || sql.is_empty() {
            return Err(ValidationError::MissingReportFields);
        }

        let params = match &self.params {
            ParamsInput::None => Vec::new(),
            ParamsInput::Structured(params) => params.clone(),
            ParamsInput::Json(raw) if raw.trim().is_empty() => Vec::new(),
            ParamsInput::Json(raw) => parse_params_json(raw)?,
        };
        check_param_names(&params)?;

        Ok(ReportDefinition {
            id: id.to_string(),
            title: title.to_string(),
            description: self.description.trim().to_string(),
            sql: sql.to_string(),
            params,
        })
    }
}

/// Parses `[{"name": ..., "default": ...}, ...]`. Anything else is rejected
/// rather than silently dropped.
pub fn parse_params_json(raw: &str) -> Result<Vec<ReportParam>, ValidationError> {
    let malformed = |reason: String| ValidationError::MalformedParams(reason);

    let parsed = serde_json::from_str::<Value>(raw.trim())
        .map_err(|error| malformed(format!("invalid JSON ({error})")))?;
    let Value::Array(items) = parsed else {
        return Err(malformed("expected a JSON list".to_string()));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let Value::Object(fields) = item else {
                return Err(malformed(format!("entry {index} is not an object")));
            };
            let name = match fields.get("name") {
                Some(Value::String(name)) => name.trim().to_string(),
                Some(_) => return Err(malformed(format!("entry {index}: `name` must be a string"))),
                None => return Err(malformed(format!("entry {index} has no `name`"))),
            };
            let default = match fields.get("default") {
                None | Some(Value::Null) => None,
                Some(Value::String(default)) => Some(default.clone()),
                Some(_) => {
                    return Err(malformed(format!(
                        "entry {index}: `default` must be a string"
                    )));
                }
            };
            Ok(ReportParam { name, default })
        })
        .collect()
}

fn check_param_names(params: &[ReportParam]) -> Result<(), ValidationError> {
    let mut seen = BTreeSet::new();
    for param in params {
        if param.name.trim().is_empty() {
            return Err(ValidationError::MalformedParams(
                "parameter names must not be empty".to_string(),
            ));
        }
        if !seen.insert(param.name.as_str()) {
            return Err(ValidationError::MalformedParams(format!(
                "parameter `{}` is declared twice",
                param.name
            )));
        }
    }
    Ok(())
}

/// JSON schema of the persisted store (a list of definitions).
#[must_use]
pub fn store_json_schema() -> Value {
    let schema = schemars::schema_for!(Vec<ReportDefinition>);
    match serde_json::to_value(schema) {
        Ok(value) => value,
        Err(error) => {
            panic!("failed to serialize generated report store schema: {error}");
        }
    }
}
