use anyhow::{Error, Result};
use clap::{Args, Subcommand};
use serde_json::json;

use super::{CommandContext, console_failure, into_map, parse_key_value, print_envelope};
use crate::error::ConsoleError;
use crate::models::{CommandFailure, ResponseEnvelope};
use crate::notice::Notice;
use crate::reports::{ParamsInput, ReportDraft, ViewRequest, store_json_schema};
use crate::routes::Route;

#[derive(Debug, Clone, Args)]
pub struct ReportsArgs {
    #[command(subcommand)]
    pub command: ReportsCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ReportsCommand {
    /// Resolve the reports entry point for the current principal.
    Open,
    /// List stored report definitions.
    List,
    /// Show a report's parameter form or run it.
    View(ReportsViewArgs),
    /// Store a new report definition.
    Create(ReportsCreateArgs),
    /// Print the JSON schema of the report store file.
    Schema,
}

impl ReportsCommand {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open => "reports.open",
            Self::List => "reports.list",
            Self::View(_) => "reports.view",
            Self::Create(_) => "reports.create",
            Self::Schema => "reports.schema",
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ReportsViewArgs {
    #[arg(value_name = "ID")]
    pub id: String,

    /// Parameter value as NAME=VALUE; repeatable.
    #[arg(long = "param", value_name = "NAME=VALUE", value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,

    /// Treat the invocation as a submitted parameter form.
    #[arg(long, default_value_t = false)]
    pub submit: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ReportsCreateArgs {
    #[arg(long, default_value = "")]
    pub id: String,

    #[arg(long, default_value = "")]
    pub title: String,

    #[arg(long, default_value = "")]
    pub description: String,

    #[arg(long, default_value = "")]
    pub sql: String,

    /// Parameters as a JSON list of `{"name": ..., "default": ...}` objects.
    #[arg(long, value_name = "JSON")]
    pub params_json: Option<String>,
}

impl ReportsCreateArgs {
    fn draft(&self) -> ReportDraft {
        ReportDraft {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            sql: self.sql.clone(),
            params: self
                .params_json
                .clone()
                .map_or(ParamsInput::None, ParamsInput::Json),
        }
    }
}

pub fn run(args: &ReportsArgs, context: &CommandContext) -> Result<()> {
    let command = args.command.name();

    match &args.command {
        ReportsCommand::Schema => {
            print_envelope(&ResponseEnvelope::ok(command, store_json_schema()))
        }
        ReportsCommand::Open => {
            let (console, principal) = context.open_console()?;
            let target = console
                .reports_entry(principal.as_ref())
                .map_err(|error| console_failure(command, &error))?;
            print_envelope(
                &ResponseEnvelope::ok(command, json!({ "target": target.path() }))
                    .with_redirect(target.path()),
            )
        }
        ReportsCommand::List => {
            let (console, principal) = context.open_console()?;
            let reports = console
                .list_reports(principal.as_ref())
                .map_err(|error| console_failure(command, &error))?;
            print_envelope(
                &ResponseEnvelope::ok(command, json!({ "reports": reports }))
                    .with_meta("report_count", json!(reports.len())),
            )
        }
        ReportsCommand::View(view_args) => {
            let (console, principal) = context.open_console()?;
            let request = ViewRequest {
                values: into_map(&view_args.params),
                submitted: view_args.submit,
            };
            let view = console
                .view_report(principal.as_ref(), &view_args.id, &request)
                .map_err(|error| console_failure(command, &error))?;
            let executed = view.result.is_some();
            print_envelope(
                &ResponseEnvelope::ok(
                    command,
                    json!({
                        "report": view.report,
                        "params": view.values,
                        "result": view.result,
                    }),
                )
                .with_notices(view.notices)
                .with_meta("executed", json!(executed)),
            )
        }
        ReportsCommand::Create(create_args) => {
            let (console, principal) = context.open_console()?;
            let created = console
                .create_report(principal.as_ref(), &create_args.draft())
                .map_err(|error| create_failure(command, create_args, &error))?;
            print_envelope(
                &ResponseEnvelope::ok(command, json!({ "report": created }))
                    .with_notice(Notice::success(format!("Report `{}` created.", created.id)))
                    .with_redirect(Route::ReportView(created.id.clone()).path()),
            )
        }
    }
}

/// Validation failures echo the submitted form back with the message.
fn create_failure(command: &str, args: &ReportsCreateArgs, error: &ConsoleError) -> Error {
    let mut failure = CommandFailure::from_console_error(command, error);
    if matches!(error, ConsoleError::Validation(_)) {
        let envelope = failure.envelope().clone().with_data(json!({
            "submitted": {
                "id": args.id,
                "title": args.title,
                "description": args.description,
                "sql": args.sql,
                "params_json": args.params_json,
            }
        }));
        failure = CommandFailure::new(error.kind(), envelope);
    }
    Error::new(failure)
}
