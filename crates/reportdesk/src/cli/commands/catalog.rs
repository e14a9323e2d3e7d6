use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::json;

use super::{CommandContext, console_failure, parse_key_value, print_envelope};
use crate::catalog::CatalogInput;
use crate::models::ResponseEnvelope;

#[derive(Debug, Clone, Args)]
pub struct CatalogArgs {
    #[command(subcommand)]
    pub command: CatalogCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CatalogCommand {
    /// List the predefined queries and their inputs.
    List,
    /// Run one predefined query.
    Run(CatalogRunArgs),
}

impl CatalogCommand {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::List => "catalog.list",
            Self::Run(_) => "catalog.run",
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct CatalogRunArgs {
    #[arg(value_name = "KEY")]
    pub key: String,

    /// Form input as NAME=VALUE; repeatable.
    #[arg(long = "param", value_name = "NAME=VALUE", value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,
}

pub fn run(args: &CatalogArgs, context: &CommandContext) -> Result<()> {
    let command = args.command.name();
    let (console, principal) = context.open_console()?;

    match &args.command {
        CatalogCommand::List => {
            let entries = console
                .catalog(principal.as_ref())
                .map_err(|error| console_failure(command, &error))?;
            let listed = entries
                .iter()
                .map(|entry| {
                    json!({
                        "entry": entry,
                        "path": entry.route().path(),
                        "form": entry.is_form(),
                    })
                })
                .collect::<Vec<_>>();
            print_envelope(
                &ResponseEnvelope::ok(command, json!({ "entries": listed }))
                    .with_meta("entry_count", json!(entries.len())),
            )
        }
        CatalogCommand::Run(run_args) => {
            let input = run_args.params.iter().cloned().collect::<CatalogInput>();
            let run = console
                .run_catalog(principal.as_ref(), &run_args.key, &input)
                .map_err(|error| console_failure(command, &error))?;
            let row_count = run.result.len();
            print_envelope(
                &ResponseEnvelope::ok(command, json!(run))
                    .with_meta("row_count", json!(row_count)),
            )
        }
    }
}
