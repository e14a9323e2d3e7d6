use anyhow::Result;
use serde_json::json;

use super::{CommandContext, console_failure, print_envelope};
use crate::models::ResponseEnvelope;

pub fn run(context: &CommandContext) -> Result<()> {
    let (console, principal) = context.open_console()?;
    let overview = console
        .admin_overview(principal.as_ref())
        .map_err(|error| console_failure("admin", &error))?;

    let envelope = ResponseEnvelope::ok("admin", json!(overview))
        .with_meta("account_count", json!(overview.accounts.len()))
        .with_meta("template_count", json!(overview.templates.len()))
        .with_meta("database_path", json!(context.paths.database_path))
        .with_meta("database_host", json!(context.settings.host))
        .with_meta("database_port", json!(context.settings.port));
    print_envelope(&envelope)
}
