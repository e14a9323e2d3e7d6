use anyhow::{Error, Result};
use clap::Args;
use serde_json::json;

use super::{CommandContext, console_failure, print_envelope};
use crate::auth::{LoginForm, authenticate};
use crate::error::ErrorKind;
use crate::models::{CommandFailure, ResponseEnvelope};
use crate::notice::Notice;
use crate::routes::Route;

#[derive(Debug, Clone, Args)]
pub struct LoginArgs {
    #[arg(long, default_value = "")]
    pub login: String,

    #[arg(long, env = "REPORTDESK_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    /// Path to continue to after signing in.
    #[arg(long, value_name = "PATH")]
    pub next: Option<String>,
}

pub fn run_login(args: &LoginArgs, context: &CommandContext) -> Result<()> {
    let directory = context.directory()?;
    let form = LoginForm {
        login: args.login.clone(),
        password: args.password.clone(),
        next: args.next.clone(),
    };

    match authenticate(&directory, &form) {
        Ok(success) => {
            context.session().save(&success.principal)?;
            let envelope = ResponseEnvelope::ok("login", json!({ "principal": success.principal }))
                .with_notice(success.notice)
                .with_redirect(success.redirect_to);
            print_envelope(&envelope)
        }
        Err(rejected) => {
            let mut envelope = ResponseEnvelope::error(
                "login",
                rejected.failure.code(),
                rejected.failure.to_string(),
            )
            .with_data(json!({ "login": rejected.login_value }))
            .with_notice(rejected.notice())
            .with_redirect(Route::Login.path());
            if let Some(next) = &args.next {
                envelope = envelope.with_meta("next", json!(next));
            }
            Err(Error::new(CommandFailure::new(
                ErrorKind::AuthenticationRequired,
                envelope,
            )))
        }
    }
}

pub fn run_logout(context: &CommandContext) -> Result<()> {
    context.session().clear()?;
    let envelope = ResponseEnvelope::ok("logout", json!({}))
        .with_notice(Notice::info("Signed out."))
        .with_redirect(Route::Login.path());
    print_envelope(&envelope)
}

pub fn run_whoami(context: &CommandContext) -> Result<()> {
    let directory = context.directory()?;
    let principal = context.session().load(&directory)?;
    let envelope = ResponseEnvelope::ok(
        "whoami",
        json!({
            "authenticated": principal.is_some(),
            "principal": principal,
        }),
    )
    .with_meta("session_path", json!(context.paths.session_path));
    print_envelope(&envelope)
}

pub fn run_menu(context: &CommandContext) -> Result<()> {
    let (console, principal) = context.open_console()?;
    let items = console
        .menu(principal.as_ref())
        .map_err(|error| console_failure("menu", &error))?;
    let envelope = ResponseEnvelope::ok("menu", json!({ "items": items }));
    print_envelope(&envelope)
}
