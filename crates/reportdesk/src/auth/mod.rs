//! Staff directory, principals and the login flow.

pub mod guard;
pub mod session;

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::notice::Notice;
use crate::routes::Route;

pub use guard::{Decision, require, require_section};
pub use session::SessionStore;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Queries,
    ReportsView,
    ReportsCreate,
    Admin,
}

impl Permission {
    pub const ALL: [Permission; 4] = [
        Permission::Queries,
        Permission::ReportsView,
        Permission::ReportsCreate,
        Permission::Admin,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queries => "queries",
            Self::ReportsView => "reports_view",
            Self::ReportsCreate => "reports_create",
            Self::Admin => "admin",
        }
    }
}

impl Display for Permission {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|permission| permission.as_str() == value)
            .with_context(|| format!("unknown permission `{value}`"))
    }
}

pub type PermissionSet = BTreeSet<Permission>;

#[must_use]
pub fn display_permissions(permissions: &PermissionSet) -> String {
    permissions
        .iter()
        .map(|permission| permission.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Authenticated identity carried by a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub login: String,
    pub role: String,
    pub permissions: PermissionSet,
}

impl Principal {
    #[must_use]
    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    #[must_use]
    pub fn has_any(&self, required: &PermissionSet) -> bool {
        !self.permissions.is_disjoint(required)
    }
}

/// Directory entry: a login with its stored secret, role and grants.
#[derive(Clone, Deserialize)]
pub struct Credential {
    pub login: String,
    password: String,
    pub role: String,
    pub permissions: PermissionSet,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .field("permissions", &self.permissions)
            .finish()
    }
}

impl Credential {
    #[must_use]
    pub fn new(
        login: impl Into<String>,
        password: impl Into<String>,
        role: impl Into<String>,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
            role: role.into(),
            permissions: permissions.into_iter().collect(),
        }
    }

    /// Exact, case-sensitive comparison against the stored plaintext secret.
    #[must_use]
    pub fn verify_password(&self, candidate: &str) -> bool {
        self.password == candidate
    }

    #[must_use]
    pub fn principal(&self) -> Principal {
        Principal {
            login: self.login.clone(),
            role: self.role.clone(),
            permissions: self.permissions.clone(),
        }
    }
}

pub trait CredentialStore {
    /// Case-insensitive lookup on the login.
    fn lookup(&self, login: &str) -> Option<Credential>;

    /// Every account in the directory, without secrets.
    fn accounts(&self) -> Vec<Principal>;
}

#[derive(Debug, Clone)]
pub struct UserDirectory {
    entries: Vec<Credential>,
}

impl UserDirectory {
    pub fn new(entries: Vec<Credential>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for entry in &entries {
            let normalized = entry.login.trim().to_lowercase();
            if normalized.is_empty() {
                bail!("user directory contains an entry with an empty login");
            }
            if !seen.insert(normalized) {
                bail!("user directory contains duplicate login `{}`", entry.login);
            }
        }
        Ok(Self { entries })
    }

    /// Seed accounts shipped with the console.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            entries: vec![
                Credential::new("dispatcher", "disp123", "диспетчер", [Permission::Queries]),
                Credential::new(
                    "manager",
                    "boss123",
                    "начальник",
                    [Permission::Queries, Permission::ReportsView],
                ),
                Credential::new("admin", "admin123", "администратор", Permission::ALL),
            ],
        }
    }

    /// Loads a JSON array of `{login, password, role, permissions}` objects.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let input = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read user directory: {}", path.display()))?;
        let entries = serde_json::from_str::<Vec<Credential>>(&input)
            .with_context(|| format!("failed to parse user directory: {}", path.display()))?;
        Self::new(entries)
            .with_context(|| format!("invalid user directory: {}", path.display()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CredentialStore for UserDirectory {
    fn lookup(&self, login: &str) -> Option<Credential> {
        let normalized = login.to_lowercase();
        self.entries
            .iter()
            .find(|entry| entry.login.to_lowercase() == normalized)
            .cloned()
    }

    fn accounts(&self) -> Vec<Principal> {
        self.entries.iter().map(Credential::principal).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub login: String,
    pub password: String,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoginFailure {
    #[error("Enter a login and a password.")]
    EmptyFields,

    #[error("No user with this login was found.")]
    UnknownUser,

    #[error("Wrong password. Try again.")]
    WrongPassword,
}

impl LoginFailure {
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::EmptyFields => "login_fields_empty",
            Self::UnknownUser => "login_unknown_user",
            Self::WrongPassword => "login_wrong_password",
        }
    }
}

/// Rejected attempt; `login_value` is echoed back into the login form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRejected {
    pub failure: LoginFailure,
    pub login_value: String,
}

impl LoginRejected {
    #[must_use]
    pub fn notice(&self) -> Notice {
        Notice::error(self.failure.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSuccess {
    pub principal: Principal,
    pub redirect_to: String,
    pub notice: Notice,
}

pub fn authenticate(
    store: &dyn CredentialStore,
    form: &LoginForm,
) -> std::result::Result<LoginSuccess, LoginRejected> {
    let login_value = form.login.trim().to_string();
    let reject = |failure| LoginRejected {
        failure,
        login_value: login_value.clone(),
    };

    if login_value.is_empty() || form.password.is_empty() {
        return Err(reject(LoginFailure::EmptyFields));
    }

    let Some(credential) = store.lookup(&login_value) else {
        warn!(login = %login_value, "login rejected: unknown user");
        return Err(reject(LoginFailure::UnknownUser));
    };
    if !credential.verify_password(&form.password) {
        warn!(login = %credential.login, "login rejected: wrong password");
        return Err(reject(LoginFailure::WrongPassword));
    }

    let redirect_to = form
        .next
        .as_deref()
        .map(str::trim)
        .filter(|next| !next.is_empty())
        .map_or_else(|| Route::Menu.path(), ToString::to_string);
    info!(login = %credential.login, role = %credential.role, "login succeeded");

    Ok(LoginSuccess {
        principal: credential.principal(),
        redirect_to,
        notice: Notice::success("Signed in."),
    })
}
