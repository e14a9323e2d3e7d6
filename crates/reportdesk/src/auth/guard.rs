use crate::auth::{PermissionSet, Principal};
use crate::error::{
    ConsoleError, NOTICE_AUTHENTICATION_REQUIRED, NOTICE_FORBIDDEN, NOTICE_REPORTS_FORBIDDEN,
};
use crate::notice::Notice;
use crate::routes::Route;

/// Outcome of a permission check. Pure function of principal and requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    DenyUnauthenticated {
        return_to: String,
        notice: Notice,
    },
    DenyForbidden {
        required: PermissionSet,
        redirect_to: String,
        notice: Notice,
        message: &'static str,
    },
}

impl Decision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    #[must_use]
    pub fn notice(&self) -> Option<&Notice> {
        match self {
            Self::Allow => None,
            Self::DenyUnauthenticated { notice, .. } | Self::DenyForbidden { notice, .. } => {
                Some(notice)
            }
        }
    }

    pub fn into_result(self) -> Result<(), ConsoleError> {
        match self {
            Self::Allow => Ok(()),
            Self::DenyUnauthenticated { return_to, .. } => {
                Err(ConsoleError::AuthenticationRequired { return_to })
            }
            Self::DenyForbidden {
                required, message, ..
            } => Err(ConsoleError::AuthorizationDenied { required, message }),
        }
    }
}

/// An empty `required` set admits any authenticated principal.
#[must_use]
pub fn require(
    principal: Option<&Principal>,
    required: &PermissionSet,
    requested_path: &str,
) -> Decision {
    evaluate(principal, required, requested_path, NOTICE_FORBIDDEN)
}

/// Same check with the section-level denial message.
#[must_use]
pub fn require_section(
    principal: Option<&Principal>,
    required: &PermissionSet,
    requested_path: &str,
) -> Decision {
    evaluate(principal, required, requested_path, NOTICE_REPORTS_FORBIDDEN)
}

fn evaluate(
    principal: Option<&Principal>,
    required: &PermissionSet,
    requested_path: &str,
    forbidden_message: &'static str,
) -> Decision {
    let Some(principal) = principal else {
        return Decision::DenyUnauthenticated {
            return_to: requested_path.to_string(),
            notice: Notice::warning(NOTICE_AUTHENTICATION_REQUIRED),
        };
    };

    if !required.is_empty() && !principal.has_any(required) {
        return Decision::DenyForbidden {
            required: required.clone(),
            redirect_to: Route::Menu.path(),
            notice: Notice::error(forbidden_message),
            message: forbidden_message,
        };
    }

    Decision::Allow
}
