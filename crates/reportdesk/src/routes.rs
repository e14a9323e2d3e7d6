use serde::Serialize;

use crate::auth::{Decision, Permission, PermissionSet, Principal, require, require_section};

/// Every addressable operation of the console and the grants it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Menu,
    Login,
    Logout,
    QueryIndex,
    CatalogQuery(&'static str),
    ReportsEntry,
    ReportsList,
    ReportView(String),
    ReportCreate,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    pub title: &'static str,
    pub path: String,
}

impl Route {
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Menu => "/".to_string(),
            Self::Login => "/auth/login".to_string(),
            Self::Logout => "/auth/logout".to_string(),
            Self::QueryIndex => "/query/".to_string(),
            Self::CatalogQuery(segment) => format!("/query/{segment}"),
            Self::ReportsEntry => "/reports/".to_string(),
            Self::ReportsList => "/reports/list".to_string(),
            Self::ReportView(id) => format!("/reports/view/{id}"),
            Self::ReportCreate => "/reports/create".to_string(),
            Self::Admin => "/admin".to_string(),
        }
    }

    /// Login path carrying the return target as a form-encoded `next` value.
    #[must_use]
    pub fn login_with_next(next: &str) -> String {
        let encoded = url::form_urlencoded::byte_serialize(next.as_bytes()).collect::<String>();
        format!("{}?next={encoded}", Self::Login.path())
    }

    /// `None` marks a public route; an empty set means "any principal".
    #[must_use]
    pub fn required_permissions(&self) -> Option<PermissionSet> {
        match self {
            Self::Login | Self::Logout => None,
            Self::Menu | Self::ReportsEntry => Some(PermissionSet::new()),
            Self::QueryIndex | Self::CatalogQuery(_) => {
                Some(PermissionSet::from([Permission::Queries]))
            }
            Self::ReportsList | Self::ReportView(_) => {
                Some(PermissionSet::from([Permission::ReportsView]))
            }
            Self::ReportCreate => Some(PermissionSet::from([Permission::ReportsCreate])),
            Self::Admin => Some(PermissionSet::from([Permission::Admin])),
        }
    }

    #[must_use]
    pub fn in_reports_section(&self) -> bool {
        matches!(
            self,
            Self::ReportsEntry | Self::ReportsList | Self::ReportView(_) | Self::ReportCreate
        )
    }

    #[must_use]
    pub fn reports_section_permissions() -> PermissionSet {
        PermissionSet::from([Permission::ReportsView, Permission::ReportsCreate])
    }
}

/// Section guard first (reports routes only), then the route's own guard.
#[must_use]
pub fn authorize(principal: Option<&Principal>, route: &Route) -> Decision {
    let Some(required) = route.required_permissions() else {
        return Decision::Allow;
    };
    let path = route.path();

    if route.in_reports_section() {
        let section = require_section(principal, &Route::reports_section_permissions(), &path);
        if !section.is_allowed() {
            return section;
        }
    }

    require(principal, &required, &path)
}

/// Where the reports entry point sends the principal.
#[must_use]
pub fn reports_entry_target(principal: &Principal) -> Option<Route> {
    if principal.has(Permission::ReportsView) {
        Some(Route::ReportsList)
    } else if principal.has(Permission::ReportsCreate) {
        Some(Route::ReportCreate)
    } else {
        None
    }
}

#[must_use]
pub fn menu_items(principal: &Principal) -> Vec<MenuItem> {
    let candidates = [
        ("Queries", Route::QueryIndex),
        ("Reports", Route::ReportsEntry),
        ("Create report", Route::ReportCreate),
        ("Administration", Route::Admin),
        ("Sign out", Route::Logout),
    ];

    candidates
        .into_iter()
        .filter(|(_, route)| authorize(Some(principal), route).is_allowed())
        .filter(|(_, route)| {
            *route != Route::ReportsEntry || reports_entry_target(principal).is_some()
        })
        .map(|(title, route)| MenuItem {
            title,
            path: route.path(),
        })
        .collect()
}
