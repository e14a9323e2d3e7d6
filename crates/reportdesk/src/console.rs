//! Operation layer: every console action takes the request's principal (or
//! its absence) explicitly, runs its guard, then does its work.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::auth::{CredentialStore, LoginForm, LoginRejected, LoginSuccess, Principal, authenticate};
use crate::catalog::{CATALOG, CatalogEntry, CatalogInput, Dispatch, find_entry};
use crate::db::{Database, ResultSet};
use crate::error::{ConsoleError, ValidationError};
use crate::notice::Notice;
use crate::reports::{ParamValue, ReportDefinition, ReportDraft, ReportStore, ViewRequest, plan_view};
use crate::routes::{MenuItem, Route, authorize, menu_items, reports_entry_target};
use crate::sql::SqlTemplateRegistry;

#[derive(Debug, Clone, Serialize)]
pub struct CatalogRun {
    pub key: &'static str,
    pub title: &'static str,
    pub criteria: BTreeMap<String, Value>,
    pub result: ResultSet,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportView {
    pub report: ReportDefinition,
    pub values: Vec<ParamValue>,
    /// Absent when only the parameter form is shown or execution failed.
    pub result: Option<ResultSet>,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminOverview {
    pub accounts: Vec<Principal>,
    pub templates: Vec<String>,
    pub report_store: PathBuf,
    pub report_count: usize,
}

pub struct Console {
    directory: Box<dyn CredentialStore + Send + Sync>,
    templates: SqlTemplateRegistry,
    database: Database,
    reports: ReportStore,
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("templates", &self.templates.len())
            .field("database", &self.database)
            .field("reports", &self.reports)
            .finish_non_exhaustive()
    }
}

impl Console {
    #[must_use]
    pub fn new(
        directory: Box<dyn CredentialStore + Send + Sync>,
        templates: SqlTemplateRegistry,
        database: Database,
        reports: ReportStore,
    ) -> Self {
        Self {
            directory,
            templates,
            database,
            reports,
        }
    }

    #[must_use]
    pub fn directory(&self) -> &dyn CredentialStore {
        self.directory.as_ref()
    }

    pub fn login(&self, form: &LoginForm) -> Result<LoginSuccess, LoginRejected> {
        authenticate(self.directory.as_ref(), form)
    }

    pub fn menu(&self, principal: Option<&Principal>) -> Result<Vec<MenuItem>, ConsoleError> {
        let principal = guarded(principal, &Route::Menu)?;
        Ok(menu_items(principal))
    }

    pub fn catalog(
        &self,
        principal: Option<&Principal>,
    ) -> Result<&'static [CatalogEntry], ConsoleError> {
        guarded(principal, &Route::QueryIndex)?;
        Ok(CATALOG)
    }

    /// Runs a predefined query. Input validation happens before the
    /// connection is opened; database failures abort the operation.
    pub fn run_catalog(
        &self,
        principal: Option<&Principal>,
        key: &str,
        input: &CatalogInput,
    ) -> Result<CatalogRun, ConsoleError> {
        let entry = match find_entry(key) {
            Some(entry) => {
                guarded(principal, &entry.route())?;
                entry
            }
            None => {
                guarded(principal, &Route::QueryIndex)?;
                return Err(ConsoleError::NotFound {
                    resource: "catalog entry",
                    id: key.to_string(),
                });
            }
        };

        let prepared = entry.prepare(input)?;
        let sql = self
            .templates
            .get(entry.template)
            .ok_or_else(|| {
                error!(catalog_key = entry.key, template = entry.template, "sql template missing");
                ConsoleError::NotFound {
                    resource: "query template",
                    id: entry.key.to_string(),
                }
            })?;

        let context = format!("query `{}`", entry.key);
        let result = self
            .database
            .with_session(|session| match entry.dispatch {
                Dispatch::Single => session.execute_query(sql, &prepared.params),
                Dispatch::Sequential => session.execute_script(sql, &prepared.params),
            })
            .map_err(|source| {
                error!(catalog_key = entry.key, error = %source, "catalog query failed");
                ConsoleError::Database { context, source }
            })?;
        info!(catalog_key = entry.key, rows = result.len(), "catalog query completed");

        Ok(CatalogRun {
            key: entry.key,
            title: entry.title,
            criteria: prepared.criteria,
            result,
        })
    }

    pub fn reports_entry(&self, principal: Option<&Principal>) -> Result<Route, ConsoleError> {
        let principal = guarded(principal, &Route::ReportsEntry)?;
        reports_entry_target(principal).ok_or(ConsoleError::AuthorizationDenied {
            required: Route::reports_section_permissions(),
            message: crate::error::NOTICE_REPORTS_FORBIDDEN,
        })
    }

    pub fn list_reports(
        &self,
        principal: Option<&Principal>,
    ) -> Result<Vec<ReportDefinition>, ConsoleError> {
        guarded(principal, &Route::ReportsList)?;
        Ok(self.reports.list()?)
    }

    /// Opens a report: either the parameter form alone or the executed result.
    /// Execution failures are reported on the view instead of aborting it.
    pub fn view_report(
        &self,
        principal: Option<&Principal>,
        id: &str,
        request: &ViewRequest,
    ) -> Result<ReportView, ConsoleError> {
        guarded(principal, &Route::ReportView(id.to_string()))?;
        let report = self.reports.find(id)?.ok_or_else(|| ConsoleError::NotFound {
            resource: "report",
            id: id.to_string(),
        })?;

        let plan = plan_view(&report, request);
        if !plan.execute {
            return Ok(ReportView {
                report,
                values: plan.values,
                result: None,
                notices: Vec::new(),
            });
        }
        if report.sql.trim().is_empty() {
            return Err(ValidationError::EmptyReportSql(report.id).into());
        }

        let params = plan.query_params();
        let outcome = self
            .database
            .with_session(|session| session.execute_script(&report.sql, &params));
        let (result, notices) = match outcome {
            Ok(result) => {
                info!(report_id = %report.id, rows = result.len(), "report executed");
                (Some(result), Vec::new())
            }
            Err(source) => {
                error!(report_id = %report.id, error = %source, "report execution failed");
                let failure = ConsoleError::Database {
                    context: format!("report `{}`", report.id),
                    source,
                };
                (None, vec![failure.notice()])
            }
        };

        Ok(ReportView {
            report,
            values: plan.values,
            result,
            notices,
        })
    }

    pub fn create_report(
        &self,
        principal: Option<&Principal>,
        draft: &ReportDraft,
    ) -> Result<ReportDefinition, ConsoleError> {
        let principal = guarded(principal, &Route::ReportCreate)?;
        let definition = self.reports.create(draft)?;
        info!(report_id = %definition.id, author = %principal.login, "report created");
        Ok(definition)
    }

    pub fn admin_overview(
        &self,
        principal: Option<&Principal>,
    ) -> Result<AdminOverview, ConsoleError> {
        guarded(principal, &Route::Admin)?;
        Ok(AdminOverview {
            accounts: self.directory.accounts(),
            templates: self.templates.names().map(ToString::to_string).collect(),
            report_store: self.reports.path().to_path_buf(),
            report_count: self.reports.list()?.len(),
        })
    }
}

/// Runs the route guard and hands back the admitted principal.
fn guarded<'a>(
    principal: Option<&'a Principal>,
    route: &Route,
) -> Result<&'a Principal, ConsoleError> {
    authorize(principal, route).into_result()?;
    principal.ok_or_else(|| ConsoleError::AuthenticationRequired {
        return_to: route.path(),
    })
}
