use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use reportdesk::auth::{
    Credential, CredentialStore, LoginFailure, LoginForm, Permission, Principal, SessionStore,
    UserDirectory,
};
use reportdesk::console::Console;
use reportdesk::db::{ConnectionSettings, Database};
use reportdesk::error::{ErrorKind, NOTICE_FORBIDDEN, NOTICE_REPORTS_FORBIDDEN};
use reportdesk::reports::ReportStore;
use reportdesk::routes::Route;
use reportdesk::sql::SqlTemplateRegistry;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}-{nanos}"))
}

fn console(prefix: &str) -> Console {
    let dir = unique_temp_dir(prefix);
    Console::new(
        Box::new(UserDirectory::builtin()),
        SqlTemplateRegistry::from_pairs([("products", "SELECT 1 AS x")]),
        Database::new(ConnectionSettings::default(), dir.join("vehicles.sqlite")),
        ReportStore::new(dir.join("reports.json")),
    )
}

fn builtin(login: &str) -> Principal {
    UserDirectory::builtin()
        .lookup(login)
        .expect("builtin account exists")
        .principal()
}

fn login(console: &Console, login: &str, password: &str) -> Result<Principal, LoginFailure> {
    console
        .login(&LoginForm {
            login: login.to_string(),
            password: password.to_string(),
            next: None,
        })
        .map(|success| success.principal)
        .map_err(|rejected| rejected.failure)
}

#[test]
fn login_is_case_insensitive_on_login_only() {
    let console = console("reportdesk-access-login");

    let admin = login(&console, "Admin", "admin123").expect("mixed-case login should succeed");
    assert_eq!(admin.login, "admin");
    assert_eq!(admin.permissions.len(), Permission::ALL.len());

    assert_eq!(
        login(&console, "admin", "ADMIN123"),
        Err(LoginFailure::WrongPassword)
    );
    assert_eq!(login(&console, "ghost", "x"), Err(LoginFailure::UnknownUser));
    assert_eq!(login(&console, " ", "x"), Err(LoginFailure::EmptyFields));
}

#[test]
fn repeated_login_yields_equivalent_principal() {
    let console = console("reportdesk-access-idempotent");

    let first = login(&console, "manager", "boss123").expect("first login");
    let second = login(&console, "manager", "boss123").expect("second login");
    assert_eq!(first, second);
}

#[test]
fn anonymous_caller_is_sent_to_login_with_return_path() {
    let console = console("reportdesk-access-anonymous");

    let error = console.list_reports(None).expect_err("anonymous must be denied");
    assert_eq!(error.kind(), ErrorKind::AuthenticationRequired);
    assert_eq!(
        error.redirect().as_deref(),
        Some("/auth/login?next=%2Freports%2Flist")
    );

    assert_eq!(
        console.menu(None).expect_err("menu needs a principal").kind(),
        ErrorKind::AuthenticationRequired
    );
}

#[test]
fn dispatcher_is_kept_out_of_reports_section() {
    let console = console("reportdesk-access-dispatcher");
    let dispatcher = builtin("dispatcher");

    let error = console
        .list_reports(Some(&dispatcher))
        .expect_err("dispatcher lacks report rights");
    assert_eq!(error.kind(), ErrorKind::AuthorizationDenied);
    assert_eq!(error.notice().message, NOTICE_REPORTS_FORBIDDEN);
    assert_eq!(error.redirect().as_deref(), Some("/"));

    let error = console
        .reports_entry(Some(&dispatcher))
        .expect_err("dispatcher has no reports entry");
    assert_eq!(error.notice().message, NOTICE_REPORTS_FORBIDDEN);
}

#[test]
fn manager_can_list_but_not_create_or_administer() {
    let console = console("reportdesk-access-manager");
    let manager = builtin("manager");

    assert!(console.list_reports(Some(&manager)).expect("list").is_empty());
    assert_eq!(
        console.reports_entry(Some(&manager)).expect("entry"),
        Route::ReportsList
    );

    let error = console
        .create_report(Some(&manager), &Default::default())
        .expect_err("manager cannot create");
    assert_eq!(error.notice().message, NOTICE_FORBIDDEN);

    let error = console
        .admin_overview(Some(&manager))
        .expect_err("manager is not an admin");
    assert_eq!(error.kind(), ErrorKind::AuthorizationDenied);
}

#[test]
fn author_without_view_rights_enters_at_create() {
    let console = console("reportdesk-access-author");
    let author = Credential::new("author", "pw", "analyst", [Permission::ReportsCreate]).principal();

    assert_eq!(
        console.reports_entry(Some(&author)).expect("entry"),
        Route::ReportCreate
    );
    let error = console
        .list_reports(Some(&author))
        .expect_err("author cannot list");
    assert_eq!(error.notice().message, NOTICE_FORBIDDEN);
}

#[test]
fn menu_reflects_permissions() {
    let console = console("reportdesk-access-menu");

    let titles = |principal: &Principal| {
        console
            .menu(Some(principal))
            .expect("menu")
            .into_iter()
            .map(|item| item.title)
            .collect::<Vec<_>>()
    };

    assert_eq!(titles(&builtin("dispatcher")), vec!["Queries", "Sign out"]);
    assert_eq!(
        titles(&builtin("manager")),
        vec!["Queries", "Reports", "Sign out"]
    );
    assert_eq!(titles(&builtin("admin")).len(), 5);
}

#[test]
fn admin_overview_lists_accounts_without_secrets() {
    let console = console("reportdesk-access-admin");

    let overview = console
        .admin_overview(Some(&builtin("admin")))
        .expect("admin overview");
    assert_eq!(overview.accounts.len(), 3);
    assert_eq!(overview.templates, vec!["products"]);
    assert_eq!(overview.report_count, 0);

    let rendered = serde_json::to_string(&overview).expect("overview serializes");
    assert!(!rendered.contains("admin123"));
    assert!(!rendered.contains("password"));
}

#[test]
fn stored_session_is_dropped_when_directory_revokes_grants() {
    let dir = unique_temp_dir("reportdesk-access-session");
    let session = SessionStore::new(dir.join("session.json"));
    session.save(&builtin("admin")).expect("session saved");

    let demoted = UserDirectory::new(vec![Credential::new(
        "admin",
        "admin123",
        "администратор",
        [Permission::Queries],
    )])
    .expect("directory builds");

    assert!(session.load(&demoted).expect("load").is_none());
    assert_eq!(
        session.load(&UserDirectory::builtin()).expect("load"),
        Some(builtin("admin"))
    );

    session.clear().expect("clear");
    session.clear().expect("clearing twice is fine");
    assert!(session.load(&UserDirectory::builtin()).expect("load").is_none());
}
