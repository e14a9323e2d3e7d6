use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use reportdesk::auth::{Credential, CredentialStore, Permission, UserDirectory};
use reportdesk::catalog::{CATALOG, CatalogInput};
use reportdesk::console::Console;
use reportdesk::db::{ConnectionSettings, Database};
use reportdesk::error::{ConsoleError, ErrorKind, ValidationError};
use reportdesk::reports::ReportStore;
use reportdesk::sql::SqlTemplateRegistry;
use serde_json::json;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}-{nanos}"))
}

fn shipped_sql_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("sql")
}

fn console_with_templates(prefix: &str, templates: SqlTemplateRegistry) -> Console {
    let dir = unique_temp_dir(prefix);
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    let db_path = dir.join("vehicles.sqlite");
    let connection = rusqlite::Connection::open(&db_path).expect("fixture database should open");
    connection
        .execute_batch(include_str!("fixtures/vehicles.sql"))
        .expect("fixture schema should load");
    drop(connection);

    Console::new(
        Box::new(UserDirectory::builtin()),
        templates,
        Database::new(ConnectionSettings::default(), db_path),
        ReportStore::new(dir.join("reports.json")),
    )
}

fn console(prefix: &str) -> Console {
    let templates =
        SqlTemplateRegistry::load(&shipped_sql_dir()).expect("shipped templates should load");
    console_with_templates(prefix, templates)
}

fn dispatcher() -> reportdesk::auth::Principal {
    UserDirectory::builtin()
        .lookup("dispatcher")
        .expect("builtin dispatcher exists")
        .principal()
}

fn column(rows: &reportdesk::db::ResultSet, name: &str) -> Vec<serde_json::Value> {
    rows.rows
        .iter()
        .filter_map(|row| row.get(name).cloned())
        .collect()
}

#[test]
fn every_catalog_entry_has_a_shipped_template() {
    let templates =
        SqlTemplateRegistry::load(&shipped_sql_dir()).expect("shipped templates should load");

    assert_eq!(templates.len(), CATALOG.len());
    for entry in CATALOG {
        assert!(
            templates.get(entry.template).is_some(),
            "missing template for {}",
            entry.key
        );
    }
}

#[test]
fn every_catalog_entry_runs_against_the_fixture_schema() {
    let console = console("reportdesk-catalog-all");
    let principal = dispatcher();

    for entry in CATALOG {
        let run = console
            .run_catalog(Some(&principal), entry.key, &CatalogInput::new())
            .unwrap_or_else(|error| panic!("{} failed: {error:?}", entry.key));
        assert_eq!(run.key, entry.key);
        assert!(!run.criteria.is_empty(), "{} echoed no criteria", entry.key);
    }
}

#[test]
fn product_search_matches_cyrillic_substring() {
    let console = console("reportdesk-catalog-search");
    let input = CatalogInput::new()
        .with("name", "колод")
        .with("min_price", "0")
        .with("max_price", "100");

    let run = console
        .run_catalog(Some(&dispatcher()), "search-products", &input)
        .expect("search should run");

    assert_eq!(column(&run.result, "name"), vec![json!("Тормозные колодки")]);
    assert_eq!(run.criteria.get("name"), Some(&json!("колод")));
    assert_eq!(run.criteria.get("max"), Some(&json!(100.0)));
}

#[test]
fn inverted_price_range_fails_before_reaching_the_database() {
    let templates = SqlTemplateRegistry::load(&shipped_sql_dir()).expect("templates should load");
    let dir = unique_temp_dir("reportdesk-catalog-range");
    let console = Console::new(
        Box::new(UserDirectory::builtin()),
        templates,
        Database::new(ConnectionSettings::default(), dir.join("never-created.sqlite")),
        ReportStore::new(dir.join("reports.json")),
    );
    let input = CatalogInput::new()
        .with("min_price", "10")
        .with("max_price", "5");

    let error = console
        .run_catalog(Some(&dispatcher()), "search-products", &input)
        .expect_err("min > max must fail");

    assert!(matches!(
        error,
        ConsoleError::Validation(ValidationError::PriceRange(_))
    ));
}

#[test]
fn text_inputs_fall_back_to_their_defaults() {
    let console = console("reportdesk-catalog-defaults");
    let principal = dispatcher();

    let plates = console
        .run_catalog(Some(&principal), "plates-by-series", &CatalogInput::new().with("series", "  "))
        .expect("plates should run");
    assert_eq!(
        column(&plates.result, "plate_number"),
        vec![json!("HT1234"), json!("HT5678")]
    );

    let staff = console
        .run_catalog(Some(&principal), "contract-staff", &CatalogInput::new())
        .expect("contract staff should run");
    assert_eq!(staff.criteria.get("contract"), Some(&json!("C-1001")));
    assert_eq!(staff.result.len(), 2);
}

#[test]
fn aggregate_queries_compute_expected_values() {
    let console = console("reportdesk-catalog-aggregates");
    let principal = dispatcher();
    let run = |key: &str| {
        console
            .run_catalog(Some(&principal), key, &CatalogInput::new())
            .unwrap_or_else(|error| panic!("{key} failed: {error:?}"))
    };

    assert_eq!(column(&run("waybills-march-2020").result, "waybill_count"), vec![json!(3)]);
    assert_eq!(
        column(&run("weight-by-client-2020").result, "client_name"),
        vec![json!("ООО Ромашка"), json!("АО Вектор")]
    );
    assert_eq!(
        column(&run("youngest-employee").result, "full_name"),
        vec![json!("Сидорова Анна")]
    );
    assert_eq!(
        column(&run("heaviest-client-march-2020").result, "client_name"),
        vec![json!("АО Вектор")]
    );
    assert_eq!(run("hired-march-2020").result.len(), 2);
    assert_eq!(
        column(&run("hired-last-10-days").result, "full_name"),
        vec![json!("Кузнецов Олег")]
    );
    assert_eq!(run("staff-never-issued").result.len(), 2);
    assert_eq!(run("staff-idle-march-2020").result.len(), 2);
    assert_eq!(run("waybill-report").result.len(), 5);
}

#[test]
fn view_based_entry_is_repeatable() {
    let console = console("reportdesk-catalog-view");
    let principal = dispatcher();

    for _ in 0..2 {
        let run = console
            .run_catalog(Some(&principal), "most-frequent-client-2020", &CatalogInput::new())
            .expect("view script should run");
        assert_eq!(column(&run.result, "client_name"), vec![json!("ООО Ромашка")]);
        assert_eq!(column(&run.result, "waybill_count"), vec![json!(3)]);
    }
}

#[test]
fn missing_template_is_not_found_for_the_catalog_key() {
    let console = console_with_templates(
        "reportdesk-catalog-no-template",
        SqlTemplateRegistry::from_pairs([("products", "SELECT 1 AS x")]),
    );

    let error = console
        .run_catalog(Some(&dispatcher()), "youngest-employee", &CatalogInput::new())
        .expect_err("missing template must fail");

    assert_eq!(error.kind(), ErrorKind::NotFound);
    assert!(matches!(error, ConsoleError::NotFound { ref id, .. } if id == "youngest-employee"));
}

#[test]
fn unknown_catalog_key_is_not_found() {
    let console = console("reportdesk-catalog-unknown");

    let error = console
        .run_catalog(Some(&dispatcher()), "no-such-query", &CatalogInput::new())
        .expect_err("unknown key must fail");

    assert_eq!(error.kind(), ErrorKind::NotFound);
    assert_eq!(error.redirect().as_deref(), Some("/query/"));
}

#[test]
fn catalog_requires_the_queries_permission() {
    let console = console("reportdesk-catalog-guard");
    let reporter = Credential::new("reporter", "pw", "analyst", [Permission::ReportsView]).principal();

    let error = console
        .run_catalog(Some(&reporter), "all-products", &CatalogInput::new())
        .expect_err("reports-only principal must be denied");
    assert_eq!(error.kind(), ErrorKind::AuthorizationDenied);

    let error = console
        .run_catalog(None, "all-products", &CatalogInput::new())
        .expect_err("anonymous caller must be denied");
    assert_eq!(error.redirect().as_deref(), Some("/auth/login?next=%2Fquery%2Fall"));
}
