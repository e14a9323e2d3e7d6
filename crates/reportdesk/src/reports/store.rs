use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, instrument};

use crate::error::ValidationError;
use crate::reports::{ReportDefinition, ReportDraft};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read report store {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("report store {} is not a valid list of report definitions", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode report store")]
    Encode(#[source] serde_json::Error),

    #[error("failed to write report store {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// JSON array on disk, read whole on every read and rewritten whole on every
/// write. Assumes a single writer: concurrent creates can lose updates.
#[derive(Debug, Clone)]
pub struct ReportStore {
    path: PathBuf,
}

impl ReportStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A store file that does not exist yet is an empty store.
    pub fn list(&self) -> Result<Vec<ReportDefinition>, StoreError> {
        let input = match std::fs::read_to_string(&self.path) {
            Ok(input) => input,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        if input.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&input).map_err(|source| StoreError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    pub fn find(&self, id: &str) -> Result<Option<ReportDefinition>, StoreError> {
        Ok(self.list()?.into_iter().find(|report| report.id == id))
    }

    /// Validates, checks id uniqueness and appends. The file is untouched on
    /// any validation failure.
    #[instrument(skip_all, fields(report_id = %draft.id.trim()))]
    pub fn create(&self, draft: &ReportDraft) -> Result<ReportDefinition, StoreError> {
        let definition = draft.validate()?;

        let mut reports = self.list()?;
        if reports.iter().any(|report| report.id == definition.id) {
            return Err(ValidationError::DuplicateReportId(definition.id).into());
        }

        reports.push(definition.clone());
        self.save(&reports)?;
        info!(total = reports.len(), "report definition created");

        Ok(definition)
    }

    fn save(&self, reports: &[ReportDefinition]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut encoded = serde_json::to_vec_pretty(reports).map_err(StoreError::Encode)?;
        encoded.push(b'\n');
        std::fs::write(&self.path, encoded).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::{ParamsInput, ReportParam};

    fn temp_store(label: &str) -> ReportStore {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock should be after epoch")
            .as_nanos();
        ReportStore::new(
            std::env::temp_dir()
                .join(format!("reportdesk-{label}-{nanos}"))
                .join("reports.json"),
        )
    }

    fn draft(id: &str) -> ReportDraft {
        ReportDraft {
            id: id.to_string(),
            title: format!("Report {id}"),
            description: "Отчёт по клиентам".to_string(),
            sql: "SELECT name FROM clients WHERE name LIKE %(prefix)s".to_string(),
            params: ParamsInput::Structured(vec![ReportParam::new("prefix", Some("А%"))]),
        }
    }

    #[test]
    fn missing_file_lists_as_empty() {
        let store = temp_store("store-empty");

        assert!(store.list().expect("empty store").is_empty());
        assert!(store.find("anything").expect("lookup").is_none());
    }

    #[test]
    fn created_report_round_trips_through_find() {
        let store = temp_store("store-roundtrip");
        let created = store.create(&draft("clients")).expect("create should succeed");
        let found = store
            .find("clients")
            .expect("lookup should succeed")
            .expect("report should exist");

        assert_eq!(found, created);
        assert_eq!(found.params, vec![ReportParam::new("prefix", Some("А%"))]);
    }

    #[test]
    fn duplicate_id_fails_and_leaves_file_untouched() {
        let store = temp_store("store-duplicate");
        store.create(&draft("clients")).expect("first create");
        let before = std::fs::read(store.path()).expect("store file exists");

        let mut second = draft("clients");
        second.title = "Other".to_string();
        let error = store.create(&second).expect_err("duplicate id must fail");

        assert!(matches!(
            error,
            StoreError::Invalid(ValidationError::DuplicateReportId(ref id)) if id == "clients"
        ));
        assert_eq!(std::fs::read(store.path()).expect("store file exists"), before);
    }

    #[test]
    fn invalid_params_do_not_create_the_file() {
        let store = temp_store("store-invalid");
        let mut bad = draft("clients");
        bad.params = ParamsInput::Json("{\"name\":\"x\"}".to_string());

        assert!(matches!(
            store.create(&bad),
            Err(StoreError::Invalid(ValidationError::MalformedParams(_)))
        ));
        assert!(!store.path().exists());
    }

    #[test]
    fn file_keeps_non_ascii_text_verbatim() {
        let store = temp_store("store-utf8");
        store.create(&draft("clients")).expect("create");

        let raw = std::fs::read_to_string(store.path()).expect("store readable");
        assert!(raw.contains("Отчёт по клиентам"));
        assert!(raw.starts_with("[\n  {"));
    }

    #[test]
    fn malformed_file_is_an_error_not_an_empty_store() {
        let store = temp_store("store-malformed");
        std::fs::create_dir_all(store.path().parent().expect("parent")).expect("mkdir");
        std::fs::write(store.path(), "{\"not\":\"a list\"}").expect("write");

        assert!(matches!(store.list(), Err(StoreError::Malformed { .. })));
        assert!(matches!(
            store.create(&draft("clients")),
            Err(StoreError::Malformed { .. })
        ));
    }

    #[test]
    fn blank_fields_are_rejected_before_the_store_is_read() {
        let store = temp_store("store-blank");
        std::fs::create_dir_all(store.path().parent().expect("parent")).expect("mkdir");
        std::fs::write(store.path(), "{ not json").expect("write");

        let mut blank = draft("clients");
        blank.title = "   ".to_string();

        assert!(matches!(
            store.create(&blank),
            Err(StoreError::Invalid(ValidationError::MissingReportFields))
        ));
    }

    #[test]
    fn padded_id_collides_with_the_stored_one() {
        let store = temp_store("store-padded");
        store.create(&draft("clients")).expect("first create");

        assert!(matches!(
            store.create(&draft("  clients ")),
            Err(StoreError::Invalid(ValidationError::DuplicateReportId(ref id))) if id == "clients"
        ));
    }
}
