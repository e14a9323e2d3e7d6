use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

pub const TEMPLATE_EXTENSION: &str = "sql";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to scan template directory {}", path.display())]
    ScanDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read template file {}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template file {} is not valid UTF-8", path.display())]
    NotUtf8 { path: PathBuf },

    #[error(
        "duplicate template name `{name}`: {} and {}",
        first.display(),
        second.display()
    )]
    Duplicate {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlTemplate {
    pub name: String,
    pub text: String,
    pub source: PathBuf,
}

/// Immutable name to SQL text mapping built once at startup.
#[derive(Debug, Clone, Default)]
pub struct SqlTemplateRegistry {
    templates: BTreeMap<String, SqlTemplate>,
}

impl SqlTemplateRegistry {
    /// Scans `directory` (non-recursive) for `*.sql` files. Two files mapping to
    /// the same name fail the load instead of depending on directory order.
    pub fn load(directory: &Path) -> Result<Self, TemplateError> {
        let scan_error = |source| TemplateError::ScanDirectory {
            path: directory.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(directory).map_err(scan_error)? {
            let path = entry.map_err(scan_error)?.path();
            if path.is_file() && has_template_extension(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut templates: BTreeMap<String, SqlTemplate> = BTreeMap::new();
        for path in paths {
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                warn!(path = %path.display(), "skipping template with non UTF-8 file name");
                continue;
            };
            let name = name.to_string();

            if let Some(existing) = templates.get(&name) {
                return Err(TemplateError::Duplicate {
                    name,
                    first: existing.source.clone(),
                    second: path,
                });
            }

            let bytes = std::fs::read(&path).map_err(|source| TemplateError::ReadFile {
                path: path.clone(),
                source,
            })?;
            let text = String::from_utf8(bytes)
                .map_err(|_| TemplateError::NotUtf8 { path: path.clone() })?;
            debug!(template = %name, path = %path.display(), "loaded sql template");

            templates.insert(
                name.clone(),
                SqlTemplate {
                    name,
                    text,
                    source: path,
                },
            );
        }

        info!(
            directory = %directory.display(),
            templates = templates.len(),
            "sql template registry loaded"
        );
        Ok(Self { templates })
    }

    /// Builds a registry from in-memory `(name, text)` pairs; later pairs win.
    #[must_use]
    pub fn from_pairs<I, N, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, T)>,
        N: Into<String>,
        T: Into<String>,
    {
        let templates = pairs
            .into_iter()
            .map(|(name, text)| {
                let name = name.into();
                let template = SqlTemplate {
                    name: name.clone(),
                    text: text.into(),
                    source: PathBuf::new(),
                };
                (name, template)
            })
            .collect();
        Self { templates }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.templates
            .get(name)
            .map(|template| template.text.as_str())
    }

    #[must_use]
    pub fn template(&self, name: &str) -> Option<&SqlTemplate> {
        self.templates.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

fn has_template_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case(TEMPLATE_EXTENSION))
}
