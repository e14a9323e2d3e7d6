use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};

pub const DATA_DIR_NAME: &str = ".reportdesk";
pub const SQL_DIR_NAME: &str = "sql";
pub const REPORTS_FILE_NAME: &str = "reports.json";
pub const SESSION_FILE_NAME: &str = "session.json";

/// User-supplied path overrides, each resolved against home and cwd.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathOverrides {
    pub data_dir: Option<PathBuf>,
    pub sql_dir: Option<PathBuf>,
    pub reports_path: Option<PathBuf>,
    pub users_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    pub home_dir: PathBuf,
    pub cwd: PathBuf,
    pub data_dir: PathBuf,
    pub sql_dir: PathBuf,
    pub reports_path: PathBuf,
    pub session_path: PathBuf,
    pub users_path: Option<PathBuf>,
    pub database_path: PathBuf,
}

pub fn resolve_runtime_paths(
    home_dir: &Path,
    cwd: &Path,
    overrides: &PathOverrides,
    db_name: &str,
) -> Result<RuntimePaths> {
    if !home_dir.is_absolute() {
        bail!("home_dir must be absolute: {}", home_dir.display());
    }
    if !cwd.is_absolute() {
        bail!("cwd must be absolute: {}", cwd.display());
    }

    let home_dir = normalize_lexical(home_dir);
    let cwd = normalize_lexical(cwd);
    let resolve = |path: &Path| resolve_user_path(path, &home_dir, &cwd);

    let data_dir = match &overrides.data_dir {
        Some(path) => resolve(path)?,
        None => home_dir.join(DATA_DIR_NAME),
    };
    let sql_dir = match &overrides.sql_dir {
        Some(path) => resolve(path)?,
        None => cwd.join(SQL_DIR_NAME),
    };
    let reports_path = match &overrides.reports_path {
        Some(path) => resolve(path)?,
        None => data_dir.join(REPORTS_FILE_NAME),
    };
    let users_path = overrides
        .users_path
        .as_deref()
        .map(|path| resolve(path))
        .transpose()?;
    let database_path = resolve_database_path(db_name, &data_dir, &home_dir, &cwd)?;

    Ok(RuntimePaths {
        session_path: data_dir.join(SESSION_FILE_NAME),
        home_dir,
        cwd,
        data_dir,
        sql_dir,
        reports_path,
        users_path,
        database_path,
    })
}

/// A bare name selects `<data_dir>/<name>.sqlite`; anything that looks like a
/// path is resolved like the other overrides.
fn resolve_database_path(
    db_name: &str,
    data_dir: &Path,
    home_dir: &Path,
    cwd: &Path,
) -> Result<PathBuf> {
    let name = db_name.trim();
    if name.is_empty() {
        bail!("database name must not be empty");
    }

    let lower = name.to_ascii_lowercase();
    let looks_like_path = name.contains(['/', '\\'])
        || name.starts_with('~')
        || lower.ends_with(".sqlite")
        || lower.ends_with(".db");
    if looks_like_path {
        return resolve_user_path(Path::new(name), home_dir, cwd);
    }

    Ok(data_dir.join(format!("{name}.sqlite")))
}

fn resolve_user_path(path: &Path, home_dir: &Path, cwd: &Path) -> Result<PathBuf> {
    let expanded = expand_tilde(path, home_dir)?;
    let resolved = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };

    Ok(normalize_lexical(&resolved))
}

fn expand_tilde(path: &Path, home_dir: &Path) -> Result<PathBuf> {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => {
            let mut expanded = home_dir.to_path_buf();
            for component in components {
                expanded.push(component.as_os_str());
            }
            Ok(expanded)
        }
        Some(Component::Normal(first))
            if first
                .to_str()
                .is_some_and(|segment| segment.starts_with('~')) =>
        {
            bail!(
                "unsupported home expansion syntax (only `~` and `~/...` are supported): {}",
                path.display()
            )
        }
        _ => Ok(path.to_path_buf()),
    }
}

fn normalize_lexical(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component.as_os_str());
                }
            }
            _ => normalized.push(component.as_os_str()),
        }
    }

    normalized
}
