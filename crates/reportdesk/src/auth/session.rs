use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info, warn};

use crate::auth::{CredentialStore, Principal};

/// Signing key file kept next to the session file.
pub const SESSION_KEY_FILE_NAME: &str = "session.key";

const SESSION_KEY_BYTES: usize = 32;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SessionRecord {
    principal: Principal,
    signed_in_at_utc: String,
}

/// On-disk form: the encoded record and its HMAC-SHA256 over those exact bytes.
#[derive(Debug, Serialize, Deserialize)]
struct SignedSession {
    payload: String,
    signature: String,
}

/// File-backed session: holds at most one principal between invocations.
///
/// Only records signed with the data directory's key are trusted, so a session
/// can only come from a successful [`SessionStore::save`] after login.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
    key_path: PathBuf,
}

impl SessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let key_path = path.with_file_name(SESSION_KEY_FILE_NAME);
        Self { path, key_path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    /// Loads the stored principal. Unsigned, tampered or unreadable records
    /// are absent, as is a principal the directory no longer grants every
    /// permission it carries.
    pub fn load(&self, directory: &dyn CredentialStore) -> Result<Option<Principal>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let input = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read session file: {}", self.path.display()))?;
        let signed = match serde_json::from_str::<SignedSession>(&input) {
            Ok(signed) => signed,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "ignoring unreadable session file");
                return Ok(None);
            }
        };

        let Some(key) = self.read_key()? else {
            warn!(path = %self.key_path.display(), "no session key; ignoring session file");
            return Ok(None);
        };
        if !verify_signature(&key, signed.payload.as_bytes(), &signed.signature) {
            warn!(path = %self.path.display(), "session signature mismatch");
            return Ok(None);
        }

        let record = match serde_json::from_str::<SessionRecord>(&signed.payload) {
            Ok(record) => record,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "ignoring malformed session payload");
                return Ok(None);
            }
        };

        let Some(credential) = directory.lookup(&record.principal.login) else {
            warn!(login = %record.principal.login, "session login no longer in directory");
            return Ok(None);
        };
        if !record.principal.permissions.is_subset(&credential.permissions) {
            warn!(login = %record.principal.login, "session permissions exceed directory grants");
            return Ok(None);
        }

        debug!(login = %record.principal.login, "session loaded");
        Ok(Some(record.principal))
    }

    pub fn save(&self, principal: &Principal) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create session directory: {}", parent.display())
            })?;
        }

        let key = match self.read_key()? {
            Some(key) => key,
            None => self.generate_key()?,
        };

        let signed_in_at_utc = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .context("failed to format session timestamp")?;
        let record = SessionRecord {
            principal: principal.clone(),
            signed_in_at_utc,
        };
        let payload = serde_json::to_string(&record).context("failed to encode session")?;
        let signature = sign(&key, payload.as_bytes())?;

        let encoded = serde_json::to_vec_pretty(&SignedSession { payload, signature })
            .context("failed to encode session")?;
        std::fs::write(&self.path, encoded)
            .with_context(|| format!("failed to write session file: {}", self.path.display()))
    }

    /// Removes the session unconditionally; a missing file is not an error.
    /// The signing key stays for the next login.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error).with_context(|| {
                format!("failed to remove session file: {}", self.path.display())
            }),
        }
    }

    /// `None` when the key file is missing or does not hold a hex key.
    fn read_key(&self) -> Result<Option<Vec<u8>>> {
        let raw = match std::fs::read_to_string(&self.key_path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(error).with_context(|| {
                    format!("failed to read session key: {}", self.key_path.display())
                });
            }
        };

        match hex::decode(raw.trim()) {
            Ok(key) if key.len() == SESSION_KEY_BYTES => Ok(Some(key)),
            _ => {
                warn!(path = %self.key_path.display(), "session key file is malformed");
                Ok(None)
            }
        }
    }

    fn generate_key(&self) -> Result<Vec<u8>> {
        let mut key = vec![0_u8; SESSION_KEY_BYTES];
        OsRng.fill_bytes(&mut key);
        std::fs::write(&self.key_path, hex::encode(&key)).with_context(|| {
            format!("failed to write session key: {}", self.key_path.display())
        })?;
        restrict_to_owner(&self.key_path)?;
        info!(path = %self.key_path.display(), "session key created");
        Ok(key)
    }
}

fn sign(key: &[u8], payload: &[u8]) -> Result<String> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|_| anyhow!("invalid session key length"))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn verify_signature(key: &[u8], payload: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .with_context(|| format!("failed to restrict session key: {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Credential, Permission, UserDirectory};

    fn temp_session_path(label: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock should be after epoch")
            .as_nanos();
        std::env::temp_dir()
            .join(format!("reportdesk-{label}-{nanos}"))
            .join("session.json")
    }

    #[test]
    fn save_load_and_clear_round_trip() {
        let directory = UserDirectory::builtin();
        let store = SessionStore::new(temp_session_path("session-roundtrip"));
        let principal = directory.lookup("manager").expect("seed user").principal();

        assert_eq!(store.load(&directory).expect("load empty"), None);
        store.save(&principal).expect("save should succeed");
        assert!(store.key_path().exists());
        assert_eq!(
            store.load(&directory).expect("load saved"),
            Some(principal)
        );

        store.clear().expect("clear should succeed");
        store.clear().expect("second clear is a no-op");
        assert_eq!(store.load(&directory).expect("load cleared"), None);
        assert!(store.key_path().exists());
    }

    #[test]
    fn escalated_session_is_treated_as_absent() {
        let directory = UserDirectory::builtin();
        let store = SessionStore::new(temp_session_path("session-escalated"));
        let mut principal = directory.lookup("dispatcher").expect("seed user").principal();
        principal.permissions.insert(Permission::Admin);
        store.save(&principal).expect("save should succeed");

        assert_eq!(store.load(&directory).expect("load"), None);
    }

    #[test]
    fn session_for_removed_login_is_treated_as_absent() {
        let store = SessionStore::new(temp_session_path("session-removed"));
        let principal = UserDirectory::builtin()
            .lookup("admin")
            .expect("seed user")
            .principal();
        store.save(&principal).expect("save should succeed");

        let shrunk = UserDirectory::new(vec![Credential::new(
            "dispatcher",
            "x",
            "ops",
            [Permission::Queries],
        )])
        .expect("directory");
        assert_eq!(store.load(&shrunk).expect("load"), None);
    }

    #[test]
    fn hand_written_session_file_is_not_trusted() {
        let directory = UserDirectory::builtin();
        let store = SessionStore::new(temp_session_path("session-forged"));
        std::fs::create_dir_all(store.path().parent().expect("parent")).expect("mkdir");
        std::fs::write(
            store.path(),
            r#"{"principal":{"login":"admin","role":"x","permissions":["admin"]},"signed_in_at_utc":"x"}"#,
        )
        .expect("write");

        assert_eq!(store.load(&directory).expect("load"), None);
    }

    #[test]
    fn swapped_payload_fails_signature_check() {
        let directory = UserDirectory::builtin();
        let store = SessionStore::new(temp_session_path("session-swapped"));
        store
            .save(&directory.lookup("dispatcher").expect("seed user").principal())
            .expect("save should succeed");

        let mut signed: SignedSession =
            serde_json::from_slice(&std::fs::read(store.path()).expect("read")).expect("parse");
        let forged = SessionRecord {
            principal: directory.lookup("admin").expect("seed user").principal(),
            signed_in_at_utc: "2020-03-01T00:00:00Z".to_string(),
        };
        signed.payload = serde_json::to_string(&forged).expect("encode");
        std::fs::write(store.path(), serde_json::to_vec(&signed).expect("encode")).expect("write");

        assert_eq!(store.load(&directory).expect("load"), None);
    }

    #[test]
    fn session_signed_with_another_key_is_absent() {
        let directory = UserDirectory::builtin();
        let store = SessionStore::new(temp_session_path("session-rekeyed"));
        store
            .save(&directory.lookup("manager").expect("seed user").principal())
            .expect("save should succeed");

        std::fs::write(store.key_path(), hex::encode([7_u8; SESSION_KEY_BYTES])).expect("rekey");
        assert_eq!(store.load(&directory).expect("load"), None);

        std::fs::remove_file(store.key_path()).expect("remove key");
        assert_eq!(store.load(&directory).expect("load"), None);
    }
}
