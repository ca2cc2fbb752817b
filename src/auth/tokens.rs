//! Token storage and management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
#[cfg(test)]
use std::sync::{Arc, Mutex, MutexGuard};

/// Access token plus the instant it stops being usable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "access_token")]
    pub token: String,
    #[serde(rename = "token_expiry_time")]
    pub expires_at_millis: i64,
}

impl Credential {
    /// Build a credential from an exchange issued at `issued_at_millis`.
    pub fn issued(token: String, issued_at_millis: i64, expires_in_secs: u64) -> Self {
        let lifetime = i64::try_from(expires_in_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        Self {
            token,
            expires_at_millis: issued_at_millis.saturating_add(lifetime),
        }
    }

    /// The credential handed out when no token could be obtained.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.token.is_empty()
    }

    /// An empty token is expired regardless of its timestamp.
    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        self.is_empty() || now_millis >= self.expires_at_millis
    }
}

/// Token store trait for different storage backends
pub trait TokenStore: Send {
    /// Currently stored credential; empty when nothing was ever stored.
    fn credential(&self) -> Credential;
    /// Replace both fields in a single write.
    fn store(&mut self, credential: &Credential) -> Result<()>;
}

/// Credential persisted as a small TOML file.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read(&self) -> Result<Option<Credential>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path).context("Failed to read credential file")?;
        let credential = toml::from_str(&content).context("Failed to parse credential file")?;
        Ok(Some(credential))
    }
}

impl TokenStore for FileTokenStore {
    fn credential(&self) -> Credential {
        match self.read() {
            Ok(Some(credential)) => credential,
            Ok(None) => Credential::empty(),
            Err(e) => {
                tracing::warn!("Ignoring unreadable credential file: {:#}", e);
                Credential::empty()
            }
        }
    }

    fn store(&mut self, credential: &Credential) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).context("Failed to create credential directory")?;
        }

        let content = toml::to_string(credential).context("Failed to serialize credential")?;

        // Write a sibling then rename so readers never see half a credential.
        let tmp = self.path.with_extension("toml.tmp");
        fs::write(&tmp, content).context("Failed to write credential file")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&tmp, perms).context("Failed to set credential permissions")?;
        }

        fs::rename(&tmp, &self.path).context("Failed to replace credential file")?;
        Ok(())
    }
}

/// In-process store, nothing survives the process. Clones share state.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    inner: Arc<Mutex<(Credential, usize)>>,
}

#[cfg(test)]
impl MemoryTokenStore {
    pub fn with(credential: Credential) -> Self {
        Self {
            inner: Arc::new(Mutex::new((credential, 0))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, (Credential, usize)> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of `store` calls seen so far.
    pub fn writes(&self) -> usize {
        self.lock().1
    }
}

#[cfg(test)]
impl TokenStore for MemoryTokenStore {
    fn credential(&self) -> Credential {
        self.lock().0.clone()
    }

    fn store(&mut self, credential: &Credential) -> Result<()> {
        let mut inner = self.lock();
        inner.0 = credential.clone();
        inner.1 += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_expiry_is_exact() {
        let t = 1_700_000_000_000;
        let credential = Credential::issued("abc".into(), t, 3600);
        assert_eq!(credential.expires_at_millis, t + 3_600_000);
    }

    #[test]
    fn test_expiry_boundary() {
        let credential = Credential {
            token: "abc".into(),
            expires_at_millis: 1_000,
        };
        assert!(!credential.is_expired_at(999));
        assert!(credential.is_expired_at(1_000));
        assert!(credential.is_expired_at(1_001));
    }

    #[test]
    fn test_empty_token_always_expired() {
        let credential = Credential {
            token: String::new(),
            expires_at_millis: i64::MAX,
        };
        assert!(credential.is_expired_at(0));
    }

    #[test]
    fn test_file_store_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("credentials.toml"));
        assert_eq!(store.credential(), Credential::empty());
    }

    #[test]
    fn test_file_store_persists_both_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("credentials.toml");
        let mut store = FileTokenStore::new(path.clone());
        let credential = Credential {
            token: "abc".into(),
            expires_at_millis: 42,
        };
        store.store(&credential).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("access_token = \"abc\""));
        assert!(text.contains("token_expiry_time = 42"));
        assert!(!path.with_extension("toml.tmp").exists());

        let reopened = FileTokenStore::new(path);
        assert_eq!(reopened.credential(), credential);
    }

    #[test]
    fn test_memory_store_clones_share_state() {
        let store = MemoryTokenStore::default();
        let mut writer = store.clone();
        writer
            .store(&Credential::issued("abc".into(), 0, 60))
            .unwrap();
        assert_eq!(store.credential().token, "abc");
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn test_file_store_corrupt_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");
        fs::write(&path, "access_token = ").unwrap();
        let store = FileTokenStore::new(path);
        assert!(store.credential().is_empty());
    }
}
