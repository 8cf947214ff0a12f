//! File-backed persistence for delegated credentials
//!
//! All credentials live in a single JSON document inside the token
//! directory, keyed by user key. Writes go through a temp file and a
//! rename, and the file is restricted to its owner on Unix.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, SyncError};

/// File name of the credential document inside the token directory
pub const STORE_FILE_NAME: &str = "stored_credentials.json";

/// Access tokens are treated as expired this long before their real expiry
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Access/refresh token pair granted by the credential authority
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DelegatedCredential {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub obtained_at: DateTime<Utc>,
}

impl DelegatedCredential {
    /// No expiry means the provider did not bound the token's lifetime
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at - Duration::seconds(EXPIRY_MARGIN_SECS),
            None => false,
        }
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Whether every requested scope was granted
    pub fn covers(&self, scopes: &[&str]) -> bool {
        scopes.iter().all(|s| self.scopes.iter().any(|g| g == s))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    credentials: BTreeMap<String, DelegatedCredential>,
}

/// Keyed credential store with one entry per user key
#[derive(Debug, Clone)]
pub struct TokenStore {
    directory: PathBuf,
}

impl TokenStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn file_path(&self) -> PathBuf {
        self.directory.join(STORE_FILE_NAME)
    }

    /// Load the credential stored under `user_key`, if any
    pub async fn load(&self, user_key: &str) -> Result<Option<DelegatedCredential>> {
        let mut document = self.read_document().await?;
        let credential = document.credentials.remove(user_key);
        tracing::debug!(
            "Token store lookup for '{}': {}",
            user_key,
            if credential.is_some() { "found" } else { "absent" }
        );
        Ok(credential)
    }

    /// Replace the entry for `user_key`, leaving other keys untouched
    pub async fn store(&self, user_key: &str, credential: &DelegatedCredential) -> Result<()> {
        let mut document = self.read_document().await?;
        document
            .credentials
            .insert(user_key.to_string(), credential.clone());
        self.write_document(&document).await?;
        tracing::debug!("Stored credential for '{}' in {:?}", user_key, self.file_path());
        Ok(())
    }

    /// Remove the entry for `user_key`. Returns whether one existed.
    pub async fn remove(&self, user_key: &str) -> Result<bool> {
        let mut document = self.read_document().await?;
        if document.credentials.remove(user_key).is_none() {
            return Ok(false);
        }
        self.write_document(&document).await?;
        tracing::info!("Removed stored credential for '{}'", user_key);
        Ok(true)
    }

    async fn read_document(&self) -> Result<StoreDocument> {
        let path = self.file_path();
        if !path.exists() {
            return Ok(StoreDocument::default());
        }

        let json = tokio::fs::read_to_string(&path).await?;
        serde_json::from_str(&json).map_err(|e| {
            SyncError::ConfigError(format!("Token store {:?} is corrupt: {}", path, e))
        })
    }

    async fn write_document(&self, document: &StoreDocument) -> Result<()> {
        ensure_private_dir(&self.directory).await?;

        let path = self.file_path();
        let tmp_path = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(document)?;

        tokio::fs::write(&tmp_path, json).await?;
        secure_token_file(&tmp_path).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }
}

/// Create `dir` if needed and restrict it to its owner (0700)
async fn ensure_private_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700)).await?;
    }

    Ok(())
}

/// Restrict a token file to its owner (0600)
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

/// Non-Unix platforms rely on the ACLs inherited from the token directory
#[cfg(not(unix))]
pub async fn secure_token_file(_path: &Path) -> Result<()> {
    Ok(())
}
