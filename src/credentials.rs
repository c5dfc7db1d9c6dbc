//! Credential storage for the Gemini API key.
//!
//! The controller only sees the [`CredentialStore`] trait. The key is read on
//! every request and never held past it.

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Storage key holding the API key
pub const API_KEY_ENTRY: &str = "geminiApiKey";

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("credential store error: {0}")]
    DbError(#[from] sled::Error),
    #[error("stored API key is not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// An API key authorizing calls to the summarization service
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    api_key: String,
}

impl Credential {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Read access to the stored credential
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// The stored API key, or `None` when nothing (or only blanks) is stored
    async fn api_key(&self) -> Result<Option<Credential>, CredentialError>;
}

/// Persistent credential store backed by sled
pub struct SledCredentialStore {
    db: sled::Db,
}

impl SledCredentialStore {
    /// Open or create the store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CredentialError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Store the API key, replacing any previous one
    pub fn set_api_key(&self, api_key: &str) -> Result<(), CredentialError> {
        self.db.insert(API_KEY_ENTRY, api_key.trim().as_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    /// Remove the stored API key; returns whether one existed
    pub fn clear(&self) -> Result<bool, CredentialError> {
        let existed = self.db.remove(API_KEY_ENTRY)?.is_some();
        self.db.flush()?;
        Ok(existed)
    }
}

#[async_trait]
impl CredentialStore for SledCredentialStore {
    async fn api_key(&self) -> Result<Option<Credential>, CredentialError> {
        match self.db.get(API_KEY_ENTRY)? {
            Some(bytes) => {
                let key = String::from_utf8(bytes.to_vec())?;
                Ok(non_blank(key))
            }
            None => Ok(None),
        }
    }
}

/// A fixed credential, e.g. from `GEMINI_API_KEY`
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialStore {
    key: Option<String>,
}

impl StaticCredentialStore {
    pub fn new(key: Option<String>) -> Self {
        Self { key }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn api_key(&self) -> Result<Option<Credential>, CredentialError> {
        Ok(self.key.clone().and_then(non_blank))
    }
}

fn non_blank(key: String) -> Option<Credential> {
    let key = key.trim();
    (!key.is_empty()).then(|| Credential::new(key))
}
