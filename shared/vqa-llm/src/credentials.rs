//! API credential validation and key stores

use crate::{AnswerError, Result};
use std::fmt;
use std::sync::RwLock;
use tracing::{debug, info};

/// Prefix every API key is expected to carry
pub const KEY_PREFIX: &str = "sk-";

/// Shortest key accepted without a round trip
pub const MIN_KEY_LENGTH: usize = 30;

/// Validated bearer credential
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Validate the key format locally, before any network call
    pub fn parse(raw: &str) -> Result<Self> {
        let key = raw.trim();

        if key.is_empty() {
            return Err(AnswerError::CredentialMissing);
        }

        if !key.starts_with(KEY_PREFIX) {
            return Err(AnswerError::MalformedCredential(format!(
                "keys should start with '{}'",
                KEY_PREFIX
            )));
        }

        if key.len() < MIN_KEY_LENGTH {
            return Err(AnswerError::MalformedCredential(format!(
                "key is {} characters, expected at least {}",
                key.len(),
                MIN_KEY_LENGTH
            )));
        }

        Ok(Self(key.to_string()))
    }

    /// Raw key for the authorization header
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// First characters of the key, safe to log
    pub fn redacted(&self) -> String {
        let visible: String = self.0.chars().take(5).collect();
        format!("{}***", visible)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.redacted())
    }
}

/// Persists and retrieves the bearer credential
pub trait KeyStore: Send + Sync {
    /// Current key, or `None` when not configured
    fn get_credential(&self) -> Option<String>;
}

/// Reads the key from a named environment variable
#[derive(Debug, Clone)]
pub struct EnvKeyStore {
    var: String,
}

impl EnvKeyStore {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl KeyStore for EnvKeyStore {
    fn get_credential(&self) -> Option<String> {
        let key = std::env::var(&self.var).ok().filter(|k| !k.trim().is_empty());
        if key.is_none() {
            debug!("No API key found in ${}", self.var);
        }
        key
    }
}

/// In-process key store
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    key: RwLock<Option<String>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a key, unvalidated
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: RwLock::new(Some(key.into())),
        }
    }

    /// Validate and save a key
    pub fn save(&self, key: &str) -> Result<()> {
        let credential = Credential::parse(key)?;
        info!("Saving API key ({})", credential.redacted());
        *self.key.write().unwrap_or_else(|e| e.into_inner()) = Some(credential.expose().to_string());
        Ok(())
    }

    /// Remove the stored key
    pub fn clear(&self) {
        *self.key.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl KeyStore for MemoryKeyStore {
    fn get_credential(&self) -> Option<String> {
        self.key.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
