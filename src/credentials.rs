//! API key lookup and storage.
//!
//! The `OPENAI_API_KEY` environment variable wins over the key stored in the
//! system keyring.

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use keyring::Entry;
use tracing::{debug, info};

pub const SERVICE_NAME: &str = "rewrite-text";
pub const API_KEY_ACCOUNT: &str = "openai_api_key";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Source of the backend credential. `Ok(None)` means nothing is configured.
pub trait CredentialProvider: Send + Sync {
    fn load_credential(&self) -> Result<Option<String>>;
}

/// System keychain-backed key storage.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service: String,
    account: String,
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new(SERVICE_NAME, API_KEY_ACCOUNT)
    }
}

impl KeyringCredentialStore {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, &self.account)
            .map_err(|e| anyhow!("failed to create keyring entry: {e}"))
    }

    /// Stores the trimmed key. Blank keys are rejected.
    pub fn save(&self, key: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            bail!("API key is empty");
        }
        self.entry()?
            .set_password(key)
            .map_err(|e| anyhow!("failed to write keyring: {e}"))?;
        info!(account = %self.account, "Stored API key in keyring");
        Ok(())
    }

    /// Removes the stored key. A missing entry is not an error.
    pub fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {
                info!(account = %self.account, "Cleared API key from keyring");
                Ok(())
            }
            Err(e) => Err(anyhow!("failed to delete keyring entry: {e}")),
        }
    }

    /// Whether a key is stored, regardless of any environment override.
    pub fn has(&self) -> Result<bool> {
        Ok(self.load_credential()?.is_some())
    }
}

impl CredentialProvider for KeyringCredentialStore {
    fn load_credential(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(key) => Ok(Some(key)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(anyhow!("failed to read keyring: {e}")),
        }
    }
}

/// Environment variable first, stored key second.
pub struct EnvOrStoredCredential {
    env_value: Option<String>,
    stored: Arc<dyn CredentialProvider>,
}

impl EnvOrStoredCredential {
    pub fn new(env_value: Option<String>, stored: Arc<dyn CredentialProvider>) -> Self {
        Self { env_value, stored }
    }

    /// Reads `OPENAI_API_KEY` from the process environment.
    pub fn from_env(stored: Arc<dyn CredentialProvider>) -> Self {
        Self::new(std::env::var(API_KEY_ENV).ok(), stored)
    }

    /// Where the effective key comes from, for status output.
    pub fn source(&self) -> Result<Option<&'static str>> {
        if self.env_key().is_some() {
            return Ok(Some("environment"));
        }
        Ok(self.stored.load_credential()?.map(|_| "keyring"))
    }

    fn env_key(&self) -> Option<&str> {
        self.env_value
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

impl CredentialProvider for EnvOrStoredCredential {
    fn load_credential(&self) -> Result<Option<String>> {
        if let Some(key) = self.env_key() {
            debug!("Using API key from {}", API_KEY_ENV);
            return Ok(Some(key.to_string()));
        }
        self.stored.load_credential()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeCredential;

    #[test]
    fn test_env_overrides_stored_key() {
        let stored = Arc::new(FakeCredential::key("sk-stored"));
        let provider = EnvOrStoredCredential::new(Some(" sk-env ".to_string()), stored.clone());

        assert_eq!(provider.load_credential().unwrap().as_deref(), Some("sk-env"));
        assert_eq!(provider.source().unwrap(), Some("environment"));
        assert_eq!(stored.loads(), 0);
    }

    #[test]
    fn test_blank_env_falls_back_to_stored_key() {
        let stored = Arc::new(FakeCredential::key("sk-stored"));
        let provider = EnvOrStoredCredential::new(Some("   ".to_string()), stored);

        assert_eq!(provider.load_credential().unwrap().as_deref(), Some("sk-stored"));
        assert_eq!(provider.source().unwrap(), Some("keyring"));
    }

    #[test]
    fn test_nothing_configured() {
        let provider = EnvOrStoredCredential::new(None, Arc::new(FakeCredential::missing()));
        assert_eq!(provider.load_credential().unwrap(), None);
        assert_eq!(provider.source().unwrap(), None);
    }

    #[test]
    fn test_store_failure_propagates() {
        let provider =
            EnvOrStoredCredential::new(None, Arc::new(FakeCredential::broken("keychain locked")));
        let err = provider.load_credential().unwrap_err();
        assert!(err.to_string().contains("keychain locked"));
    }

    #[test]
    fn test_blank_key_rejected_before_keyring() {
        let store = KeyringCredentialStore::new("rewrite-text-test", "unused");
        assert!(store.save("  \n").is_err());
    }
}
