use async_trait::async_trait;
use fmsnap_core::entities::AccountId;
use fmsnap_core::ports::CredentialStore;
use fmsnap_core::Error;
use keyring::Entry;
use tracing::instrument;

const SERVICE_NAME: &str = "fmsnap";

/// Keyring-based credential store using libsecret on Linux. Only
/// passwords are stored; sessions are never persisted across
/// invocations.
pub struct KeyringCredentialStore;

impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self
    }

    fn get_entry(account_id: &AccountId) -> Result<Entry, Error> {
        Entry::new(SERVICE_NAME, account_id.as_str())
            .map_err(|e| Error::CredentialStorage(format!("failed to create keyring entry: {}", e)))
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for KeyringCredentialStore {
    #[instrument(skip(self, password))]
    async fn store_password(&self, account_id: &AccountId, password: &str) -> Result<(), Error> {
        let entry = Self::get_entry(account_id)?;

        // Run blocking keyring operation in spawn_blocking
        let password = password.to_string();
        tokio::task::spawn_blocking(move || {
            entry
                .set_password(&password)
                .map_err(|e| Error::CredentialStorage(format!("failed to store password: {}", e)))
        })
        .await
        .map_err(|e| Error::CredentialStorage(format!("task join error: {}", e)))?
    }

    #[instrument(skip(self))]
    async fn get_password(&self, account_id: &AccountId) -> Result<Option<String>, Error> {
        let entry = Self::get_entry(account_id)?;

        tokio::task::spawn_blocking(move || match entry.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Error::CredentialStorage(format!(
                "failed to get password: {}",
                e
            ))),
        })
        .await
        .map_err(|e| Error::CredentialStorage(format!("task join error: {}", e)))?
    }

    #[instrument(skip(self))]
    async fn delete_password(&self, account_id: &AccountId) -> Result<(), Error> {
        let entry = Self::get_entry(account_id)?;

        tokio::task::spawn_blocking(move || {
            match entry.delete_credential() {
                Ok(()) => Ok(()),
                Err(keyring::Error::NoEntry) => Ok(()), // Already deleted
                Err(e) => Err(Error::CredentialStorage(format!(
                    "failed to delete password: {}",
                    e
                ))),
            }
        })
        .await
        .map_err(|e| Error::CredentialStorage(format!("task join error: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: These tests require a working keyring service
    // They should be marked as integration tests or ignored in CI

    #[tokio::test]
    #[ignore = "requires keyring service"]
    async fn test_store_get_delete_password() {
        let store = KeyringCredentialStore::new();
        let account_id = AccountId::new("test_user_fmsnap");

        // Clean up any existing entry
        let _ = store.delete_password(&account_id).await;

        store
            .store_password(&account_id, "test_password")
            .await
            .unwrap();

        let password = store.get_password(&account_id).await.unwrap();
        assert_eq!(password, Some("test_password".to_string()));

        store.delete_password(&account_id).await.unwrap();

        let password = store.get_password(&account_id).await.unwrap();
        assert!(password.is_none());
    }

    #[tokio::test]
    #[ignore = "requires keyring service"]
    async fn test_delete_missing_password_is_ok() {
        let store = KeyringCredentialStore::new();
        let account_id = AccountId::new("test_user_fmsnap_missing");

        let _ = store.delete_password(&account_id).await;
        store.delete_password(&account_id).await.unwrap();
    }
}
