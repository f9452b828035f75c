use std::path::PathBuf;

use async_trait::async_trait;

use crate::entities::{
    AccountId, AuthOutcome, Credentials, DeviceRecord, Session, VerificationDevice,
};
use crate::error::Error;

/// Remote account service. Wire protocol is the adapter's business;
/// callers only see the three-way outcome.
#[async_trait]
pub trait AccountService: Send + Sync {
    /// Attempt primary authentication. Wrong credentials are a normal
    /// outcome here, not an `Err`.
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthOutcome, Error>;

    /// Submit a one-time code for a pending session and re-validate.
    /// A rejected code yields `Error::Verification`.
    async fn reauthenticate_with_code(
        &self,
        session: &Session,
        device: &VerificationDevice,
        code: &str,
    ) -> Result<AuthOutcome, Error>;

    /// Enumerate registered device records, in the service's order.
    async fn list_devices(&self, session: &Session) -> Result<Vec<DeviceRecord>, Error>;
}

/// Secure credential storage interface (libsecret/keyring)
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Store password for an account
    async fn store_password(&self, account_id: &AccountId, password: &str) -> Result<(), Error>;

    /// Retrieve stored password
    async fn get_password(&self, account_id: &AccountId) -> Result<Option<String>, Error>;

    /// Delete stored password. Deleting a missing entry is not an
    /// error.
    async fn delete_password(&self, account_id: &AccountId) -> Result<(), Error>;
}

/// Terminal input seam. The CLI supplies the real prompts; use cases
/// never touch stdin directly.
pub trait PromptInput: Send + Sync {
    /// Masked prompt for secrets. Returns `None` for an empty reply.
    fn prompt_secret(&self, prompt: &str) -> Result<Option<String>, Error>;

    /// Plain-text prompt (device selection, verification code).
    fn prompt_line(&self, prompt: &str) -> Result<String, Error>;
}

/// Persists one device record per call into the per-device snapshot
/// file. The format must support appending further records without
/// corrupting prior ones.
pub trait SnapshotStore: Send + Sync {
    /// Create (or overwrite) the device's snapshot file with a single
    /// record. Returns the written path.
    fn export(&self, record: &DeviceRecord) -> Result<PathBuf, Error>;

    /// Append a record to an existing snapshot file.
    fn append(&self, record: &DeviceRecord) -> Result<PathBuf, Error>;
}
