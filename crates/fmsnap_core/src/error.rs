use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or insufficient invocation. Maps to exit code 2 and
    /// is never retried.
    #[error("{0}")]
    Usage(String),

    #[error("bad username or password for {username}")]
    InvalidCredentials { username: String },

    /// Out-of-range device selection during the two-factor flow.
    #[error("device selection {index} is out of range (0..{available})")]
    Selection { index: usize, available: usize },

    /// The remote service rejected the one-time code. Not retried.
    #[error("verification code rejected")]
    Verification,

    #[error("credential storage error: {0}")]
    CredentialStorage(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response from server: {0}")]
    InvalidServerResponse(String),

    #[error("snapshot export failed: {0}")]
    SnapshotExport(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn usage(msg: impl Into<String>) -> Self {
        Error::Usage(msg.into())
    }
}
