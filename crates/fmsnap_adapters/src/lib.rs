pub mod configuration;
pub mod credentials;
pub mod icloud;
pub mod prompt;
pub mod snapshot;
pub mod telemetry;

// Re-exports for convenience
pub use credentials::KeyringCredentialStore;
pub use icloud::IcloudAccountService;
pub use prompt::TerminalPrompt;
pub use snapshot::SnapshotWriter;
