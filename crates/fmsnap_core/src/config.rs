use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub service: ServiceSettings,
    pub snapshot: SnapshotSettings,
    pub log_level: String,
}

/// Endpoints and timeouts for the remote account service.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceSettings {
    pub setup_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SnapshotSettings {
    /// Directory snapshot files are written into. Defaults to the
    /// working directory when unset.
    pub output_dir: Option<PathBuf>,
}
