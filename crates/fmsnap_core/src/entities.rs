use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// File extension for exported device snapshots.
pub const SNAPSHOT_EXTENSION: &str = ".fmip_snapshot";

/// Unique identifier for an account (derived from username, lowercase)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(username: &str) -> Self {
        Self(username.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Credentials for authentication (never persisted to disk)
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: String, password: String) -> Self {
        Self { username, password }
    }

    pub fn account_id(&self) -> AccountId {
        AccountId::new(&self.username)
    }
}

/// Opaque session handle for one invocation. Cookie state lives in the
/// service adapter; this only carries what later calls need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub dsid: String,
    pub username: String,
    /// Per-account device service URL handed out at login.
    pub device_service_url: String,
}

/// A device that can receive a one-time verification code. Order is
/// the service's listing order and is used for index-based selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationDevice {
    pub id: String,
    pub label: String,
}

impl fmt::Display for VerificationDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// Result of one authentication attempt. Exactly one variant is
/// produced per attempt; callers must handle all three.
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    Authenticated(Session),
    InvalidCredentials {
        username: String,
    },
    ChallengeRequired {
        session: Session,
        devices: Vec<VerificationDevice>,
    },
}

/// Attribute value in a device record. A tagged enum rather than a
/// free-form JSON value so records survive a non-self-describing
/// binary codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Text(String),
    Flag(bool),
    Number(f64),
    Null,
}

impl AttributeValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// One registered device/location entry as returned by the service.
/// Produced fresh per run and never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl DeviceRecord {
    pub fn new(id: String) -> Self {
        Self {
            id,
            attributes: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.attributes.get("name").and_then(AttributeValue::as_text)
    }

    /// Output filename for this record: the whitespace-trimmed,
    /// lower-cased name plus the snapshot extension. Colliding names
    /// are not deduplicated; the last write wins.
    pub fn snapshot_file_name(&self) -> Option<String> {
        self.name()
            .map(|n| format!("{}{}", n.trim().to_lowercase(), SNAPSHOT_EXTENSION))
    }
}
