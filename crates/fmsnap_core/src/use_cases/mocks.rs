//! Scripted in-memory implementations of the ports for use-case
//! tests. Outcomes are queued per call and popped in order.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::entities::{
    AccountId, AttributeValue, AuthOutcome, Credentials, DeviceRecord, Session,
    VerificationDevice,
};
use crate::error::Error;
use crate::ports::{AccountService, CredentialStore, PromptInput, SnapshotStore};

pub(crate) fn test_session(username: &str) -> Session {
    Session {
        dsid: "12345".to_string(),
        username: username.to_string(),
        device_service_url: "https://fmip.example.invalid".to_string(),
    }
}

pub(crate) fn test_device(id: &str, label: &str) -> VerificationDevice {
    VerificationDevice {
        id: id.to_string(),
        label: label.to_string(),
    }
}

pub(crate) fn test_record(id: &str, name: &str) -> DeviceRecord {
    let mut record = DeviceRecord::new(id.to_string());
    record
        .attributes
        .insert("name".to_string(), AttributeValue::Text(name.to_string()));
    record
}

#[derive(Default)]
pub(crate) struct MockAccountService {
    auth_outcomes: Mutex<VecDeque<Result<AuthOutcome, Error>>>,
    reauth_outcomes: Mutex<VecDeque<Result<AuthOutcome, Error>>>,
    devices: Mutex<Vec<DeviceRecord>>,
    pub auth_calls: AtomicUsize,
    pub reauth_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
}

impl MockAccountService {
    pub fn push_auth(&self, outcome: Result<AuthOutcome, Error>) {
        self.auth_outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn push_reauth(&self, outcome: Result<AuthOutcome, Error>) {
        self.reauth_outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn set_devices(&self, devices: Vec<DeviceRecord>) {
        *self.devices.lock().unwrap() = devices;
    }
}

#[async_trait]
impl AccountService for MockAccountService {
    async fn authenticate(&self, _credentials: &Credentials) -> Result<AuthOutcome, Error> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        self.auth_outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(Error::Network("no scripted outcome".to_string())))
    }

    async fn reauthenticate_with_code(
        &self,
        _session: &Session,
        _device: &VerificationDevice,
        _code: &str,
    ) -> Result<AuthOutcome, Error> {
        self.reauth_calls.fetch_add(1, Ordering::SeqCst);
        self.reauth_outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(Error::Network("no scripted outcome".to_string())))
    }

    async fn list_devices(&self, _session: &Session) -> Result<Vec<DeviceRecord>, Error> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.devices.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub(crate) struct MemoryCredentialStore {
    passwords: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn stored_password(&self, account_id: &AccountId) -> Option<String> {
        self.passwords
            .lock()
            .unwrap()
            .get(account_id.as_str())
            .cloned()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn store_password(&self, account_id: &AccountId, password: &str) -> Result<(), Error> {
        self.passwords
            .lock()
            .unwrap()
            .insert(account_id.as_str().to_string(), password.to_string());
        Ok(())
    }

    async fn get_password(&self, account_id: &AccountId) -> Result<Option<String>, Error> {
        Ok(self.stored_password(account_id))
    }

    async fn delete_password(&self, account_id: &AccountId) -> Result<(), Error> {
        self.passwords.lock().unwrap().remove(account_id.as_str());
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct ScriptedPrompt {
    secrets: Mutex<VecDeque<Option<String>>>,
    lines: Mutex<VecDeque<String>>,
    secret_count: AtomicUsize,
    line_count: AtomicUsize,
}

impl ScriptedPrompt {
    pub fn with_secrets(secrets: Vec<Option<String>>) -> Self {
        Self {
            secrets: Mutex::new(secrets.into()),
            ..Default::default()
        }
    }

    pub fn with_lines(lines: Vec<String>) -> Self {
        Self {
            lines: Mutex::new(lines.into()),
            ..Default::default()
        }
    }

    pub fn secret_prompts(&self) -> usize {
        self.secret_count.load(Ordering::SeqCst)
    }

    pub fn line_prompts(&self) -> usize {
        self.line_count.load(Ordering::SeqCst)
    }
}

impl PromptInput for ScriptedPrompt {
    fn prompt_secret(&self, _prompt: &str) -> Result<Option<String>, Error> {
        self.secret_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.secrets.lock().unwrap().pop_front().flatten())
    }

    fn prompt_line(&self, _prompt: &str) -> Result<String, Error> {
        self.line_count.fetch_add(1, Ordering::SeqCst);
        self.lines
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::usage("no scripted input"))
    }
}

#[derive(Default)]
pub(crate) struct MemorySnapshotStore {
    pub written: Mutex<Vec<(PathBuf, DeviceRecord)>>,
    pub fail_after: Option<usize>,
}

impl MemorySnapshotStore {
    pub fn failing_after(count: usize) -> Self {
        Self {
            fail_after: Some(count),
            ..Default::default()
        }
    }

    fn write(&self, record: &DeviceRecord) -> Result<PathBuf, Error> {
        let mut written = self.written.lock().unwrap();
        if let Some(limit) = self.fail_after {
            if written.len() >= limit {
                return Err(Error::SnapshotExport("disk full".to_string()));
            }
        }
        let file_name = record
            .snapshot_file_name()
            .ok_or_else(|| Error::SnapshotExport("device record has no name".to_string()))?;
        let path = PathBuf::from(file_name);
        written.push((path.clone(), record.clone()));
        Ok(path)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn export(&self, record: &DeviceRecord) -> Result<PathBuf, Error> {
        self.write(record)
    }

    fn append(&self, record: &DeviceRecord) -> Result<PathBuf, Error> {
        self.write(record)
    }
}
