use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use fmsnap_core::config::ServiceSettings;
use fmsnap_core::entities::{
    AttributeValue, AuthOutcome, Credentials, DeviceRecord, Session, VerificationDevice,
};
use fmsnap_core::ports::AccountService;
use fmsnap_core::Error;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Account service adapter speaking the iCloud-style setup protocol.
/// Cookie state (the real session) lives in the reqwest client for
/// the lifetime of one invocation; the `Session` entity only carries
/// identifiers later calls need.
pub struct IcloudAccountService {
    client: Client,
    setup_url: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(rename = "dsInfo")]
    ds_info: DsInfo,
    #[serde(rename = "hsaChallengeRequired", default)]
    hsa_challenge_required: bool,
    #[serde(default)]
    webservices: HashMap<String, WebService>,
}

#[derive(Debug, Deserialize)]
struct DsInfo {
    dsid: String,
}

#[derive(Debug, Deserialize)]
struct WebService {
    url: String,
}

#[derive(Debug, Deserialize)]
struct TrustedDevicesResponse {
    #[serde(default)]
    devices: Vec<TrustedDeviceRaw>,
}

#[derive(Debug, Deserialize)]
struct TrustedDeviceRaw {
    #[serde(rename = "deviceId")]
    device_id: String,
    #[serde(rename = "deviceName", default)]
    device_name: Option<String>,
    #[serde(rename = "phoneNumber", default)]
    phone_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InitClientResponse {
    #[serde(default)]
    content: Vec<Value>,
}

impl IcloudAccountService {
    pub fn new(settings: &ServiceSettings) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .cookie_store(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            client,
            setup_url: settings.setup_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the devices able to receive a verification code for the
    /// pending session. An empty list is a fatal inconsistency.
    async fn list_trusted_devices(&self) -> Result<Vec<VerificationDevice>, Error> {
        let url = format!("{}/listDevices", self.setup_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Network(format!("trusted device listing failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("failed to read device listing: {}", e)))?;

        if !status.is_success() {
            return Err(response_error("trusted device listing", status, &text));
        }

        let parsed: TrustedDevicesResponse = serde_json::from_str(&text)
            .map_err(|e| Error::InvalidServerResponse(format!("bad device listing: {}", e)))?;

        let devices: Vec<VerificationDevice> = parsed
            .devices
            .into_iter()
            .map(|raw| {
                let label = match (&raw.device_name, &raw.phone_number) {
                    (Some(name), _) if !name.is_empty() => name.clone(),
                    (_, Some(number)) => format!("SMS to {}", number),
                    _ => format!("device {}", raw.device_id),
                };
                VerificationDevice {
                    id: raw.device_id,
                    label,
                }
            })
            .collect();

        if devices.is_empty() {
            return Err(Error::InvalidServerResponse(
                "verification required but no trusted devices listed".to_string(),
            ));
        }

        Ok(devices)
    }

    fn session_from_login(&self, username: &str, login: &LoginResponse) -> Session {
        let device_service_url = login
            .webservices
            .get("findme")
            .map(|ws| ws.url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| self.setup_url.clone());

        Session {
            dsid: login.ds_info.dsid.clone(),
            username: username.to_string(),
            device_service_url,
        }
    }
}

#[async_trait]
impl AccountService for IcloudAccountService {
    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthOutcome, Error> {
        let url = format!("{}/login", self.setup_url);
        let body = serde_json::json!({
            "appleId": credentials.username,
            "password": credentials.password,
            "extended_login": false,
        });

        debug!("sending login request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("login request failed: {}", e)))?;

        let status = response.status();

        // Credential rejection is a normal outcome, not an error.
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!("credentials rejected");
            return Ok(AuthOutcome::InvalidCredentials {
                username: credentials.username.clone(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("failed to read login response: {}", e)))?;

        if !status.is_success() {
            return Err(response_error("login", status, &text));
        }

        let login: LoginResponse = serde_json::from_str(&text)
            .map_err(|e| Error::InvalidServerResponse(format!("bad login response: {}", e)))?;

        let session = self.session_from_login(&credentials.username, &login);

        if login.hsa_challenge_required {
            let devices = self.list_trusted_devices().await?;
            info!(devices = devices.len(), "secondary verification required");
            return Ok(AuthOutcome::ChallengeRequired { session, devices });
        }

        info!("login successful");
        Ok(AuthOutcome::Authenticated(session))
    }

    #[instrument(skip(self, session, code), fields(device = %device.label))]
    async fn reauthenticate_with_code(
        &self,
        session: &Session,
        device: &VerificationDevice,
        code: &str,
    ) -> Result<AuthOutcome, Error> {
        let url = format!("{}/validateVerificationCode", self.setup_url);
        let body = serde_json::json!({
            "deviceId": device.id,
            "verificationCode": code,
            "trustBrowser": true,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("code validation failed: {}", e)))?;

        let status = response.status();

        if status.is_client_error() {
            warn!("verification code rejected");
            return Err(Error::Verification);
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("failed to read validation response: {}", e)))?;

        if !status.is_success() {
            return Err(response_error("code validation", status, &text));
        }

        // Re-validate the session from the response payload. A still
        // pending challenge means the code did not verify.
        match serde_json::from_str::<LoginResponse>(&text) {
            Ok(login) if login.hsa_challenge_required => Err(Error::Verification),
            Ok(login) => Ok(AuthOutcome::Authenticated(
                self.session_from_login(&session.username, &login),
            )),
            // The trust cookie now lives in the jar; the previous
            // session identifiers remain valid.
            Err(_) => Ok(AuthOutcome::Authenticated(session.clone())),
        }
    }

    #[instrument(skip(self, session), fields(username = %session.username))]
    async fn list_devices(&self, session: &Session) -> Result<Vec<DeviceRecord>, Error> {
        let url = format!(
            "{}/fmipservice/client/web/initClient",
            session.device_service_url
        );
        let body = serde_json::json!({
            "clientContext": {
                "appName": "fmsnap",
                "fmly": true,
                "shouldLocate": false,
            },
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("device enumeration failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("failed to read device response: {}", e)))?;

        if !status.is_success() {
            return Err(response_error("device enumeration", status, &text));
        }

        let parsed: InitClientResponse = serde_json::from_str(&text)
            .map_err(|e| Error::InvalidServerResponse(format!("bad device response: {}", e)))?;

        debug!(devices = parsed.content.len(), "device records received");

        // Preserve the service's listing order.
        Ok(parsed
            .content
            .iter()
            .enumerate()
            .map(|(index, value)| record_from_json(index, value))
            .collect())
    }
}

/// Flatten one JSON device object into a `DeviceRecord`. Scalars map
/// onto `AttributeValue` directly; nested structures are kept as
/// compact JSON text.
fn record_from_json(index: usize, value: &Value) -> DeviceRecord {
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("device-{}", index));

    let mut record = DeviceRecord::new(id);
    if let Some(object) = value.as_object() {
        for (key, field) in object {
            record
                .attributes
                .insert(key.clone(), attribute_from_json(field));
        }
    }
    record
}

fn attribute_from_json(value: &Value) -> AttributeValue {
    match value {
        Value::String(s) => AttributeValue::Text(s.clone()),
        Value::Bool(b) => AttributeValue::Flag(*b),
        Value::Number(n) => AttributeValue::Number(n.as_f64().unwrap_or(0.0)),
        Value::Null => AttributeValue::Null,
        other => AttributeValue::Text(other.to_string()),
    }
}

/// Truncate a response body to avoid logging excessive data
fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    // Back off to a char boundary; the limit may land inside a
    // multibyte character.
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}... (truncated, {} total bytes)",
        &body[..end],
        body.len()
    )
}

fn response_error(context: &str, status: StatusCode, body: &str) -> Error {
    Error::InvalidServerResponse(format!(
        "{}: status {}: {}",
        context,
        status,
        truncate_body(body)
    ))
}
