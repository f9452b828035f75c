use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{info, warn};

use crate::entities::{AuthOutcome, Session, VerificationDevice};
use crate::error::Error;
use crate::ports::{AccountService, PromptInput};

/// Two-factor flow state machine:
/// `AwaitingDeviceSelection → AwaitingCode → Verified | Rejected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeState {
    AwaitingDeviceSelection,
    AwaitingCode { device_index: usize },
    Verified,
    Rejected,
}

/// Inputs the caller supplied upfront. In non-interactive mode the
/// flow may only be entered when at least one of these is present.
#[derive(Debug, Clone, Default)]
pub struct ChallengeOptions {
    pub interactive: bool,
    pub device_index: Option<usize>,
    pub code: Option<String>,
}

/// Explicit state carried between transitions: the pending session,
/// the device list as the service ordered it, and the current state.
/// Single-shot per invocation; no transition performs more than one
/// network round trip.
pub struct PendingChallenge {
    session: Session,
    devices: Vec<VerificationDevice>,
    state: ChallengeState,
}

impl PendingChallenge {
    pub fn new(session: Session, devices: Vec<VerificationDevice>) -> Self {
        Self {
            session,
            devices,
            state: ChallengeState::AwaitingDeviceSelection,
        }
    }

    pub fn state(&self) -> &ChallengeState {
        &self.state
    }

    pub fn devices(&self) -> &[VerificationDevice] {
        &self.devices
    }

    /// `AwaitingDeviceSelection → AwaitingCode`. Out-of-range
    /// selection is terminal and not retryable within the invocation.
    pub fn select_device(&mut self, index: usize) -> Result<&VerificationDevice, Error> {
        if self.state != ChallengeState::AwaitingDeviceSelection {
            return Err(Error::InvalidServerResponse(
                "device already selected".to_string(),
            ));
        }
        if index >= self.devices.len() {
            return Err(Error::Selection {
                index,
                available: self.devices.len(),
            });
        }
        self.state = ChallengeState::AwaitingCode {
            device_index: index,
        };
        Ok(&self.devices[index])
    }

    /// `AwaitingCode → Verified | Rejected`. Exactly one network
    /// round trip; a rejected code is fatal, never retried (avoids
    /// silent brute-force-like retries).
    pub async fn submit_code<S: AccountService>(
        &mut self,
        service: &S,
        code: &str,
    ) -> Result<Session, Error> {
        let device_index = match self.state {
            ChallengeState::AwaitingCode { device_index } => device_index,
            _ => {
                return Err(Error::InvalidServerResponse(
                    "no device selected for verification".to_string(),
                ))
            }
        };

        let device = &self.devices[device_index];
        match service
            .reauthenticate_with_code(&self.session, device, code)
            .await
        {
            Ok(AuthOutcome::Authenticated(session)) => {
                self.state = ChallengeState::Verified;
                info!(device = %device.label, "verification accepted");
                Ok(session)
            }
            // The resulting session is re-validated by the service
            // call; anything other than a clean session means the
            // code did not verify.
            Ok(_) => {
                self.state = ChallengeState::Rejected;
                Err(Error::Verification)
            }
            Err(Error::Verification) => {
                self.state = ChallengeState::Rejected;
                warn!(device = %device.label, "verification code rejected");
                Err(Error::Verification)
            }
            Err(e) => Err(e),
        }
    }
}

/// Drives a pending challenge to completion, sourcing the device
/// selection and one-time code from upfront options or, when allowed,
/// interactive prompts.
pub struct ChallengeUseCase<S, P>
where
    S: AccountService,
    P: PromptInput,
{
    service: Arc<S>,
    prompt: Arc<P>,
}

impl<S, P> ChallengeUseCase<S, P>
where
    S: AccountService,
    P: PromptInput,
{
    pub fn new(service: Arc<S>, prompt: Arc<P>) -> Self {
        Self { service, prompt }
    }

    pub async fn execute(
        &self,
        session: Session,
        devices: Vec<VerificationDevice>,
        options: &ChallengeOptions,
    ) -> Result<Session, Error> {
        if !options.interactive && options.device_index.is_none() && options.code.is_none() {
            return Err(Error::usage(
                "account requires verification; supply --device or --code, or run interactively",
            ));
        }

        let mut challenge = PendingChallenge::new(session, devices);

        let index = match options.device_index {
            Some(index) => index,
            // With only a code supplied non-interactively, the first
            // listed device is the implicit default.
            None if !options.interactive => 0,
            None => self.prompt_device_index(challenge.devices())?,
        };
        challenge.select_device(index)?;

        let code = match &options.code {
            Some(code) => code.clone(),
            None if !options.interactive => {
                return Err(Error::usage(
                    "verification code required in non-interactive mode",
                ))
            }
            None => self.prompt.prompt_line("Verification code: ")?,
        };

        challenge.submit_code(self.service.as_ref(), &code).await
    }

    fn prompt_device_index(&self, devices: &[VerificationDevice]) -> Result<usize, Error> {
        let mut prompt = String::from("Verification devices:\n");
        for (index, device) in devices.iter().enumerate() {
            let _ = writeln!(prompt, "  {}: {}", index, device.label);
        }
        prompt.push_str("Device index: ");

        let reply = self.prompt.prompt_line(&prompt)?;
        reply
            .trim()
            .parse::<usize>()
            .map_err(|_| Error::usage(format!("invalid device selection '{}'", reply.trim())))
    }
}
