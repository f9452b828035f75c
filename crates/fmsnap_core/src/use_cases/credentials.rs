use std::sync::Arc;

use tracing::debug;

use crate::entities::{AccountId, Credentials};
use crate::error::Error;
use crate::ports::{CredentialStore, PromptInput};

/// How a run wants its credentials resolved.
#[derive(Debug, Clone)]
pub struct CredentialRequest {
    pub username: String,
    /// Explicit password argument, used verbatim when present.
    pub password: Option<String>,
    /// When false, prompting is forbidden and a missing password is a
    /// usage error.
    pub interactive: bool,
}

/// Resolves a username/password pair from explicit arguments, the
/// stored keyring, or a masked interactive prompt, in that order.
/// Credentials are immutable once resolved for a run.
pub struct CredentialResolver<C, P>
where
    C: CredentialStore,
    P: PromptInput,
{
    credential_store: Arc<C>,
    prompt: Arc<P>,
}

impl<C, P> CredentialResolver<C, P>
where
    C: CredentialStore,
    P: PromptInput,
{
    pub fn new(credential_store: Arc<C>, prompt: Arc<P>) -> Self {
        Self {
            credential_store,
            prompt,
        }
    }

    pub async fn resolve(&self, request: &CredentialRequest) -> Result<Credentials, Error> {
        if request.username.is_empty() {
            return Err(Error::usage("a username is required"));
        }

        // Explicit argument wins; no prompting occurs even if the
        // service later rejects it.
        if let Some(password) = &request.password {
            return Ok(Credentials::new(
                request.username.clone(),
                password.clone(),
            ));
        }

        let account_id = AccountId::new(&request.username);
        if let Some(stored) = self.credential_store.get_password(&account_id).await? {
            debug!(username = %request.username, "using stored password");
            return Ok(Credentials::new(request.username.clone(), stored));
        }

        if !request.interactive {
            return Err(Error::usage(format!(
                "no password available for {} and prompting is disabled",
                request.username
            )));
        }

        match self.prompt.prompt_secret("Password: ")? {
            Some(password) => Ok(Credentials::new(request.username.clone(), password)),
            // An empty reply means "no password supplied".
            None => Err(Error::usage(format!(
                "no password supplied for {}",
                request.username
            ))),
        }
    }
}
