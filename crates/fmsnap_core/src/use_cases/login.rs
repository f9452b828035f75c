use std::sync::Arc;

use tracing::{info, warn};

use crate::entities::{AccountId, AuthOutcome, Credentials};
use crate::error::Error;
use crate::ports::{AccountService, CredentialStore};

/// Performs one authentication attempt and applies the
/// credential-retry policy:
/// - wrong credentials become a fatal error naming the username, and
///   any cached password for that identity is invalidated so a stale
///   bad password is never silently reused on the next run;
/// - a required secondary verification is a normal outcome, passed
///   through for the challenge flow;
/// - a challenge with zero devices is a fatal inconsistency.
pub struct LoginUseCase<S, C>
where
    S: AccountService,
    C: CredentialStore,
{
    service: Arc<S>,
    credential_store: Arc<C>,
    save_password: bool,
}

impl<S, C> LoginUseCase<S, C>
where
    S: AccountService,
    C: CredentialStore,
{
    pub fn new(service: Arc<S>, credential_store: Arc<C>) -> Self {
        Self {
            service,
            credential_store,
            save_password: false,
        }
    }

    /// Store the password in the credential store once the service
    /// accepts it.
    pub fn save_password(mut self, save: bool) -> Self {
        self.save_password = save;
        self
    }

    pub async fn execute(&self, credentials: &Credentials) -> Result<AuthOutcome, Error> {
        let outcome = self.service.authenticate(credentials).await?;

        match outcome {
            AuthOutcome::Authenticated(session) => {
                info!(username = %credentials.username, "authenticated");
                self.persist_accepted_password(credentials).await;
                Ok(AuthOutcome::Authenticated(session))
            }
            AuthOutcome::InvalidCredentials { username } => {
                self.invalidate_cached_password(&AccountId::new(&username))
                    .await;
                Err(Error::InvalidCredentials { username })
            }
            AuthOutcome::ChallengeRequired { session, devices } => {
                if devices.is_empty() {
                    return Err(Error::InvalidServerResponse(
                        "verification required but no devices listed".to_string(),
                    ));
                }
                info!(
                    username = %credentials.username,
                    devices = devices.len(),
                    "secondary verification required"
                );
                // The password was accepted; only the second factor is
                // still pending.
                self.persist_accepted_password(credentials).await;
                Ok(AuthOutcome::ChallengeRequired { session, devices })
            }
        }
    }

    /// Opt-in save of an accepted password. Storage failures are
    /// logged, not surfaced: the login itself succeeded.
    async fn persist_accepted_password(&self, credentials: &Credentials) {
        if !self.save_password {
            return;
        }
        if let Err(e) = self
            .credential_store
            .store_password(&credentials.account_id(), &credentials.password)
            .await
        {
            warn!(username = %credentials.username, error = %e, "failed to save password");
        }
    }

    /// Post-condition of the invalid-credentials outcome. Storage
    /// failures are logged, not surfaced: the rejection itself is the
    /// error the caller needs.
    async fn invalidate_cached_password(&self, account_id: &AccountId) {
        if let Err(e) = self.credential_store.delete_password(account_id).await {
            warn!(account = %account_id, error = %e, "failed to clear cached password");
        }
    }
}
