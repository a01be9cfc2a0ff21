use super::{Authenticator, Credential, LoginMethod, is_stale};
use crate::client::BackendClient;
use crate::config::AuthType;
use crate::error::AuthError;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

struct State<C> {
    client: C,
    credential: Option<Credential>,
    /// Attempt number and error of the most recent failed login
    last_failure: Option<(u64, AuthError)>,
}

/// Caches the credential obtained by a [`LoginMethod`] and logs in again
/// once it is within [`EXPIRATION_WINDOW`](super::EXPIRATION_WINDOW) of expiry.
///
/// The check, login and replacement all happen under one lock, so at most one
/// login is in flight; concurrent callers wait and then reuse its result,
/// whether that is a fresh credential or the login error.
pub struct RefreshingAuthenticator<C, M> {
    method: M,
    attempts: AtomicU64,
    state: Mutex<State<C>>,
}

impl<C: BackendClient, M: LoginMethod> RefreshingAuthenticator<C, M> {
    pub fn new(client: C, method: M) -> Self {
        Self {
            method,
            attempts: AtomicU64::new(0),
            state: Mutex::new(State {
                client,
                credential: None,
                last_failure: None,
            }),
        }
    }

    pub fn method(&self) -> &M {
        &self.method
    }

    /// Currently held credential, if any
    pub async fn credential(&self) -> Option<Credential> {
        self.state.lock().await.credential.clone()
    }

    async fn login(&self, client: &C) -> Result<Credential, AuthError> {
        let path = self.method.login_path();
        tracing::debug!(auth_type = %self.method.auth_type(), path = %path, "Logging in to Vault");

        let payload = self.method.login_payload().await?;
        let secret = client.write(&path, payload).await?;

        let ttl = secret.token_ttl()?;
        let token = secret
            .client_token()
            .cloned()
            .ok_or_else(|| AuthError::InvalidResponse("no auth data in login response".to_string()))?;

        Ok(Credential::issued(token, Utc::now(), ttl))
    }

    #[cfg(test)]
    pub(crate) async fn set_credential(&self, credential: Credential) {
        self.state.lock().await.credential = Some(credential);
    }
}

#[async_trait]
impl<C: BackendClient, M: LoginMethod> Authenticator<C> for RefreshingAuthenticator<C, M> {
    async fn handle(&self) -> Result<C, AuthError> {
        let seen = self.attempts.load(Ordering::Acquire);
        let mut state = self.state.lock().await;

        if !is_stale(state.credential.as_ref(), Utc::now()) {
            tracing::debug!("Cached Vault credential is valid");
            return Ok(state.client.clone());
        }

        // A login that finished while we waited for the lock has failed
        if let Some((attempt, e)) = &state.last_failure {
            if *attempt > seen {
                return Err(e.clone());
            }
        }

        let result = self.login(&state.client).await;
        let attempt = self.attempts.fetch_add(1, Ordering::AcqRel) + 1;

        let credential = match result {
            Ok(credential) => credential,
            Err(e) => {
                tracing::warn!(auth_type = %self.method.auth_type(), "Vault login failed: {}", e);
                state.last_failure = Some((attempt, e.clone()));
                return Err(e);
            }
        };

        state.last_failure = None;
        state.client.set_token(credential.token().clone());
        tracing::info!(
            auth_type = %self.method.auth_type(),
            expires_at = %credential.expires_at(),
            "Vault credential refreshed"
        );
        state.credential = Some(credential);

        Ok(state.client.clone())
    }

    fn auth_type(&self) -> AuthType {
        self.method.auth_type()
    }
}
