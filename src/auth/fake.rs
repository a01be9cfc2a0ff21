//! In-memory backend for exercising authenticators without HTTP.

use super::LoginMethod;
use crate::client::{BackendClient, Secret, SecretAuth};
use crate::config::AuthType;
use crate::error::AuthError;
use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct Shared {
    calls: Vec<(String, serde_json::Value)>,
    responses: VecDeque<Result<Secret, AuthError>>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeBackend {
    token: Option<SecretString>,
    latency: Duration,
    shared: Arc<Mutex<Shared>>,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn push_login(&self, token: &str, ttl_secs: u64) {
        self.push_response(login_response(token, ttl_secs));
    }

    pub(crate) fn push_response(&self, secret: Secret) {
        self.shared.lock().unwrap().responses.push_back(Ok(secret));
    }

    pub(crate) fn push_failure(&self, status: u16, message: &str) {
        self.shared
            .lock()
            .unwrap()
            .responses
            .push_back(Err(AuthError::ClientError {
                status,
                message: message.to_string(),
            }));
    }

    pub(crate) fn login_count(&self) -> usize {
        self.shared.lock().unwrap().calls.len()
    }

    pub(crate) fn calls(&self) -> Vec<(String, serde_json::Value)> {
        self.shared.lock().unwrap().calls.clone()
    }
}

pub(crate) fn login_response(token: &str, ttl_secs: u64) -> Secret {
    Secret {
        auth: Some(SecretAuth {
            client_token: SecretString::from(token.to_string()),
            accessor: String::new(),
            policies: vec!["default".to_string()],
            lease_duration: ttl_secs,
            renewable: true,
        }),
        ..Secret::default()
    }
}

#[async_trait]
impl BackendClient for FakeBackend {
    fn set_token(&mut self, token: SecretString) {
        self.token = Some(token);
    }

    fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    async fn write(&self, path: &str, payload: serde_json::Value) -> Result<Secret, AuthError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut shared = self.shared.lock().unwrap();
        shared.calls.push((path.to_string(), payload));
        shared
            .responses
            .pop_front()
            .unwrap_or_else(|| Err(AuthError::RequestError("no response queued".to_string())))
    }
}

pub(crate) struct FakeLogin;

#[async_trait]
impl LoginMethod for FakeLogin {
    fn auth_type(&self) -> AuthType {
        AuthType::AppRole
    }

    fn login_path(&self) -> String {
        "auth/fake/login".to_string()
    }

    async fn login_payload(&self) -> Result<serde_json::Value, AuthError> {
        Ok(serde_json::json!({"proof": "fake"}))
    }
}
