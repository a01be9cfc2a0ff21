use crate::config::ClientSettings;
use crate::error::AuthError;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

/// Minimal surface of a secrets backend client needed to log in.
///
/// Implementations are cheap to clone; a clone carries the token that was
/// set at the time of cloning.
#[async_trait]
pub trait BackendClient: Clone + Send + Sync + 'static {
    fn set_token(&mut self, token: SecretString);

    fn token(&self) -> Option<&SecretString>;

    /// Write `payload` to `path` (relative to `/v1/`)
    async fn write(&self, path: &str, payload: serde_json::Value) -> Result<Secret, AuthError>;
}

/// Response of a backend write
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secret {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub auth: Option<SecretAuth>,
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecretAuth {
    pub client_token: SecretString,
    #[serde(default)]
    pub accessor: String,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
}

impl Secret {
    /// Token TTL: the auth lease, else `data.ttl`, else zero.
    pub fn token_ttl(&self) -> Result<Duration, AuthError> {
        if let Some(auth) = self.auth.as_ref().filter(|auth| auth.lease_duration > 0) {
            return Ok(Duration::from_secs(auth.lease_duration));
        }

        match self.data.as_ref().and_then(|data| data.get("ttl")) {
            None | Some(serde_json::Value::Null) => Ok(Duration::ZERO),
            Some(serde_json::Value::Number(n)) => n
                .as_u64()
                .map(Duration::from_secs)
                .ok_or_else(|| AuthError::InvalidResponse(format!("invalid ttl: {n}"))),
            Some(serde_json::Value::String(s)) => s
                .parse()
                .map(Duration::from_secs)
                .map_err(|_| AuthError::InvalidResponse(format!("invalid ttl: {s}"))),
            Some(other) => Err(AuthError::InvalidResponse(format!("invalid ttl: {other}"))),
        }
    }

    pub fn client_token(&self) -> Option<&SecretString> {
        self.auth.as_ref().map(|auth| &auth.client_token)
    }
}

/// HTTP client for the Vault API
#[derive(Clone)]
pub struct VaultClient {
    base_url: String,
    namespace: Option<String>,
    token: Option<SecretString>,
    http: reqwest::Client,
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("base_url", &self.base_url)
            .field("namespace", &self.namespace)
            .field("token", &self.token)
            .finish()
    }
}

impl VaultClient {
    pub fn new(settings: &ClientSettings) -> Result<Self, AuthError> {
        let base_url = settings.address.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url)
            .map_err(|e| AuthError::ClientBuild(format!("invalid address '{base_url}': {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(settings.skip_verify)
            .build()
            .map_err(|e| AuthError::ClientBuild(e.to_string()))?;

        Ok(Self {
            base_url,
            namespace: settings.namespace.clone(),
            token: None,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl BackendClient for VaultClient {
    fn set_token(&mut self, token: SecretString) {
        self.token = Some(token);
    }

    fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    async fn write(&self, path: &str, payload: serde_json::Value) -> Result<Secret, AuthError> {
        let url = format!("{}/v1/{}", self.base_url, path.trim_start_matches('/'));

        let mut request = self
            .http
            .post(&url)
            .header("X-Vault-Request", "true")
            .json(&payload);

        if let Some(ref token) = self.token {
            request = request.header("X-Vault-Token", token.expose_secret());
        }
        if let Some(ref namespace) = self.namespace {
            request = request.header("X-Vault-Namespace", namespace);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::RequestError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::ClientError {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(Secret::default());
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))
    }
}

/// Joins Vault's `{"errors": [...]}` body, falling back to the raw text
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorResponse {
        errors: Vec<String>,
    }

    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(resp) if !resp.errors.is_empty() => resp.errors.join(", "),
        _ => body.to_string(),
    }
}
