use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("failed to determine auth type from env")]
    NoAuthType,

    #[error("unknown auth type '{tag}'")]
    UnknownAuthType { tag: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to build Vault client: {0}")]
    ClientBuild(String),

    #[error("Vault client error ({status}): {message}")]
    ClientError { status: u16, message: String },

    #[error("Vault request error: {0}")]
    RequestError(String),

    #[error("Invalid login response: {0}")]
    InvalidResponse(String),

    #[error("Kubernetes auth failed: {0}")]
    KubernetesError(String),

    #[error("IAM auth failed: {0}")]
    IamError(String),

    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("JSON error: {0}")]
    Json(Arc<serde_json::Error>),
}

impl From<std::io::Error> for AuthError {
    fn from(e: std::io::Error) -> Self {
        AuthError::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(e: serde_json::Error) -> Self {
        AuthError::Json(Arc::new(e))
    }
}

impl AuthError {
    /// Errors raised while resolving configuration or building the client.
    /// These are never fixed by retrying `handle()`.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AuthError::NoAuthType
                | AuthError::UnknownAuthType { .. }
                | AuthError::InvalidConfig(_)
                | AuthError::ClientBuild(_)
        )
    }
}
