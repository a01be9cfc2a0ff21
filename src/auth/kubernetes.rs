use super::{LoginMethod, RefreshingAuthenticator};
use crate::config::AuthType;
use crate::error::AuthError;
use async_trait::async_trait;
use serde::Serialize;

const DEFAULT_JWT_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Kubernetes service-account authenticator
pub type K8sAuthenticator<C> = RefreshingAuthenticator<C, K8sLogin>;

/// Kubernetes login: presents the pod's service-account JWT.
///
/// The token file is read on every login since kubelet rotates it.
pub struct K8sLogin {
    pub role: String,
    pub path: String,
    pub jwt_path: String,
}

impl K8sLogin {
    pub fn new(role: String, path: String) -> Self {
        Self {
            role,
            path,
            jwt_path: DEFAULT_JWT_PATH.to_string(),
        }
    }

    pub fn with_jwt_path(mut self, path: String) -> Self {
        self.jwt_path = path;
        self
    }

    fn read_jwt(&self) -> Result<String, AuthError> {
        std::fs::read_to_string(&self.jwt_path)
            .map(|s| s.trim().to_string())
            .map_err(|e| {
                AuthError::KubernetesError(format!(
                    "Failed to read JWT from {}: {}",
                    self.jwt_path, e
                ))
            })
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    jwt: String,
    role: &'a str,
}

#[async_trait]
impl LoginMethod for K8sLogin {
    fn auth_type(&self) -> AuthType {
        AuthType::K8s
    }

    fn login_path(&self) -> String {
        format!("auth/{}/login", self.path.trim_matches('/'))
    }

    async fn login_payload(&self) -> Result<serde_json::Value, AuthError> {
        let jwt = self.read_jwt()?;

        Ok(serde_json::to_value(LoginRequest {
            jwt,
            role: &self.role,
        })?)
    }
}
