use super::{LoginMethod, RefreshingAuthenticator};
use crate::config::AuthType;
use crate::error::AuthError;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

const APPROLE_LOGIN_PATH: &str = "auth/approle/login";

/// AppRole authenticator
pub type AppRoleAuthenticator<C> = RefreshingAuthenticator<C, AppRoleLogin>;

/// AppRole login: exchanges role-id and secret-id for a token
pub struct AppRoleLogin {
    pub role: String,
    pub role_id: String,
    secret_id: SecretString,
}

impl AppRoleLogin {
    pub fn new(role: String, role_id: String, secret_id: SecretString) -> Self {
        Self {
            role,
            role_id,
            secret_id,
        }
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    role_id: &'a str,
    secret_id: &'a str,
}

#[async_trait]
impl LoginMethod for AppRoleLogin {
    fn auth_type(&self) -> AuthType {
        AuthType::AppRole
    }

    fn login_path(&self) -> String {
        APPROLE_LOGIN_PATH.to_string()
    }

    async fn login_payload(&self) -> Result<serde_json::Value, AuthError> {
        Ok(serde_json::to_value(LoginRequest {
            role_id: &self.role_id,
            secret_id: self.secret_id.expose_secret(),
        })?)
    }
}
