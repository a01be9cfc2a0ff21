use super::Authenticator;
use crate::client::BackendClient;
use crate::config::AuthType;
use crate::error::AuthError;
use async_trait::async_trait;
use secrecy::SecretString;

/// Static token authentication.
///
/// The token is set once and assumed valid for the lifetime of the process.
pub struct TokenAuthenticator<C> {
    client: C,
}

impl<C: BackendClient> TokenAuthenticator<C> {
    pub fn new(mut client: C, token: SecretString) -> Self {
        client.set_token(token);
        Self { client }
    }
}

#[async_trait]
impl<C: BackendClient> Authenticator<C> for TokenAuthenticator<C> {
    async fn handle(&self) -> Result<C, AuthError> {
        Ok(self.client.clone())
    }

    fn auth_type(&self) -> AuthType {
        AuthType::Token
    }
}
