mod approle;
mod aws_credentials;
mod credential;
mod iam;
mod kubernetes;
mod refreshing;
mod token;

#[cfg(test)]
pub(crate) mod fake;

pub use approle::{AppRoleAuthenticator, AppRoleLogin};
pub use credential::{Credential, EXPIRATION_WINDOW, is_stale};
pub use aws_credentials::{AwsCredentials, AwsCredentialsProvider, CredentialSource};
pub use iam::{IamAuthenticator, IamLogin};
pub use kubernetes::{K8sAuthenticator, K8sLogin};
pub use refreshing::RefreshingAuthenticator;
pub use token::TokenAuthenticator;

use crate::client::BackendClient;
use crate::config::AuthType;
use crate::error::AuthError;
use async_trait::async_trait;

/// Hands out backend clients that carry a currently valid token.
#[async_trait]
pub trait Authenticator<C: BackendClient>: Send + Sync {
    /// Client with a valid token, logging in first if the held credential is
    /// stale. On login failure no client is returned.
    async fn handle(&self) -> Result<C, AuthError>;

    /// Like [`handle`](Authenticator::handle), for call sites that cannot
    /// continue without an identity.
    ///
    /// # Panics
    ///
    /// Panics if authentication fails. Use `handle()` where failure is
    /// recoverable.
    async fn handle_or_fail(&self) -> C {
        match self.handle().await {
            Ok(client) => client,
            Err(e) => panic!("Vault authentication failed ({}): {}", self.auth_type(), e),
        }
    }

    fn auth_type(&self) -> AuthType;
}

/// Strategy-specific login call
#[async_trait]
pub trait LoginMethod: Send + Sync {
    fn auth_type(&self) -> AuthType;

    /// Path of the login endpoint, relative to `/v1/`
    fn login_path(&self) -> String;

    /// Proof of identity sent to the login endpoint
    async fn login_payload(&self) -> Result<serde_json::Value, AuthError>;
}
