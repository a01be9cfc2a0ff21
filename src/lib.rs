//! vault-auth - credential lifecycle for HashiCorp Vault clients
//!
//! Picks an authentication method from the environment (first match wins),
//! unless VAULT_AUTH_TYPE names one explicitly:
//! 1. VAULT_APP_ROLE + VAULT_APP_ROLE_ID + VAULT_APP_SECRET_ID → AppRole
//! 2. VAULT_ROLE → AWS IAM
//! 3. K8S_ROLE → Kubernetes service account
//! 4. VAULT_TOKEN → static token
//!
//! Callers ask the resulting [`Authenticator`] for a client handle; expiring
//! credentials are refreshed on access.

pub mod auth;
mod client;
mod config;
mod error;
mod factory;

pub use auth::{
    AppRoleAuthenticator, Authenticator, AwsCredentials, AwsCredentialsProvider, Credential,
    EXPIRATION_WINDOW, IamAuthenticator, K8sAuthenticator, LoginMethod, TokenAuthenticator,
};
pub use client::{BackendClient, Secret, SecretAuth, VaultClient};
pub use config::{AuthType, ClientSettings, Config, ENV_VAR_AWS_REGION, ENV_VAR_STS_AWS_REGION};
pub use error::AuthError;
pub use factory::{build_authenticator, build_authenticator_with, from_env};
