use crate::auth::{
    AppRoleLogin, Authenticator, IamLogin, K8sLogin, RefreshingAuthenticator, TokenAuthenticator,
};
use crate::client::{BackendClient, VaultClient};
use crate::config::{AuthType, ClientSettings, Config};
use crate::error::AuthError;
use secrecy::SecretString;

/// Authenticator for the process environment, backed by [`VaultClient`]
pub fn from_env() -> Result<Box<dyn Authenticator<VaultClient>>, AuthError> {
    build_authenticator(Config::from_env()?)
}

/// Build the authenticator selected by `config`, backed by [`VaultClient`]
pub fn build_authenticator(config: Config) -> Result<Box<dyn Authenticator<VaultClient>>, AuthError> {
    build_authenticator_with(config, VaultClient::new)
}

/// Build the authenticator selected by `config` on a client made by `connect`.
///
/// Only the fields of the selected strategy are used. A static token is set
/// on the client immediately.
pub fn build_authenticator_with<C, F>(
    config: Config,
    connect: F,
) -> Result<Box<dyn Authenticator<C>>, AuthError>
where
    C: BackendClient,
    F: FnOnce(&ClientSettings) -> Result<C, AuthError>,
{
    let client = connect(&config.client)?;
    let auth_type = config.auth_type;

    let authenticator: Box<dyn Authenticator<C>> = match auth_type {
        AuthType::Token => {
            let token = config.token.unwrap_or_else(|| SecretString::from(String::new()));
            Box::new(TokenAuthenticator::new(client, token))
        }
        AuthType::AppRole => {
            let secret_id = config
                .app_role_secret_id
                .unwrap_or_else(|| SecretString::from(String::new()));
            Box::new(RefreshingAuthenticator::new(
                client,
                AppRoleLogin::new(config.app_role, config.app_role_id, secret_id),
            ))
        }
        AuthType::Iam => Box::new(RefreshingAuthenticator::new(
            client,
            IamLogin::new(config.iam_role)
                .with_region(config.iam_region)
                .with_server_id(config.iam_server_id)
                .with_credentials(config.aws_credentials),
        )),
        AuthType::K8s => Box::new(RefreshingAuthenticator::new(
            client,
            K8sLogin::new(config.k8s_role, config.k8s_path).with_jwt_path(config.k8s_jwt_path),
        )),
    };

    tracing::debug!(auth_type = %auth_type, "Vault authenticator created");
    Ok(authenticator)
}
