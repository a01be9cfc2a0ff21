use crate::config::lookup;
use crate::error::AuthError;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const ECS_CREDENTIALS_HOST: &str = "http://169.254.170.2";
const DEFAULT_IMDS_ENDPOINT: &str = "http://169.254.169.254";
const IMDS_TOKEN_TTL_SECS: &str = "21600";
const METADATA_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Variables read by [`AwsCredentialsProvider::from_env`]
const ENV_KEYS: &[&str] = &[
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "AWS_CONTAINER_CREDENTIALS_RELATIVE_URI",
    "AWS_CONTAINER_CREDENTIALS_FULL_URI",
    "AWS_CONTAINER_AUTHORIZATION_TOKEN",
    "AWS_CONTAINER_AUTHORIZATION_TOKEN_FILE",
    "AWS_EC2_METADATA_DISABLED",
    "AWS_EC2_METADATA_SERVICE_ENDPOINT",
];

/// AWS access keys used to sign the identity request
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    pub session_token: Option<SecretString>,
}

impl AwsCredentials {
    pub fn new(access_key_id: String, secret_access_key: SecretString) -> Self {
        Self {
            access_key_id,
            secret_access_key,
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: SecretString) -> Self {
        self.session_token = Some(token);
        self
    }

    /// Static keys from `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`
    pub fn from_environ(environ: &HashMap<String, String>) -> Option<Self> {
        let access_key_id = lookup(environ, "AWS_ACCESS_KEY_ID")?;
        let secret_access_key = lookup(environ, "AWS_SECRET_ACCESS_KEY")?;

        Some(Self {
            access_key_id: access_key_id.to_string(),
            secret_access_key: SecretString::from(secret_access_key.to_string()),
            session_token: lookup(environ, "AWS_SESSION_TOKEN")
                .map(|token| SecretString::from(token.to_string())),
        })
    }
}

/// Where credentials come from
#[derive(Debug, Clone)]
pub enum CredentialSource {
    Static(AwsCredentials),
    /// ECS task role or EKS Pod Identity agent
    Container {
        uri: String,
        authorization: Option<SecretString>,
        authorization_file: Option<String>,
    },
    /// EC2 instance profile via IMDSv2
    InstanceMetadata { endpoint: String },
}

/// Resolves AWS credentials from a chain of sources: static keys, container
/// credentials endpoint, then the EC2 instance metadata service.
#[derive(Debug, Clone)]
pub struct AwsCredentialsProvider {
    sources: Vec<CredentialSource>,
}

impl AwsCredentialsProvider {
    pub fn new(sources: Vec<CredentialSource>) -> Self {
        Self { sources }
    }

    pub fn fixed(credentials: AwsCredentials) -> Self {
        Self::new(vec![CredentialSource::Static(credentials)])
    }

    /// Chain for the process environment. Only the AWS variables are read.
    pub fn from_env() -> Self {
        let environ: HashMap<String, String> = ENV_KEYS
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|value| (key.to_string(), value)))
            .collect();
        Self::from_environ(&environ)
    }

    pub fn from_environ(environ: &HashMap<String, String>) -> Self {
        let mut sources = Vec::new();

        if let Some(credentials) = AwsCredentials::from_environ(environ) {
            sources.push(CredentialSource::Static(credentials));
        }

        let container_uri = lookup(environ, "AWS_CONTAINER_CREDENTIALS_RELATIVE_URI")
            .map(|relative| format!("{ECS_CREDENTIALS_HOST}{relative}"))
            .or_else(|| lookup(environ, "AWS_CONTAINER_CREDENTIALS_FULL_URI").map(str::to_string));
        if let Some(uri) = container_uri {
            sources.push(CredentialSource::Container {
                uri,
                authorization: lookup(environ, "AWS_CONTAINER_AUTHORIZATION_TOKEN")
                    .map(|token| SecretString::from(token.to_string())),
                authorization_file: lookup(environ, "AWS_CONTAINER_AUTHORIZATION_TOKEN_FILE")
                    .map(str::to_string),
            });
        }

        let imds_disabled = lookup(environ, "AWS_EC2_METADATA_DISABLED")
            .is_some_and(|value| value.eq_ignore_ascii_case("true"));
        if !imds_disabled {
            let endpoint = lookup(environ, "AWS_EC2_METADATA_SERVICE_ENDPOINT")
                .unwrap_or(DEFAULT_IMDS_ENDPOINT)
                .trim_end_matches('/')
                .to_string();
            sources.push(CredentialSource::InstanceMetadata { endpoint });
        }

        Self { sources }
    }

    pub fn sources(&self) -> &[CredentialSource] {
        &self.sources
    }

    /// First source that yields credentials wins
    pub async fn provide(&self) -> Result<AwsCredentials, AuthError> {
        let mut failures = Vec::new();

        for source in &self.sources {
            let result = match source {
                CredentialSource::Static(credentials) => return Ok(credentials.clone()),
                CredentialSource::Container {
                    uri,
                    authorization,
                    authorization_file,
                } => {
                    fetch_container(uri, authorization.as_ref(), authorization_file.as_deref())
                        .await
                }
                CredentialSource::InstanceMetadata { endpoint } => fetch_imds(endpoint).await,
            };

            match result {
                Ok(credentials) => return Ok(credentials),
                Err(e) => {
                    tracing::debug!("AWS credential source failed: {}", e);
                    failures.push(e.to_string());
                }
            }
        }

        if failures.is_empty() {
            return Err(AuthError::IamError("no AWS credentials available".to_string()));
        }
        Err(AuthError::IamError(format!(
            "no AWS credentials available: {}",
            failures.join("; ")
        )))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CredentialsResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    access_key_id: Option<String>,
    #[serde(default)]
    secret_access_key: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

impl CredentialsResponse {
    fn into_credentials(self, source: &str) -> Result<AwsCredentials, AuthError> {
        if let Some(code) = self.code.filter(|code| code != "Success") {
            return Err(AuthError::IamError(format!(
                "{source} returned {code}: {}",
                self.message.unwrap_or_default()
            )));
        }

        match (self.access_key_id, self.secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => Ok(AwsCredentials {
                access_key_id,
                secret_access_key: SecretString::from(secret_access_key),
                session_token: self.token.map(SecretString::from),
            }),
            _ => Err(AuthError::IamError(format!("{source} returned no access keys"))),
        }
    }
}

fn metadata_client() -> Result<reqwest::Client, AuthError> {
    reqwest::Client::builder()
        .connect_timeout(METADATA_CONNECT_TIMEOUT)
        .timeout(METADATA_TIMEOUT)
        .build()
        .map_err(|e| AuthError::IamError(format!("failed to build metadata client: {}", e)))
}

async fn get_text(request: reqwest::RequestBuilder, source: &str) -> Result<String, AuthError> {
    let response = request
        .send()
        .await
        .map_err(|e| AuthError::IamError(format!("{source} request failed: {}", e)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AuthError::IamError(format!("{source} request failed: {}", e)))?;

    if !status.is_success() {
        return Err(AuthError::IamError(format!(
            "{source} returned {}: {}",
            status.as_u16(),
            body
        )));
    }

    Ok(body)
}

async fn fetch_container(
    uri: &str,
    authorization: Option<&SecretString>,
    authorization_file: Option<&str>,
) -> Result<AwsCredentials, AuthError> {
    use secrecy::ExposeSecret;

    const SOURCE: &str = "container credentials endpoint";

    let authorization = match (authorization, authorization_file) {
        (Some(token), _) => Some(token.expose_secret().to_string()),
        (None, Some(path)) => Some(
            std::fs::read_to_string(path)
                .map(|s| s.trim().to_string())
                .map_err(|e| {
                    AuthError::IamError(format!(
                        "Failed to read container authorization token from {}: {}",
                        path, e
                    ))
                })?,
        ),
        (None, None) => None,
    };

    let mut request = metadata_client()?.get(uri);
    if let Some(authorization) = authorization {
        request = request.header("Authorization", authorization);
    }

    let body = get_text(request, SOURCE).await?;
    let response: CredentialsResponse = serde_json::from_str(&body)?;
    response.into_credentials(SOURCE)
}

/// IMDSv2: session token, then the instance role name, then its credentials
async fn fetch_imds(endpoint: &str) -> Result<AwsCredentials, AuthError> {
    const SOURCE: &str = "instance metadata service";

    let client = metadata_client()?;

    let token = get_text(
        client
            .put(format!("{endpoint}/latest/api/token"))
            .header("X-aws-ec2-metadata-token-ttl-seconds", IMDS_TOKEN_TTL_SECS),
        SOURCE,
    )
    .await?;

    let roles_url = format!("{endpoint}/latest/meta-data/iam/security-credentials/");
    let roles = get_text(
        client
            .get(&roles_url)
            .header("X-aws-ec2-metadata-token", token.trim()),
        SOURCE,
    )
    .await?;
    let role = roles
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| AuthError::IamError(format!("{SOURCE} has no instance role")))?;

    let body = get_text(
        client
            .get(format!("{roles_url}{role}"))
            .header("X-aws-ec2-metadata-token", token.trim()),
        SOURCE,
    )
    .await?;
    let response: CredentialsResponse = serde_json::from_str(&body)?;
    response.into_credentials(SOURCE)
}
