use crate::auth::AwsCredentialsProvider;
use crate::error::AuthError;
use secrecy::SecretString;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_ADDRESS: &str = "https://127.0.0.1:8200";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_K8S_JWT_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

pub const ENV_VAR_AWS_REGION: &str = "AWS_REGION";
pub const ENV_VAR_STS_AWS_REGION: &str = "STS_AWS_REGION";

/// Authentication strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    Token,
    Iam,
    AppRole,
    K8s,
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::Token => "token",
            AuthType::Iam => "iam",
            AuthType::AppRole => "approle",
            AuthType::K8s => "k8s",
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthType {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "token" => Ok(AuthType::Token),
            "iam" | "aws" => Ok(AuthType::Iam),
            "approle" => Ok(AuthType::AppRole),
            "k8s" | "kubernetes" => Ok(AuthType::K8s),
            _ => Err(AuthError::UnknownAuthType { tag: s.to_string() }),
        }
    }
}

/// Numeric tags, starting at 1 in declaration order
impl TryFrom<u8> for AuthType {
    type Error = AuthError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(AuthType::Token),
            2 => Ok(AuthType::Iam),
            3 => Ok(AuthType::AppRole),
            4 => Ok(AuthType::K8s),
            _ => Err(AuthError::UnknownAuthType {
                tag: tag.to_string(),
            }),
        }
    }
}

/// Transport settings for the backend client
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub address: String,
    pub namespace: Option<String>,
    pub timeout: Duration,
    pub skip_verify: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            namespace: None,
            timeout: DEFAULT_TIMEOUT,
            skip_verify: false,
        }
    }
}

impl ClientSettings {
    fn from_environ(environ: &HashMap<String, String>) -> Result<Self, AuthError> {
        let mut settings = Self::default();

        if let Some(address) = lookup(environ, "VAULT_ADDR") {
            settings.address = address.trim_end_matches('/').to_string();
        }

        settings.namespace = lookup(environ, "VAULT_NAMESPACE").map(str::to_string);

        if let Some(timeout) = lookup(environ, "VAULT_CLIENT_TIMEOUT") {
            settings.timeout = parse_duration(timeout).ok_or_else(|| {
                AuthError::InvalidConfig(format!("VAULT_CLIENT_TIMEOUT is not a duration: {timeout}"))
            })?;
        }

        if let Some(skip) = lookup(environ, "VAULT_SKIP_VERIFY") {
            settings.skip_verify = parse_bool(skip).ok_or_else(|| {
                AuthError::InvalidConfig(format!("VAULT_SKIP_VERIFY is not a boolean: {skip}"))
            })?;
        }

        Ok(settings)
    }
}

/// Resolved configuration: the active strategy plus the fields it needs.
///
/// Fields that belong to other strategies are carried along but ignored.
#[derive(Debug, Clone)]
pub struct Config {
    pub client: ClientSettings,
    pub auth_type: AuthType,
    pub token: Option<SecretString>,
    pub iam_role: String,
    pub iam_region: Option<String>,
    pub iam_server_id: Option<String>,
    pub aws_credentials: AwsCredentialsProvider,
    pub app_role: String,
    pub app_role_id: String,
    pub app_role_secret_id: Option<SecretString>,
    pub k8s_role: String,
    pub k8s_path: String,
    pub k8s_jwt_path: String,
}

impl Config {
    /// Base config for the given strategy, with every strategy field empty
    pub fn new(auth_type: AuthType) -> Self {
        Self {
            client: ClientSettings::default(),
            auth_type,
            token: None,
            iam_role: String::new(),
            iam_region: None,
            iam_server_id: None,
            aws_credentials: AwsCredentialsProvider::from_environ(&HashMap::new()),
            app_role: String::new(),
            app_role_id: String::new(),
            app_role_secret_id: None,
            k8s_role: String::new(),
            k8s_path: String::new(),
            k8s_jwt_path: DEFAULT_K8S_JWT_PATH.to_string(),
        }
    }

    /// Resolve from the process environment. Variables whose name or value
    /// is not valid UTF-8 are skipped.
    pub fn from_env() -> Result<Self, AuthError> {
        let environ: HashMap<String, String> = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Self::from_environ(&environ)
    }

    /// Resolve from an explicit environment map.
    ///
    /// The first matching strategy wins: explicit `VAULT_AUTH_TYPE`, AppRole,
    /// IAM, Kubernetes, static token.
    pub fn from_environ(environ: &HashMap<String, String>) -> Result<Self, AuthError> {
        let auth_type = match lookup(environ, "VAULT_AUTH_TYPE") {
            Some(tag) => tag.parse()?,
            None => detect_auth_type(environ)?,
        };

        let mut config = Self::new(auth_type);
        config.client = ClientSettings::from_environ(environ)?;

        config.token = lookup(environ, "VAULT_TOKEN").map(secret);

        config.app_role = lookup(environ, "VAULT_APP_ROLE").unwrap_or_default().to_string();
        config.app_role_id = lookup(environ, "VAULT_APP_ROLE_ID").unwrap_or_default().to_string();
        config.app_role_secret_id = lookup(environ, "VAULT_APP_SECRET_ID").map(secret);

        config.iam_role = lookup(environ, "VAULT_ROLE").unwrap_or_default().to_string();
        config.iam_region = lookup(environ, ENV_VAR_STS_AWS_REGION)
            .or_else(|| lookup(environ, ENV_VAR_AWS_REGION))
            .map(str::to_string);
        config.iam_server_id = lookup(environ, "VAULT_IAM_SERVER_ID").map(str::to_string);
        config.aws_credentials = AwsCredentialsProvider::from_environ(environ);

        config.k8s_role = lookup(environ, "K8S_ROLE").unwrap_or_default().to_string();
        config.k8s_path = match lookup(environ, "K8S_PATH") {
            Some(path) => path.to_string(),
            None => default_k8s_path(&config.k8s_role),
        };
        if let Some(jwt_path) = lookup(environ, "K8S_JWT_TOKEN_PATH") {
            config.k8s_jwt_path = jwt_path.to_string();
        }

        Ok(config)
    }
}

pub fn default_k8s_path(role: &str) -> String {
    format!("k8s-{role}")
}

fn detect_auth_type(environ: &HashMap<String, String>) -> Result<AuthType, AuthError> {
    let app_role = lookup(environ, "VAULT_APP_ROLE");
    let app_role_id = lookup(environ, "VAULT_APP_ROLE_ID");
    let app_role_secret_id = lookup(environ, "VAULT_APP_SECRET_ID");
    if app_role.is_some() && app_role_id.is_some() && app_role_secret_id.is_some() {
        return Ok(AuthType::AppRole);
    }

    if lookup(environ, "VAULT_ROLE").is_some() {
        return Ok(AuthType::Iam);
    }

    if lookup(environ, "K8S_ROLE").is_some() {
        return Ok(AuthType::K8s);
    }

    if lookup(environ, "VAULT_TOKEN").is_some() {
        return Ok(AuthType::Token);
    }

    Err(AuthError::NoAuthType)
}

/// Empty values count as unset
pub(crate) fn lookup<'a>(environ: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    environ
        .get(key)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

fn secret(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

/// Bare seconds (`"30"`) or unit-suffixed segments (`"1m30s"`, `"500ms"`).
/// Supported units are `ms`, `s`, `m` and `h`.
fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = value;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit())?;
        if digits == 0 {
            return None;
        }
        let amount: u64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let segment = match &rest[..unit_len] {
            "ms" => Duration::from_millis(amount),
            "s" => Duration::from_secs(amount),
            "m" => Duration::from_secs(amount.checked_mul(60)?),
            "h" => Duration::from_secs(amount.checked_mul(3600)?),
            _ => return None,
        };
        total = total.checked_add(segment)?;
        rest = &rest[unit_len..];
    }

    Some(total)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" => Some(true),
        "0" | "false" | "f" | "no" => Some(false),
        _ => None,
    }
}
