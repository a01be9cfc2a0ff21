use super::aws_credentials::{AwsCredentials, AwsCredentialsProvider};
use super::{LoginMethod, RefreshingAuthenticator};
use crate::config::AuthType;
use crate::error::AuthError;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_MOUNT: &str = "aws";
const GLOBAL_STS_HOST: &str = "sts.amazonaws.com";
const GLOBAL_STS_REGION: &str = "us-east-1";
const STS_SERVICE: &str = "sts";
const GET_CALLER_IDENTITY_BODY: &str = "Action=GetCallerIdentity&Version=2011-06-15";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";
const SERVER_ID_HEADER: &str = "X-Vault-AWS-IAM-Server-ID";

/// AWS IAM authenticator
pub type IamAuthenticator<C> = RefreshingAuthenticator<C, IamLogin>;

/// AWS IAM login: proves identity with a signed `sts:GetCallerIdentity`
/// request that Vault replays against STS.
pub struct IamLogin {
    pub role: String,
    pub mount: String,
    pub region: Option<String>,
    pub server_id: Option<String>,
    credentials: AwsCredentialsProvider,
}

impl IamLogin {
    pub fn new(role: String) -> Self {
        Self {
            role,
            mount: DEFAULT_MOUNT.to_string(),
            region: None,
            server_id: None,
            credentials: AwsCredentialsProvider::from_env(),
        }
    }

    pub fn with_mount(mut self, mount: String) -> Self {
        self.mount = mount;
        self
    }

    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }

    pub fn with_server_id(mut self, server_id: Option<String>) -> Self {
        self.server_id = server_id;
        self
    }

    /// Credentials are resolved through `provider` on each login. The
    /// default chain is built from the process environment.
    pub fn with_credentials(mut self, provider: AwsCredentialsProvider) -> Self {
        self.credentials = provider;
        self
    }

    fn sts_endpoint(&self) -> (String, &str) {
        match self.region.as_deref() {
            Some(region) => (format!("sts.{region}.amazonaws.com"), region),
            None => (GLOBAL_STS_HOST.to_string(), GLOBAL_STS_REGION),
        }
    }

    fn signed_payload(
        &self,
        credentials: &AwsCredentials,
        now: DateTime<Utc>,
    ) -> Result<serde_json::Value, AuthError> {
        let (host, region) = self.sts_endpoint();

        let mut headers: Vec<(&str, String)> = vec![
            ("Host", host.clone()),
            ("Content-Type", FORM_CONTENT_TYPE.to_string()),
        ];
        if let Some(ref server_id) = self.server_id {
            headers.push((SERVER_ID_HEADER, server_id.clone()));
        }

        let signer = Signer {
            credentials,
            region,
            service: STS_SERVICE,
            time: now,
        };
        let signed = signer.sign("POST", "/", &headers, GET_CALLER_IDENTITY_BODY.as_bytes());

        let header_map: BTreeMap<String, Vec<String>> = signed
            .into_iter()
            .map(|(name, value)| (name, vec![value]))
            .collect();
        let header_json = serde_json::to_string(&header_map)?;

        Ok(serde_json::json!({
            "role": self.role,
            "iam_http_request_method": "POST",
            "iam_request_url": BASE64.encode(format!("https://{host}/")),
            "iam_request_body": BASE64.encode(GET_CALLER_IDENTITY_BODY),
            "iam_request_headers": BASE64.encode(header_json),
        }))
    }
}

#[async_trait]
impl LoginMethod for IamLogin {
    fn auth_type(&self) -> AuthType {
        AuthType::Iam
    }

    fn login_path(&self) -> String {
        format!("auth/{}/login", self.mount.trim_matches('/'))
    }

    async fn login_payload(&self) -> Result<serde_json::Value, AuthError> {
        let credentials = self.credentials.provide().await?;

        self.signed_payload(&credentials, Utc::now())
    }
}

/// AWS Signature Version 4 signer
struct Signer<'a> {
    credentials: &'a AwsCredentials,
    region: &'a str,
    service: &'a str,
    time: DateTime<Utc>,
}

impl Signer<'_> {
    /// Returns `headers` plus the date, security token and authorization
    /// headers. The request must not carry a query string.
    fn sign(
        &self,
        method: &str,
        path: &str,
        headers: &[(&str, String)],
        body: &[u8],
    ) -> Vec<(String, String)> {
        let amz_date = self.time.format("%Y%m%dT%H%M%SZ").to_string();
        let date = self.time.format("%Y%m%d").to_string();

        let mut all: Vec<(String, String)> = headers
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        all.push(("X-Amz-Date".to_string(), amz_date.clone()));
        if let Some(ref token) = self.credentials.session_token {
            all.push((
                "X-Amz-Security-Token".to_string(),
                token.expose_secret().to_string(),
            ));
        }

        let canonical: BTreeMap<String, String> = all
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
            .collect();
        let signed_headers = canonical.keys().cloned().collect::<Vec<_>>().join(";");
        let canonical_headers: String = canonical
            .iter()
            .map(|(name, value)| format!("{name}:{value}\n"))
            .collect();

        let canonical_request = format!(
            "{method}\n{path}\n\n{canonical_headers}\n{signed_headers}\n{}",
            hex::encode(Sha256::digest(body))
        );

        let scope = format!("{date}/{}/{}/aws4_request", self.region, self.service);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let key = self.signing_key(&date);
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

        all.push((
            "Authorization".to_string(),
            format!(
                "AWS4-HMAC-SHA256 Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
                self.credentials.access_key_id
            ),
        ));
        all
    }

    fn signing_key(&self, date: &str) -> Vec<u8> {
        let secret = format!("AWS4{}", self.credentials.secret_access_key.expose_secret());
        let k_date = hmac_sha256(secret.as_bytes(), date.as_bytes());
        let k_region = hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = hmac_sha256(&k_region, self.service.as_bytes());
        hmac_sha256(&k_service, b"aws4_request")
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts any key length"),
    };
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
