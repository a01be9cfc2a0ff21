// tests/integration_auth.rs

use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use vault_auth::{
    AuthError, AuthType, Authenticator, BackendClient, Config, VaultClient, build_authenticator,
};
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn environ(mock_uri: &str, vars: &[(&str, &str)]) -> HashMap<String, String> {
    let mut environ: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    environ.insert("VAULT_ADDR".to_string(), mock_uri.to_string());
    environ
}

fn authenticator(environ: &HashMap<String, String>) -> Box<dyn Authenticator<VaultClient>> {
    let config = Config::from_environ(environ).unwrap();
    build_authenticator(config).unwrap()
}

fn approle_environ(mock_uri: &str) -> HashMap<String, String> {
    environ(
        mock_uri,
        &[
            ("VAULT_APP_ROLE", "billing"),
            ("VAULT_APP_ROLE_ID", "role-id"),
            ("VAULT_APP_SECRET_ID", "secret-id"),
        ],
    )
}

/// Vault login response in the expected format.
fn vault_login_response(token: &str, ttl: u64) -> serde_json::Value {
    serde_json::json!({
        "request_id": "test-request-id",
        "lease_id": "",
        "renewable": false,
        "lease_duration": 0,
        "data": null,
        "wrap_info": null,
        "warnings": null,
        "auth": {
            "client_token": token,
            "accessor": "test-accessor",
            "policies": ["default"],
            "token_policies": ["default"],
            "lease_duration": ttl,
            "renewable": true
        }
    })
}

fn token_of(client: &VaultClient) -> String {
    client.token().unwrap().expose_secret().to_string()
}

#[tokio::test]
async fn test_static_token_never_logs_in() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    let auth = authenticator(&environ(&mock_server.uri(), &[("VAULT_TOKEN", "abc")]));
    assert_eq!(auth.auth_type(), AuthType::Token);

    for _ in 0..3 {
        let client = auth.handle().await.unwrap();
        assert_eq!(token_of(&client), "abc");
    }
}

#[tokio::test]
async fn test_approle_login_is_cached() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .and(header("X-Vault-Request", "true"))
        .and(body_json(serde_json::json!({
            "role_id": "role-id",
            "secret_id": "secret-id"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(vault_login_response("t1", 60)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let auth = authenticator(&approle_environ(&mock_server.uri()));

    let first = auth.handle().await.unwrap();
    assert_eq!(token_of(&first), "t1");

    // Second call - should use cache (mock expects only 1 call)
    let second = auth.handle().await.unwrap();
    assert_eq!(token_of(&second), "t1");
}

#[tokio::test]
async fn test_ttl_inside_window_logs_in_again() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vault_login_response("t1", 5)))
        .expect(2)
        .mount(&mock_server)
        .await;

    let auth = authenticator(&approle_environ(&mock_server.uri()));

    auth.handle().await.unwrap();
    auth.handle().await.unwrap();
}

#[tokio::test]
async fn test_failed_login_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "errors": ["invalid role or secret ID"]
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vault_login_response("t1", 60)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let auth = authenticator(&approle_environ(&mock_server.uri()));

    match auth.handle().await {
        Err(AuthError::ClientError { status, message }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "invalid role or secret ID");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("login should have failed"),
    }

    let client = auth.handle().await.unwrap();
    assert_eq!(token_of(&client), "t1");
}

#[tokio::test]
async fn test_handle_carries_token_to_backend() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vault_login_response("t1", 60)))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/secret/data/app"))
        .and(header("X-Vault-Token", "t1"))
        .and(header("X-Vault-Namespace", "team-a"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut environ = approle_environ(&mock_server.uri());
    environ.insert("VAULT_NAMESPACE".to_string(), "team-a".to_string());
    let auth = authenticator(&environ);

    let client = auth.handle().await.unwrap();
    let secret = client
        .write("secret/data/app", serde_json::json!({"data": {"k": "v"}}))
        .await
        .unwrap();
    assert!(secret.auth.is_none());
}

#[tokio::test]
async fn test_no_strategy_is_configuration_error() {
    let result = Config::from_environ(&environ("http://vault:8200", &[]));

    let err = result.unwrap_err();
    assert!(matches!(err, AuthError::NoAuthType));
    assert!(err.is_configuration());
}

#[tokio::test]
async fn test_k8s_default_path() {
    let mock_server = MockServer::start().await;

    let mut jwt = NamedTempFile::new().unwrap();
    writeln!(jwt, "service-account-jwt").unwrap();

    Mock::given(method("POST"))
        .and(path("/v1/auth/k8s-svcA/login"))
        .and(body_json(serde_json::json!({
            "jwt": "service-account-jwt",
            "role": "svcA"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(vault_login_response("k8s-token", 600)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let jwt_path = jwt.path().to_str().unwrap().to_string();
    let auth = authenticator(&environ(
        &mock_server.uri(),
        &[("K8S_ROLE", "svcA"), ("K8S_JWT_TOKEN_PATH", &jwt_path)],
    ));
    assert_eq!(auth.auth_type(), AuthType::K8s);

    let client = auth.handle().await.unwrap();
    assert_eq!(token_of(&client), "k8s-token");
}

#[tokio::test]
async fn test_iam_login() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/aws/login"))
        .and(body_partial_json(serde_json::json!({
            "role": "web",
            "iam_http_request_method": "POST",
            "iam_request_url": "aHR0cHM6Ly9zdHMuZXUtd2VzdC0xLmFtYXpvbmF3cy5jb20v"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(vault_login_response("iam-token", 600)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let auth = authenticator(&environ(
        &mock_server.uri(),
        &[
            ("VAULT_ROLE", "web"),
            ("STS_AWS_REGION", "eu-west-1"),
            ("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE"),
            ("AWS_SECRET_ACCESS_KEY", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY"),
        ],
    ));
    assert_eq!(auth.auth_type(), AuthType::Iam);

    let client = auth.handle().await.unwrap();
    assert_eq!(token_of(&client), "iam-token");
}

#[tokio::test]
async fn test_iam_login_with_container_credentials() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/credentials/task-role"))
        .and(header("Authorization", "agent-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "AccessKeyId": "ASIAEXAMPLE",
            "SecretAccessKey": "task-secret",
            "Token": "task-session",
            "Expiration": "2030-01-01T00:00:00Z"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/aws/login"))
        .and(body_partial_json(serde_json::json!({"role": "web"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(vault_login_response("iam-token", 600)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let full_uri = format!("{}/v2/credentials/task-role", mock_server.uri());
    let auth = authenticator(&environ(
        &mock_server.uri(),
        &[
            ("VAULT_ROLE", "web"),
            ("AWS_CONTAINER_CREDENTIALS_FULL_URI", &full_uri),
            ("AWS_CONTAINER_AUTHORIZATION_TOKEN", "agent-token"),
            ("AWS_EC2_METADATA_DISABLED", "true"),
        ],
    ));

    let client = auth.handle().await.unwrap();
    assert_eq!(token_of(&client), "iam-token");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_handles_share_one_login() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(vault_login_response("t1", 60))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let auth: Arc<dyn Authenticator<VaultClient>> =
        Arc::from(authenticator(&approle_environ(&mock_server.uri())));

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let auth = Arc::clone(&auth);
            tokio::spawn(async move { auth.handle().await })
        })
        .collect();

    for task in tasks {
        let client = task.await.unwrap().unwrap();
        assert_eq!(token_of(&client), "t1");
    }
}

#[tokio::test]
#[should_panic(expected = "Vault authentication failed")]
async fn test_handle_or_fail_panics_on_rejected_login() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "errors": ["invalid role ID"]
        })))
        .mount(&mock_server)
        .await;

    let auth = authenticator(&approle_environ(&mock_server.uri()));
    auth.handle_or_fail().await;
}
