//! Integration tests for cloud user-data providers using wiremock

use base64::Engine;
use peerpod_provision::ProvisionError;
use peerpod_provision::providers::{
    UserDataProvider, aws::Aws, azure::Azure, detect_provider, docker::Docker,
};
use peerpod_provision::userdata::retrieve_cloud_config;
use std::time::Duration;
use tokio::time::Instant;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CLOUD_CONFIG: &str = "#cloud-config\nwrite_files:\n- path: /run/peerpod/cdh.toml\n  content: |\n    socket = 'unix:///run/confidential-containers/cdh.sock'\n";

fn deadline_in(ms: u64) -> Instant {
    Instant::now() + Duration::from_millis(ms)
}

fn encode(data: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

// ============================================================================
// Azure Tests
// ============================================================================

#[tokio::test]
async fn test_azure_userdata() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/metadata/instance/compute/userData"))
        .and(header("Metadata", "true"))
        .and(query_param("format", "text"))
        .respond_with(ResponseTemplate::new(200).set_body_string(encode("test data")))
        .mount(&mock_server)
        .await;

    let azure = Azure::with_base_url(&mock_server.uri()).unwrap();
    let userdata = azure.get_user_data().await.expect("Failed to get userdata");

    assert_eq!(userdata, b"test data");
}

#[tokio::test]
async fn test_azure_plain_text_userdata_is_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/metadata/instance/compute/userData"))
        .respond_with(ResponseTemplate::new(200).set_body_string("test data"))
        .mount(&mock_server)
        .await;

    let azure = Azure::with_base_url(&mock_server.uri()).unwrap();
    let result = azure.get_user_data().await;

    assert!(matches!(result, Err(ProvisionError::Fetch { .. })));
}

#[tokio::test]
async fn test_azure_missing_userdata() {
    let mock_server = MockServer::start().await;

    // Nothing mounted: every path is a 404
    let azure = Azure::with_base_url(&mock_server.uri()).unwrap();

    assert!(azure.get_user_data().await.is_err());
    assert!(!azure.is_this_provider().await);
}

#[tokio::test]
async fn test_azure_invalid_url() {
    let azure = Azure::with_base_url("invalidURL").unwrap();

    assert!(azure.get_user_data().await.is_err());
    assert!(!azure.is_this_provider().await);
}

#[tokio::test]
async fn test_azure_detection() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/metadata/instance/compute"))
        .and(header("Metadata", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&mock_server)
        .await;

    let azure = Azure::with_base_url(&mock_server.uri()).unwrap();
    assert!(azure.is_this_provider().await);
}

#[tokio::test]
async fn test_azure_retrieve_retries_until_available() {
    let mock_server = MockServer::start().await;

    // First request: not provisioned yet
    Mock::given(method("GET"))
        .and(path("/metadata/instance/compute/userData"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/metadata/instance/compute/userData"))
        .respond_with(ResponseTemplate::new(200).set_body_string(encode(CLOUD_CONFIG)))
        .mount(&mock_server)
        .await;

    let azure = Azure::with_base_url(&mock_server.uri())
        .unwrap()
        .with_retry_delay(Duration::from_millis(10));

    let cc = retrieve_cloud_config(&azure, deadline_in(5_000))
        .await
        .expect("Failed to retrieve cloud config");

    assert_eq!(cc.write_files.len(), 1);
    assert_eq!(cc.write_files[0].path, "/run/peerpod/cdh.toml");
    assert_eq!(
        cc.write_files[0].content,
        "socket = 'unix:///run/confidential-containers/cdh.sock'\n"
    );
}

// ============================================================================
// AWS Tests
// ============================================================================

#[tokio::test]
async fn test_aws_userdata_with_imdsv2_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/latest/api/token"))
        .and(header("X-aws-ec2-metadata-token-ttl-seconds", "300"))
        .respond_with(ResponseTemplate::new(200).set_body_string("test-token"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/latest/user-data"))
        .and(header("X-aws-ec2-metadata-token", "test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CLOUD_CONFIG))
        .mount(&mock_server)
        .await;

    let aws = Aws::with_base_url(&mock_server.uri()).unwrap();
    let userdata = aws.get_user_data().await.expect("Failed to get userdata");

    assert_eq!(userdata, CLOUD_CONFIG.as_bytes());
}

#[tokio::test]
async fn test_aws_imdsv1_fallback() {
    let mock_server = MockServer::start().await;

    // No token endpoint: the PUT is answered with a 404
    Mock::given(method("GET"))
        .and(path("/latest/meta-data/instance-id"))
        .respond_with(ResponseTemplate::new(200).set_body_string("i-1234567890abcdef0"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/latest/user-data"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CLOUD_CONFIG))
        .mount(&mock_server)
        .await;

    let aws = Aws::with_base_url(&mock_server.uri()).unwrap();

    assert!(aws.is_this_provider().await);
    assert_eq!(aws.get_user_data().await.unwrap(), CLOUD_CONFIG.as_bytes());
}

#[tokio::test]
async fn test_aws_no_userdata() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/latest/user-data"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let aws = Aws::with_base_url(&mock_server.uri()).unwrap();

    assert!(matches!(
        aws.get_user_data().await,
        Err(ProvisionError::Fetch { .. })
    ));
}

#[tokio::test]
async fn test_aws_retrieve_times_out_on_invalid_userdata() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/latest/user-data"))
        .respond_with(ResponseTemplate::new(200).set_body_string("#!/bin/bash\necho hi\n"))
        .mount(&mock_server)
        .await;

    let aws = Aws::with_base_url(&mock_server.uri())
        .unwrap()
        .with_retry_delay(Duration::from_millis(20));

    let err = retrieve_cloud_config(&aws, deadline_in(300))
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::FetchTimeout { .. }));
}

// ============================================================================
// Docker Tests
// ============================================================================

#[tokio::test]
async fn test_docker_userdata() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/userdata"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CLOUD_CONFIG))
        .mount(&mock_server)
        .await;

    let docker = Docker::new()
        .unwrap()
        .with_url(&format!("{}/userdata", mock_server.uri()));

    assert_eq!(docker.get_user_data().await.unwrap(), CLOUD_CONFIG.as_bytes());
}

// ============================================================================
// Detection Tests
// ============================================================================

#[tokio::test]
async fn test_detection_skips_absent_providers() {
    let mock_server = MockServer::start().await;
    let temp = tempfile::TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/latest/meta-data/instance-id"))
        .respond_with(ResponseTemplate::new(200).set_body_string("i-0"))
        .mount(&mock_server)
        .await;

    let candidates: Vec<Box<dyn UserDataProvider>> = vec![
        Box::new(Docker::new().unwrap().with_marker(temp.path().join(".dockerenv"))),
        Box::new(Azure::with_base_url(&mock_server.uri()).unwrap()),
        Box::new(Aws::with_base_url(&mock_server.uri()).unwrap()),
    ];

    let provider = detect_provider(candidates, deadline_in(5_000))
        .await
        .expect("AWS should be detected");

    assert_eq!(provider.name(), "AWS");
}
