//! Provider configuration and data sources against a mock Artifactory.

use artifactory_provider::testing::{assert_error_contains, ProviderTester, TestError};
use artifactory_provider::{ArtifactoryProvider, ProviderError, ProviderService};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PYPI: &str = "artifactory_remote_pypi_repository";

async fn mount_usage(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/artifactory/api/system/usage"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

async fn mount_version(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/artifactory/api/system/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "7.77.3"})))
        .mount(server)
        .await;
}

fn provider() -> ArtifactoryProvider {
    ArtifactoryProvider::new().with_env_lookup(|_| None)
}

#[tokio::test]
async fn test_configure_checks_license_and_version() {
    let server = MockServer::start().await;
    mount_usage(&server).await;
    mount_version(&server).await;
    Mock::given(method("GET"))
        .and(path("/artifactory/api/system/licenses"))
        .and(header("authorization", "Bearer token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"type": "Edge"})))
        .expect(1)
        .mount(&server)
        .await;

    let tester = ProviderTester::new(provider());
    tester
        .configure(json!({"url": server.uri(), "access_token": "token"}))
        .await
        .unwrap();

    let data = tester.provider().provider_data().await.unwrap();
    assert_eq!(data.artifactory_version, "7.77.3");
}

#[tokio::test]
async fn test_configure_rejects_oss_license() {
    let server = MockServer::start().await;
    mount_version(&server).await;
    Mock::given(method("GET"))
        .and(path("/artifactory/api/system/licenses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"type": "OSS"})))
        .mount(&server)
        .await;

    let tester = ProviderTester::new(provider());
    match tester
        .configure(json!({"url": server.uri(), "access_token": "token"}))
        .await
    {
        Err(TestError::Diagnostics(diags)) => assert_error_contains(&diags, "OSS"),
        other => panic!("expected diagnostics, got {:?}", other),
    }
    assert!(tester.provider().provider_data().await.is_err());
}

#[tokio::test]
async fn test_configure_reports_version_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/artifactory/api/system/version"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let tester = ProviderTester::new(provider());
    match tester
        .configure(json!({
            "url": server.uri(),
            "access_token": "token",
            "check_license": false
        }))
        .await
    {
        Err(TestError::Diagnostics(diags)) => {
            assert_error_contains(&diags, "Error getting Artifactory version");
            assert_error_contains(&diags, "absence of Artifactory version");
        },
        other => panic!("expected diagnostics, got {:?}", other),
    }
}

#[tokio::test]
async fn test_configure_falls_back_to_environment() {
    let server = MockServer::start().await;
    mount_usage(&server).await;
    Mock::given(method("GET"))
        .and(path("/artifactory/api/system/version"))
        .and(header("authorization", "Bearer env-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "7.90.1"})))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let provider = ArtifactoryProvider::new().with_env_lookup(move |name| match name {
        "ARTIFACTORY_URL" => Some(uri.clone()),
        "JFROG_ACCESS_TOKEN" => Some("env-token".to_string()),
        _ => None,
    });
    let tester = ProviderTester::new(provider);
    tester
        .configure(json!({"check_license": false}))
        .await
        .unwrap();

    assert_eq!(
        tester.provider().provider_data().await.unwrap().artifactory_version,
        "7.90.1"
    );
}

#[tokio::test]
async fn test_api_key_warns_but_configures() {
    let server = MockServer::start().await;
    mount_usage(&server).await;
    Mock::given(method("GET"))
        .and(path("/artifactory/api/system/version"))
        .and(header("X-JFrog-Art-Api", "legacy-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "7.77.3"})))
        .expect(1)
        .mount(&server)
        .await;

    let tester = ProviderTester::new(provider());
    tester
        .configure(json!({
            "url": server.uri(),
            "api_key": "legacy-key",
            "check_license": false
        }))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_stop_forgets_configuration() {
    let server = MockServer::start().await;
    mount_usage(&server).await;
    mount_version(&server).await;

    let tester = ProviderTester::new(provider());
    tester
        .configure(json!({"url": server.uri(), "access_token": "t", "check_license": false}))
        .await
        .unwrap();
    tester.stop().await.unwrap();

    let err = tester
        .read("artifactory_build_webhook", json!({"key": "hook"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Configuration(_)));
}

#[tokio::test]
async fn test_read_remote_pypi_repository() {
    let server = MockServer::start().await;
    mount_usage(&server).await;
    mount_version(&server).await;
    Mock::given(method("GET"))
        .and(path("/artifactory/api/repositories/pypi-remote"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "key": "pypi-remote",
            "rclass": "remote",
            "packageType": "pypi",
            "url": "https://files.pythonhosted.org",
            "pyPIRegistryUrl": "https://pypi.org",
            "propertySets": ["artifactory", "pypi"],
            "hardFail": true
        })))
        .mount(&server)
        .await;

    let tester = ProviderTester::new(provider());
    tester
        .configure(json!({"url": server.uri(), "access_token": "t", "check_license": false}))
        .await
        .unwrap();

    let state = tester
        .read_data_source(PYPI, json!({"key": "pypi-remote"}))
        .await
        .unwrap();
    assert_eq!(state["id"], "pypi-remote");
    assert_eq!(state["pypi_registry_url"], "https://pypi.org");
    assert_eq!(state["repo_layout_ref"], "simple-default");
    assert_eq!(state["hard_fail"], true);
    assert_eq!(state["property_sets"], json!(["artifactory", "pypi"]));
}

#[tokio::test]
async fn test_read_rejects_non_pypi_repository() {
    let server = MockServer::start().await;
    mount_usage(&server).await;
    mount_version(&server).await;
    Mock::given(method("GET"))
        .and(path("/artifactory/api/repositories/libs-release"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "key": "libs-release",
            "rclass": "local",
            "packageType": "maven"
        })))
        .mount(&server)
        .await;

    let tester = ProviderTester::new(provider());
    tester
        .configure(json!({"url": server.uri(), "access_token": "t", "check_license": false}))
        .await
        .unwrap();

    let err = tester
        .read_data_source(PYPI, json!({"key": "libs-release"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::FailedPrecondition(_)));
    assert!(err.message().contains("local maven"));
}

#[tokio::test]
async fn test_metadata_lists_every_type() {
    let provider = provider();
    let metadata = provider.metadata();
    assert_eq!(metadata.resources.len(), 8);
    assert_eq!(metadata.data_sources, vec![PYPI.to_string()]);
    assert!(metadata.capabilities.plan_destroy);
}
