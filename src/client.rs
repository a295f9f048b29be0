//! HTTP client for the Artifactory REST API.
//!
//! Thin wrapper over [`reqwest::Client`] that joins request paths onto the
//! configured base URL, injects authentication and maps non-success statuses
//! onto [`ProviderError`] variants. Retries are left to callers.

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProviderError;
use crate::validation::is_path_segment;

/// Path of the version endpoint.
pub const VERSION_PATH: &str = "artifactory/api/system/version";

/// Path of the license endpoint.
pub const LICENSES_PATH: &str = "artifactory/api/system/licenses";

/// Header carrying a (deprecated) API key.
pub const API_KEY_HEADER: &str = "X-JFrog-Art-Api";

const USER_AGENT: &str = concat!("artifactory-provider/", env!("CARGO_PKG_VERSION"));

/// Join `base` and one caller-supplied path segment, percent-encoding the
/// segment.
///
/// Segments that would change the shape of the URL (`/`, `?`, `#`, `%`,
/// whitespace, `.` or `..`) are rejected rather than escaped, so a key can
/// never address a different object.
pub fn path_with_segment(base: &str, segment: &str) -> Result<String, ProviderError> {
    if !is_path_segment(segment) {
        return Err(ProviderError::Validation(format!(
            "'{}' cannot be used as a URL path segment",
            segment
        )));
    }
    Ok(format!(
        "{}/{}",
        base.trim_end_matches('/'),
        urlencoding::encode(segment)
    ))
}

/// How requests authenticate.
#[derive(Clone)]
pub enum Auth {
    /// `Authorization: Bearer <token>`.
    AccessToken(String),
    /// `X-JFrog-Art-Api: <key>`.
    ApiKey(String),
}

impl Auth {
    /// Pick the access token over the API key when both are set.
    pub fn select(access_token: Option<&str>, api_key: Option<&str>) -> Result<Self, ProviderError> {
        match (access_token, api_key) {
            (Some(token), _) if !token.is_empty() => Ok(Self::AccessToken(token.to_string())),
            (_, Some(key)) if !key.is_empty() => Ok(Self::ApiKey(key.to_string())),
            _ => Err(ProviderError::Configuration(
                "either access_token or api_key must be set".to_string(),
            )),
        }
    }

    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Self::AccessToken(token) => request.bearer_auth(token),
            Self::ApiKey(key) => request.header(API_KEY_HEADER, key),
        }
    }
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AccessToken(_) => f.write_str("AccessToken(***)"),
            Self::ApiKey(_) => f.write_str("ApiKey(***)"),
        }
    }
}

/// Authenticated client bound to one Artifactory instance.
#[derive(Debug, Clone)]
pub struct ArtifactoryClient {
    http: Client,
    base_url: String,
    auth: Auth,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LicenseResponse {
    Single {
        #[serde(rename = "type")]
        license_type: String,
    },
    Cluster {
        licenses: Vec<ClusterLicense>,
    },
}

#[derive(Debug, Deserialize)]
struct ClusterLicense {
    #[serde(rename = "type")]
    license_type: String,
}

impl ArtifactoryClient {
    /// Build a client for `base_url`.
    pub fn new(base_url: &str, auth: Auth) -> Result<Self, ProviderError> {
        let parsed = url::Url::parse(base_url)
            .map_err(|e| ProviderError::Configuration(format!("invalid URL {}: {}", base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ProviderError::Configuration(format!(
                "URL must use http or https, got {}",
                parsed.scheme()
            )));
        }

        let http = Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// The base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!(%method, %url, "artifactory request");
        self.auth.apply(self.http.request(method, url))
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, ProviderError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            debug!(status = status.as_u16(), "artifactory request failed");
            return Err(ProviderError::from_status(status, &body));
        }
        Ok(body)
    }

    /// GET `path` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let body = self.send(self.request(Method::GET, path)).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// POST a JSON body to `path`, ignoring the response body.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), ProviderError> {
        self.send(self.request(Method::POST, path).json(body)).await?;
        Ok(())
    }

    /// PUT a JSON body to `path`, ignoring the response body.
    pub async fn put_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), ProviderError> {
        self.send(self.request(Method::PUT, path).json(body)).await?;
        Ok(())
    }

    /// DELETE `path`.
    pub async fn delete(&self, path: &str) -> Result<(), ProviderError> {
        self.send(self.request(Method::DELETE, path)).await?;
        Ok(())
    }

    /// PATCH a YAML document to `path`.
    pub async fn patch_yaml(&self, path: &str, body: String) -> Result<(), ProviderError> {
        let request = self
            .request(Method::PATCH, path)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/yaml"))
            .body(body);
        self.send(request).await?;
        Ok(())
    }

    /// The Artifactory version string, e.g. `7.77.3`.
    pub async fn artifactory_version(&self) -> Result<String, ProviderError> {
        let response: VersionResponse = self.get_json(VERSION_PATH).await?;
        Ok(response.version)
    }

    /// Fail unless the installed license type contains one of `allowed`.
    pub async fn check_license(&self, allowed: &[&str]) -> Result<(), ProviderError> {
        let response: LicenseResponse = self.get_json(LICENSES_PATH).await?;
        let license_type = match response {
            LicenseResponse::Single { license_type } => license_type,
            LicenseResponse::Cluster { licenses } => licenses
                .into_iter()
                .next()
                .map(|l| l.license_type)
                .unwrap_or_default(),
        };

        if allowed.iter().any(|a| license_type.contains(a)) {
            Ok(())
        } else {
            Err(ProviderError::FailedPrecondition(format!(
                "Artifactory requires a {} license to work with this provider, found '{}'",
                allowed.join(" or "),
                license_type
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ArtifactoryClient {
        ArtifactoryClient::new(&server.uri(), Auth::AccessToken("token".into())).unwrap()
    }

    #[test]
    fn test_auth_prefers_access_token() {
        assert!(matches!(
            Auth::select(Some("t"), Some("k")).unwrap(),
            Auth::AccessToken(t) if t == "t"
        ));
        assert!(matches!(
            Auth::select(Some(""), Some("k")).unwrap(),
            Auth::ApiKey(k) if k == "k"
        ));
        assert!(Auth::select(None, None).is_err());
    }

    #[test]
    fn test_auth_debug_hides_secret() {
        let auth = Auth::AccessToken("very-secret".into());
        assert!(!format!("{:?}", auth).contains("very-secret"));
    }

    #[test]
    fn test_url_join() {
        let client =
            ArtifactoryClient::new("https://example.jfrog.io/", Auth::ApiKey("k".into())).unwrap();
        assert_eq!(client.base_url(), "https://example.jfrog.io");
        assert_eq!(
            client.url("/artifactory/api/system/version"),
            "https://example.jfrog.io/artifactory/api/system/version"
        );
    }

    #[test]
    fn test_path_with_segment() {
        assert_eq!(
            path_with_segment("event/api/v1/subscriptions", "build-hook").unwrap(),
            "event/api/v1/subscriptions/build-hook"
        );
        assert_eq!(
            path_with_segment("event/api/v1/subscriptions", "hook&co").unwrap(),
            "event/api/v1/subscriptions/hook%26co"
        );
        for segment in ["hook#old", "../system", "hook?x=1", "..", ""] {
            let err = path_with_segment("event/api/v1/subscriptions", segment).unwrap_err();
            assert!(matches!(err, ProviderError::Validation(_)), "{}", segment);
        }
    }

    #[test]
    fn test_rejects_non_http_url() {
        assert!(ArtifactoryClient::new("ftp://example.com", Auth::ApiKey("k".into())).is_err());
        assert!(ArtifactoryClient::new("not a url", Auth::ApiKey("k".into())).is_err());
    }

    #[tokio::test]
    async fn test_bearer_auth_and_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/system/version"))
            .and(header("authorization", "Bearer token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "7.77.3"})))
            .mount(&server)
            .await;

        assert_eq!(client(&server).artifactory_version().await.unwrap(), "7.77.3");
    }

    #[tokio::test]
    async fn test_api_key_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/system/version"))
            .and(header(API_KEY_HEADER, "key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "7.1.0"})))
            .mount(&server)
            .await;

        let client = ArtifactoryClient::new(&server.uri(), Auth::ApiKey("key".into())).unwrap();
        assert_eq!(client.artifactory_version().await.unwrap(), "7.1.0");
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/forbidden"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = client(&server);
        let err = client.get_json::<Value>("missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.message(), "not here");

        let err = client.delete("forbidden").await.unwrap_err();
        assert!(matches!(err, ProviderError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_license_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/system/licenses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "type": "Enterprise Plus",
                "validThrough": "never"
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        assert!(client.check_license(&["Enterprise", "Commercial"]).await.is_ok());
        let err = client.check_license(&["Edge"]).await.unwrap_err();
        assert!(err.message().contains("Enterprise Plus"));
    }

    #[tokio::test]
    async fn test_license_check_cluster() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/system/licenses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "licenses": [{"type": "Commercial", "licenseHash": "abc"}]
            })))
            .mount(&server)
            .await;

        assert!(client(&server).check_license(&["Commercial"]).await.is_ok());
    }

    #[tokio::test]
    async fn test_patch_yaml() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/artifactory/api/system/configuration"))
            .and(header("content-type", "application/yaml"))
            .and(body_string("proxies: {}\n"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .patch_yaml("artifactory/api/system/configuration", "proxies: {}\n".into())
            .await
            .unwrap();
    }
}
