//! Best-effort usage reporting.
//!
//! Each provider operation reports a feature id such as
//! `Resource/artifactory_build_webhook/CREATE` to Artifactory's usage
//! endpoint. Reports run on a detached task; their outcome never reaches the
//! operation that triggered them.

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::client::ArtifactoryClient;
use crate::error::ProviderError;

/// Path of the usage endpoint.
pub const USAGE_PATH: &str = "artifactory/api/system/usage";

/// Product id reported with every usage ping.
pub const PRODUCT_ID: &str = concat!("terraform-provider-artifactory/", env!("CARGO_PKG_VERSION"));

/// The operation being reported for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageOperation {
    /// Resource creation.
    Create,
    /// Resource refresh.
    Read,
    /// In-place update.
    Update,
    /// Resource deletion.
    Delete,
    /// Resource import.
    Import,
}

impl UsageOperation {
    /// Upper-case name used in feature ids.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Read => "READ",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Import => "IMPORT",
        }
    }
}

#[derive(Debug, Serialize)]
struct UsageRequest<'a> {
    #[serde(rename = "productId")]
    product_id: &'a str,
    features: [Feature<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Feature<'a> {
    #[serde(rename = "featureId")]
    feature_id: &'a str,
}

/// Feature id for a resource operation.
pub fn resource_feature(type_name: &str, operation: UsageOperation) -> String {
    format!("Resource/{}/{}", type_name, operation.as_str())
}

/// Send one usage ping and wait for it.
pub async fn send_usage(client: &ArtifactoryClient, feature_id: &str) -> Result<(), ProviderError> {
    let request = UsageRequest {
        product_id: PRODUCT_ID,
        features: [Feature { feature_id }],
    };
    client.post_json(USAGE_PATH, &request).await
}

/// Fire a usage ping on a detached task.
///
/// Returns `None` when called outside a tokio runtime, in which case nothing
/// is sent. Callers normally drop the handle.
pub fn spawn_usage(client: &ArtifactoryClient, feature_id: String) -> Option<JoinHandle<()>> {
    let handle = tokio::runtime::Handle::try_current().ok()?;
    let client = client.clone();
    Some(handle.spawn(async move {
        if let Err(err) = send_usage(&client, &feature_id).await {
            debug!(feature_id = %feature_id, error = %err, "usage report dropped");
        }
    }))
}

/// Fire a usage ping for a resource operation.
pub fn spawn_resource_usage(
    client: &ArtifactoryClient,
    type_name: &str,
    operation: UsageOperation,
) -> Option<JoinHandle<()>> {
    spawn_usage(client, resource_feature(type_name, operation))
}
