//! Artifactory system configuration helpers.
//!
//! Several Artifactory objects (webhook subscriptions, proxies, backups) are
//! returned as collections that have to be searched by their identifier,
//! and the global system configuration is updated by patching it with YAML.
//!
//! See <https://www.jfrog.com/confluence/display/JFROG/Artifactory+YAML+Configuration>.

use serde::Serialize;

use crate::client::ArtifactoryClient;
use crate::error::ProviderError;

/// Path of the YAML system configuration endpoint.
pub const CONFIGURATION_PATH: &str = "artifactory/api/system/configuration";

/// An item of a configuration collection, identified by a string id.
pub trait Configuration {
    /// The identifier of this item.
    fn id(&self) -> &str;
}

/// Find the first item whose id equals `id`.
pub fn find_configuration_by_id<'a, C: Configuration>(
    configurations: &'a [C],
    id: &str,
) -> Option<&'a C> {
    configurations.iter().find(|c| c.id() == id)
}

/// Update the system configuration with `content` serialized as YAML.
pub async fn send_configuration_patch<C: Serialize + ?Sized>(
    client: &ArtifactoryClient,
    content: &C,
) -> Result<(), ProviderError> {
    let yaml = serde_yaml::to_string(content)?;
    client.patch_yaml(CONFIGURATION_PATH, yaml).await
}
