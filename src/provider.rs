//! The provider: lifecycle entry points and dispatch to resource types.
//!
//! [`ProviderService`] is the interface a host engine drives. It works with
//! plain `serde_json::Value` objects and [`Diagnostics`], independent of the
//! wire protocol the host uses. [`ArtifactoryProvider`] implements it by
//! looking resource and data source types up by name.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::client::{ArtifactoryClient, Auth};
use crate::config::{provider_schema, ProviderConfig, ALLOWED_LICENSES};
use crate::data_sources::{self, DataSource};
use crate::error::ProviderError;
use crate::plan;
use crate::resources::{self, Resource};
use crate::schema::{Diagnostic, Diagnostics, ProviderSchema};
use crate::types::{ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities};
use crate::usage::spawn_usage;
use crate::validation::validate;

/// Interface a host engine drives.
///
/// # Example
///
/// ```ignore
/// use artifactory_provider::{ArtifactoryProvider, ProviderService};
/// use serde_json::json;
///
/// let provider = ArtifactoryProvider::new();
/// let diags = provider
///     .configure(json!({"url": "https://example.jfrog.io", "access_token": "..."}))
///     .await?;
/// assert!(!diags.has_errors());
///
/// let state = provider
///     .create("artifactory_build_webhook", planned_state)
///     .await?;
/// ```
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Schema of the provider block, resources and data sources.
    fn schema(&self) -> ProviderSchema;

    /// Names of what the provider manages, derived from the schema.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        let mut resources: Vec<String> = schema.resources.keys().cloned().collect();
        let mut data_sources: Vec<String> = schema.data_sources.keys().cloned().collect();
        resources.sort();
        data_sources.sort();
        ProviderMetadata {
            resources,
            data_sources,
            capabilities: Default::default(),
        }
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate the provider block before configuring.
    async fn validate_provider_config(&self, config: Value) -> Result<Diagnostics, ProviderError> {
        let _ = config;
        Ok(Diagnostics::new())
    }

    /// Configure the provider. Error diagnostics leave it unconfigured.
    async fn configure(&self, config: Value) -> Result<Diagnostics, ProviderError>;

    /// Stop the provider.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource's configuration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Diagnostics, ProviderError> {
        let _ = (resource_type, config);
        Ok(Diagnostics::new())
    }

    /// Upgrade resource state written by an older schema version.
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: u64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let _ = (resource_type, version);
        Ok(state)
    }

    /// Plan changes for a resource. `proposed_state` of `null` plans a destroy.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a resource and return its state.
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError>;

    /// Refresh a resource. `None` means it is gone and should leave state.
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError>;

    /// Update a resource in place and return its state.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource. Deleting something already gone succeeds.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Bring an existing object under management.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Err(ProviderError::Unimplemented(format!(
            "Import not supported for resource type: {}",
            resource_type
        )))
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Validate a data source's configuration.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Diagnostics, ProviderError> {
        let _ = (data_source_type, config);
        Ok(Diagnostics::new())
    }

    /// Read a data source.
    async fn read_data_source(
        &self,
        data_source_type: &str,
        _config: Value,
    ) -> Result<Value, ProviderError> {
        Err(ProviderError::UnknownResource(format!(
            "Unknown data source type: {}",
            data_source_type
        )))
    }
}

/// What a configured provider hands to resources.
#[derive(Debug, Clone)]
pub struct ProviderData {
    /// Authenticated client.
    pub client: ArtifactoryClient,
    /// Version reported by the instance at configure time.
    pub artifactory_version: String,
}

impl ProviderData {
    /// Bundle a client with the instance version.
    pub fn new(client: ArtifactoryClient, artifactory_version: impl Into<String>) -> Self {
        Self {
            client,
            artifactory_version: artifactory_version.into(),
        }
    }
}

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// The Artifactory provider.
pub struct ArtifactoryProvider {
    resources: BTreeMap<String, Arc<dyn Resource>>,
    data_sources: BTreeMap<String, Arc<dyn DataSource>>,
    data: RwLock<Option<Arc<ProviderData>>>,
    terraform_version: String,
    env: EnvLookup,
}

impl fmt::Debug for ArtifactoryProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactoryProvider")
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .field("data_sources", &self.data_sources.keys().collect::<Vec<_>>())
            .field("terraform_version", &self.terraform_version)
            .finish_non_exhaustive()
    }
}

impl Default for ArtifactoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactoryProvider {
    /// Provider with every resource and data source registered.
    pub fn new() -> Self {
        let mut provider = Self {
            resources: BTreeMap::new(),
            data_sources: BTreeMap::new(),
            data: RwLock::new(None),
            terraform_version: "unknown".to_string(),
            env: Arc::new(|name| std::env::var(name).ok()),
        };
        for resource in resources::all() {
            provider = provider.with_resource(resource);
        }
        for data_source in data_sources::all() {
            provider = provider.with_data_source(data_source);
        }
        provider
    }

    /// Register a resource type, replacing one with the same name.
    pub fn with_resource(mut self, resource: Arc<dyn Resource>) -> Self {
        self.resources.insert(resource.type_name().to_string(), resource);
        self
    }

    /// Register a data source type, replacing one with the same name.
    pub fn with_data_source(mut self, data_source: Arc<dyn DataSource>) -> Self {
        self.data_sources
            .insert(data_source.type_name().to_string(), data_source);
        self
    }

    /// Version of the host engine, reported in the configure usage ping.
    pub fn with_terraform_version(mut self, version: impl Into<String>) -> Self {
        self.terraform_version = version.into();
        self
    }

    /// Replace the environment used for configuration fallbacks.
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(lookup);
        self
    }

    /// The configured provider data.
    pub async fn provider_data(&self) -> Result<Arc<ProviderData>, ProviderError> {
        self.data.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration("provider has not been configured".to_string())
        })
    }

    fn resource(&self, resource_type: &str) -> Result<&Arc<dyn Resource>, ProviderError> {
        self.resources.get(resource_type).ok_or_else(|| {
            ProviderError::UnknownResource(format!("Unknown resource type: {}", resource_type))
        })
    }

    fn data_source(&self, data_source_type: &str) -> Result<&Arc<dyn DataSource>, ProviderError> {
        self.data_sources.get(data_source_type).ok_or_else(|| {
            ProviderError::UnknownResource(format!(
                "Unknown data source type: {}",
                data_source_type
            ))
        })
    }

    async fn connect(&self, config: ProviderConfig, diags: &mut Diagnostics) -> Option<ProviderData> {
        let env = Arc::clone(&self.env);
        let resolved = match config.resolve_with(move |name| (*env)(name)) {
            Ok(resolved) => resolved,
            Err(errors) => {
                diags.append(errors);
                return None;
            },
        };
        debug!(config = ?resolved, "provider configuration resolved");

        let client = Auth::select(resolved.access_token.as_deref(), resolved.api_key.as_deref())
            .and_then(|auth| ArtifactoryClient::new(&resolved.url, auth));
        let client = match client {
            Ok(client) => client,
            Err(err) => {
                diags.push(Diagnostic::error(err.to_string()));
                return None;
            },
        };
        if resolved.access_token.is_none() {
            warn!("authenticating with a deprecated API key");
        }

        if resolved.check_license {
            if let Err(err) = client.check_license(&ALLOWED_LICENSES).await {
                diags.push(Diagnostic::error(err.to_string()));
                return None;
            }
        }

        let version = match client.artifactory_version().await {
            Ok(version) => version,
            Err(err) => {
                diags.push(Diagnostic::error("Error getting Artifactory version").with_detail(format!(
                    "The provider functionality might be affected by the absence of Artifactory version in the context. {}",
                    err
                )));
                return None;
            },
        };

        spawn_usage(&client, format!("Terraform/{}", self.terraform_version));
        Some(ProviderData::new(client, version))
    }
}

#[async_trait::async_trait]
impl ProviderService for ArtifactoryProvider {
    fn schema(&self) -> ProviderSchema {
        let mut schema = ProviderSchema::new().with_provider_config(provider_schema());
        for (name, resource) in &self.resources {
            schema = schema.with_resource(name.clone(), resource.schema());
        }
        for (name, data_source) in &self.data_sources {
            schema = schema.with_data_source(name.clone(), data_source.schema());
        }
        schema
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            resources: self.resources.keys().cloned().collect(),
            data_sources: self.data_sources.keys().cloned().collect(),
            capabilities: ServerCapabilities { plan_destroy: true },
        }
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Diagnostics, ProviderError> {
        Ok(validate(&provider_schema(), &config))
    }

    #[instrument(skip(self, config))]
    async fn configure(&self, config: Value) -> Result<Diagnostics, ProviderError> {
        let mut diags = validate(&provider_schema(), &config);
        if diags.has_errors() {
            return Ok(diags);
        }

        let config = match ProviderConfig::from_value(&config) {
            Ok(config) => config,
            Err(err) => {
                diags.push(Diagnostic::error("Invalid provider configuration").with_detail(err.to_string()));
                return Ok(diags);
            },
        };

        if let Some(data) = self.connect(config, &mut diags).await {
            info!(
                url = %data.client.base_url(),
                artifactory_version = %data.artifactory_version,
                "provider configured"
            );
            *self.data.write().await = Some(Arc::new(data));
        }
        Ok(diags)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        self.data.write().await.take();
        info!("provider stopped");
        Ok(())
    }

    #[instrument(skip(self, config))]
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Diagnostics, ProviderError> {
        let resource = self.resource(resource_type)?;
        let mut diags = validate(&resource.schema(), &config);
        if !diags.has_errors() {
            diags.append(resource.validate_config(&config));
        }
        Ok(diags)
    }

    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: u64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let current = self.resource(resource_type)?.schema().version;
        if version > current {
            return Err(ProviderError::FailedPrecondition(format!(
                "state of {} was written by schema version {}, newer than {}",
                resource_type, version, current
            )));
        }
        Ok(state)
    }

    #[instrument(skip(self, prior_state, proposed_state, _config))]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let schema = self.resource(resource_type)?.schema();
        let result = plan::plan(&schema, prior_state.as_ref(), &proposed_state);
        debug!(
            changes = result.changes.len(),
            requires_replace = result.requires_replace,
            "plan computed"
        );
        Ok(result)
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let data = self.provider_data().await?;
        resource.create(&data, planned_state).await
    }

    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let data = self.provider_data().await?;
        resource.read(&data, current_state).await
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let data = self.provider_data().await?;
        resource.update(&data, prior_state, planned_state).await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        let data = self.provider_data().await?;
        resource.delete(&data, current_state).await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let data = self.provider_data().await?;
        let state = resource.import(&data, id).await?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Diagnostics, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let mut diags = validate(&data_source.schema(), &config);
        if !diags.has_errors() {
            diags.append(data_source.validate_config(&config));
        }
        Ok(diags)
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let data = self.provider_data().await?;
        data_source.read(&data, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry() {
        let provider = ArtifactoryProvider::new();
        let metadata = provider.metadata();

        assert_eq!(metadata.resources.len(), 8);
        assert!(metadata
            .resources
            .contains(&"artifactory_release_bundle_webhook".to_string()));
        assert_eq!(metadata.data_sources, vec!["artifactory_remote_pypi_repository"]);
        assert!(metadata.capabilities.plan_destroy);

        let schema = provider.schema();
        assert!(schema.provider.block.attributes.contains_key("check_license"));
        assert_eq!(schema.resources.len(), 8);
    }

    #[tokio::test]
    async fn test_calls_before_configure_fail() {
        let provider = ArtifactoryProvider::new();
        let err = provider
            .delete("artifactory_build_webhook", json!({"key": "hook"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_unknown_types() {
        let provider = ArtifactoryProvider::new();
        assert!(matches!(
            provider.read("artifactory_nothing", json!({})).await,
            Err(ProviderError::UnknownResource(_))
        ));
        assert!(matches!(
            provider.read_data_source("artifactory_nothing", json!({})).await,
            Err(ProviderError::UnknownResource(_))
        ));
    }

    #[tokio::test]
    async fn test_configure_missing_url() {
        let provider = ArtifactoryProvider::new().with_env_lookup(|_| None);
        let diags = provider
            .configure(json!({"access_token": "token"}))
            .await
            .unwrap();

        assert!(diags.has_errors());
        assert_eq!(diags.iter().next().unwrap().summary, "missing URL Configuration");
        assert!(provider.provider_data().await.is_err());
    }

    #[tokio::test]
    async fn test_configure_without_credentials() {
        let provider = ArtifactoryProvider::new().with_env_lookup(|_| None);
        let diags = provider
            .configure(json!({"url": "https://example.jfrog.io"}))
            .await
            .unwrap();
        assert!(diags.has_errors());
        assert!(diags.to_string().contains("access_token or api_key"));
    }

    #[tokio::test]
    async fn test_validate_resource_config_release_bundle() {
        let provider = ArtifactoryProvider::new();
        let mut config = json!({
            "key": "rb-hook",
            "event_types": ["created"],
            "criteria": [{
                "any_release_bundle": false,
                "registered_release_bundle_names": []
            }],
            "handler": [{"url": "https://hooks.example.com"}]
        });

        let diags = provider
            .validate_resource_config("artifactory_release_bundle_webhook", config.clone())
            .await
            .unwrap();
        let diag = diags.iter().next().unwrap();
        assert_eq!(diag.summary, "Invalid Attribute Configuration");
        assert_eq!(
            diag.detail.as_deref(),
            Some("registered_release_bundle_names cannot be empty when any_release_bundle is false")
        );

        config["criteria"][0]["any_release_bundle"] = json!(true);
        let diags = provider
            .validate_resource_config("artifactory_release_bundle_webhook", config)
            .await
            .unwrap();
        assert!(diags.is_empty(), "{}", diags);
    }

    #[tokio::test]
    async fn test_plan_sets_defaults_and_id() {
        let provider = ArtifactoryProvider::new();
        let proposed = json!({
            "key": "docker-hook",
            "event_types": ["pushed"],
            "criteria": [{"any_local": true, "any_remote": false, "any_federated": false, "repo_keys": []}],
            "handler": [{"url": "https://hooks.example.com"}]
        });

        let result = provider
            .plan("artifactory_docker_webhook", None, proposed, Value::Null)
            .await
            .unwrap();
        assert_eq!(result.planned_state["id"], "docker-hook");
        assert_eq!(result.planned_state["enabled"], true);
        assert_eq!(result.planned_state["description"], "");
        assert_eq!(
            result.planned_state["handler"][0]["use_secret_for_signing"],
            false
        );
        assert!(!result.requires_replace);
    }

    #[tokio::test]
    async fn test_upgrade_rejects_future_version() {
        let provider = ArtifactoryProvider::new();
        let state = json!({"key": "k"});
        assert_eq!(
            provider
                .upgrade_resource_state("artifactory_build_webhook", 0, state.clone())
                .await
                .unwrap(),
            state
        );
        assert!(provider
            .upgrade_resource_state("artifactory_build_webhook", 3, state)
            .await
            .is_err());
    }
}
