//! Webhook subscription resources.
//!
//! One resource type exists per event domain (`artifactory_build_webhook`,
//! `artifactory_release_bundle_webhook`, ...). They share the mapping in
//! [`model`] and differ only in their event types and criteria shape.
//!
//! See <https://jfrog.com/help/r/jfrog-rest-apis/event-subscriptions>.

pub mod criteria;
pub mod model;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use self::criteria::{criteria_block, CriteriaKind};
use self::model::{HandlerModel, WebhookApiModel, WebhookResourceModel};
use super::Resource;
use crate::client::path_with_segment;
use crate::configuration::find_configuration_by_id;
use crate::error::ProviderError;
use crate::plan::normalize;
use crate::provider::ProviderData;
use crate::schema::{
    Attribute, AttributeFlags, AttributeType, AttributeValidator, Block, Diagnostics, NestedBlock,
    Schema,
};
use crate::usage::{spawn_resource_usage, UsageOperation};
use crate::values::ObjectReader;

/// Collection path of the event subscription API.
pub const SUBSCRIPTIONS_PATH: &str = "event/api/v1/subscriptions";

fn subscription_path(key: &str) -> Result<String, ProviderError> {
    path_with_segment(SUBSCRIPTIONS_PATH, key)
}

/// An event domain that webhooks can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WebhookDomain {
    /// Artifact events.
    Artifact,
    /// Artifact property events.
    ArtifactProperty,
    /// Docker tag events.
    Docker,
    /// Build info events.
    Build,
    /// Release bundle events.
    ReleaseBundle,
    /// Distribution events.
    Distribution,
    /// Release bundles received by an edge or target.
    ArtifactoryReleaseBundle,
    /// Distribution destination events.
    Destination,
}

impl WebhookDomain {
    /// Every domain, in registration order.
    pub const ALL: [WebhookDomain; 8] = [
        Self::Artifact,
        Self::ArtifactProperty,
        Self::Docker,
        Self::Build,
        Self::ReleaseBundle,
        Self::Distribution,
        Self::ArtifactoryReleaseBundle,
        Self::Destination,
    ];

    /// Domain name used by the event API.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Artifact => "artifact",
            Self::ArtifactProperty => "artifact_property",
            Self::Docker => "docker",
            Self::Build => "build",
            Self::ReleaseBundle => "release_bundle",
            Self::Distribution => "distribution",
            Self::ArtifactoryReleaseBundle => "artifactory_release_bundle",
            Self::Destination => "destination",
        }
    }

    /// Resource type name, e.g. `artifactory_docker_webhook`.
    pub fn type_name(self) -> String {
        format!("artifactory_{}_webhook", self.as_str())
    }

    /// Event types accepted by this domain.
    pub fn event_types(self) -> &'static [&'static str] {
        match self {
            Self::Artifact => &["deployed", "deleted", "moved", "copied", "cached"],
            Self::ArtifactProperty => &["added", "deleted"],
            Self::Docker => &["pushed", "deleted", "promoted"],
            Self::Build => &["uploaded", "deleted", "promoted"],
            Self::ReleaseBundle => &["created", "signed", "deleted"],
            Self::Distribution => &[
                "distribute_started",
                "distribute_completed",
                "distribute_aborted",
                "distribute_failed",
                "delete_started",
                "delete_completed",
                "delete_failed",
            ],
            Self::ArtifactoryReleaseBundle | Self::Destination => {
                &["received", "delete_started", "delete_completed", "delete_failed"]
            },
        }
    }

    /// The criteria shape used by this domain.
    pub fn criteria_kind(self) -> CriteriaKind {
        match self {
            Self::Artifact | Self::ArtifactProperty | Self::Docker => CriteriaKind::Repo,
            Self::Build => CriteriaKind::Build,
            Self::ReleaseBundle
            | Self::Distribution
            | Self::ArtifactoryReleaseBundle
            | Self::Destination => CriteriaKind::ReleaseBundle,
        }
    }
}

impl std::fmt::Display for WebhookDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn handler_block() -> Block {
    Block::new()
        .with_attribute(
            "url",
            Attribute::required_string()
                .with_validator(AttributeValidator::UrlWithHttpOrHttps)
                .with_description("Specifies the URL that the Webhook invokes. This will be the URL that Artifactory will send an HTTP POST request to."),
        )
        .with_attribute(
            "secret",
            Attribute::optional_string()
                .sensitive()
                .with_description("Secret authentication token that will be sent to the configured URL."),
        )
        .with_attribute(
            "use_secret_for_signing",
            Attribute::optional_bool()
                .with_default(json!(false))
                .with_description("When set to `true`, the secret will be used to sign the event payload, allowing the target to validate that the payload content has not been changed and will not be passed as part of the event."),
        )
        .with_attribute(
            "proxy",
            Attribute::optional_string()
                .with_validator(AttributeValidator::StringNotEmpty)
                .with_description("Proxy key from Artifactory Proxies setting"),
        )
        .with_attribute(
            "custom_http_headers",
            Attribute::new(AttributeType::map(AttributeType::String), AttributeFlags::optional())
                .with_description("Custom HTTP headers you wish to use to invoke the Webhook, comprise key/value pair."),
        )
}

/// Schema of the webhook resource for `domain`.
pub fn webhook_schema(domain: WebhookDomain) -> Schema {
    Schema::v0()
        .with_description(
            "Provides an Artifactory webhook resource. This can be used to register and manage \
             Artifactory webhook subscription which enables you to be notified or notify other \
             users when such events take place in Artifactory.",
        )
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "key",
            Attribute::required_string()
                .with_force_new()
                .with_validator(AttributeValidator::StringLengthBetween { min: 2, max: 200 })
                .with_validator(AttributeValidator::PathSegment)
                .with_description("The identity key of the webhook. Must be between 2 and 200 characters. Cannot contain spaces."),
        )
        .with_attribute(
            "description",
            Attribute::optional_string()
                .with_default(json!(""))
                .with_validator(AttributeValidator::StringLengthBetween { min: 0, max: 1000 })
                .with_description("Webhook description. Max length 1000 characters."),
        )
        .with_attribute(
            "enabled",
            Attribute::optional_bool()
                .with_default(json!(true))
                .with_description("Status of webhook. Default to `true`."),
        )
        .with_attribute(
            "event_types",
            Attribute::required_string_set()
                .with_validator(AttributeValidator::OneOf(
                    domain.event_types().iter().map(|s| s.to_string()).collect(),
                ))
                .with_description(format!(
                    "List of Events in Artifactory, Distribution, Release Bundle that function as the event trigger for the Webhook.\nAllow values: {}",
                    domain
                        .event_types()
                        .iter()
                        .map(|t| format!("\"{}\"", t))
                        .collect::<Vec<_>>()
                        .join(", ")
                )),
        )
        .with_block(
            "criteria",
            NestedBlock::set(criteria_block(domain.criteria_kind())).exactly_one(),
        )
        .with_block(
            "handler",
            NestedBlock::set(handler_block()).with_min_items(1),
        )
}

/// A webhook resource type bound to one event domain.
#[derive(Debug, Clone)]
pub struct WebhookResource {
    domain: WebhookDomain,
    type_name: String,
}

impl WebhookResource {
    /// Resource for `domain`.
    pub fn new(domain: WebhookDomain) -> Self {
        Self {
            domain,
            type_name: domain.type_name(),
        }
    }

    fn model(&self, value: &Value) -> Result<WebhookResourceModel, ProviderError> {
        let mut diags = Diagnostics::new();
        let model = WebhookResourceModel::from_value(self.domain, value, &mut diags);
        match model {
            Some(model) if !diags.has_errors() => Ok(model),
            _ => Err(ProviderError::Diagnostics(diags)),
        }
    }

    fn api_model(&self, model: &WebhookResourceModel) -> Result<WebhookApiModel, ProviderError> {
        let mut diags = Diagnostics::new();
        let api = model.to_api_model(&mut diags);
        diags.into_result(api).map_err(ProviderError::from)
    }

    fn state(&self, model: &WebhookResourceModel) -> Value {
        normalize(&webhook_schema(self.domain).block, &model.to_state())
    }

    fn from_api(
        &self,
        api: WebhookApiModel,
        prior_handlers: &[HandlerModel],
    ) -> Result<Value, ProviderError> {
        let mut diags = Diagnostics::new();
        match WebhookResourceModel::from_api_model(self.domain, api, prior_handlers, &mut diags) {
            Some(model) if !diags.has_errors() => Ok(self.state(&model)),
            _ => Err(ProviderError::Diagnostics(diags)),
        }
    }
}

fn state_key(value: &Value) -> Result<String, ProviderError> {
    let mut diags = Diagnostics::new();
    let key = ObjectReader::new(value, "", &mut diags).and_then(|r| r.required_string("key", &mut diags));
    match key {
        Some(key) if !diags.has_errors() => Ok(key),
        _ => Err(ProviderError::Diagnostics(diags)),
    }
}

#[async_trait]
impl Resource for WebhookResource {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn schema(&self) -> Schema {
        webhook_schema(self.domain)
    }

    fn validate_config(&self, config: &Value) -> Diagnostics {
        let mut diags = Diagnostics::new();
        if let Some(model) = WebhookResourceModel::from_value(self.domain, config, &mut diags) {
            model.criteria.validate_into("criteria.0", &mut diags);
        }
        diags
    }

    #[instrument(skip(self, data, planned), fields(resource_type = %self.type_name))]
    async fn create(&self, data: &ProviderData, planned: Value) -> Result<Value, ProviderError> {
        spawn_resource_usage(&data.client, &self.type_name, UsageOperation::Create);

        let model = self.model(&planned)?;
        let api = self.api_model(&model)?;
        data.client.post_json(SUBSCRIPTIONS_PATH, &api).await?;

        info!(key = %model.key, "webhook created");
        Ok(self.state(&model))
    }

    #[instrument(skip(self, data, current), fields(resource_type = %self.type_name))]
    async fn read(&self, data: &ProviderData, current: Value) -> Result<Option<Value>, ProviderError> {
        spawn_resource_usage(&data.client, &self.type_name, UsageOperation::Read);

        let key = state_key(&current)?;
        let prior_handlers = self
            .model(&current)
            .map(|m| m.handlers)
            .unwrap_or_default();

        let api: WebhookApiModel = match data.client.get_json(&subscription_path(&key)?).await {
            Ok(api) => api,
            Err(err) if err.is_not_found() => {
                warn!(key = %key, "webhook not found, removing from state");
                return Ok(None);
            },
            Err(err) => return Err(err),
        };

        self.from_api(api, &prior_handlers).map(Some)
    }

    #[instrument(skip(self, data, _prior, planned), fields(resource_type = %self.type_name))]
    async fn update(
        &self,
        data: &ProviderData,
        _prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        spawn_resource_usage(&data.client, &self.type_name, UsageOperation::Update);

        let model = self.model(&planned)?;
        let api = self.api_model(&model)?;
        data.client.put_json(&subscription_path(&model.key)?, &api).await?;

        info!(key = %model.key, "webhook updated");
        Ok(self.state(&model))
    }

    #[instrument(skip(self, data, current), fields(resource_type = %self.type_name))]
    async fn delete(&self, data: &ProviderData, current: Value) -> Result<(), ProviderError> {
        spawn_resource_usage(&data.client, &self.type_name, UsageOperation::Delete);

        let key = state_key(&current)?;
        match data.client.delete(&subscription_path(&key)?).await {
            Ok(()) => {
                info!(key = %key, "webhook deleted");
                Ok(())
            },
            Err(err) if err.is_not_found() => {
                info!(key = %key, "webhook already absent");
                Ok(())
            },
            Err(err) => Err(err),
        }
    }

    #[instrument(skip(self, data), fields(resource_type = %self.type_name))]
    async fn import(&self, data: &ProviderData, id: &str) -> Result<Value, ProviderError> {
        spawn_resource_usage(&data.client, &self.type_name, UsageOperation::Import);

        let webhooks: Vec<WebhookApiModel> = data.client.get_json(SUBSCRIPTIONS_PATH).await?;
        let in_domain: Vec<WebhookApiModel> = webhooks
            .into_iter()
            .filter(|w| w.event_filter.domain == self.domain.as_str())
            .collect();

        let webhook = find_configuration_by_id(&in_domain, id).cloned().ok_or_else(|| {
            ProviderError::NotFound(format!("{} webhook '{}'", self.domain, id))
        })?;

        info!(key = %id, "webhook imported");
        self.from_api(webhook, &[])
    }
}
