//! Webhook state model and its mapping to and from the event API.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::criteria::WebhookCriteria;
use super::WebhookDomain;
use crate::configuration::Configuration;
use crate::schema::{Diagnostic, Diagnostics};
use crate::values::{map_value, string_value, ObjectReader};

/// Handler type sent for plain webhooks.
pub const WEBHOOK_HANDLER_TYPE: &str = "webhook";

/// A webhook subscription as the event API sends and receives it.
///
/// Fields the API returns that are not listed here are dropped on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookApiModel {
    /// Subscription key.
    pub key: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Whether the subscription fires.
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    /// What triggers the subscription.
    pub event_filter: EventFilterApiModel,
    /// Where events are delivered.
    #[serde(default)]
    pub handlers: Vec<HandlerApiModel>,
}

fn enabled_default() -> bool {
    true
}

impl Configuration for WebhookApiModel {
    fn id(&self) -> &str {
        &self.key
    }
}

/// Event filter of a subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFilterApiModel {
    /// Event domain, e.g. `release_bundle`.
    pub domain: String,
    /// Event types within the domain.
    #[serde(default)]
    pub event_types: Vec<String>,
    /// Domain dependent criteria, decoded by [`WebhookCriteria::from_api`].
    #[serde(default)]
    pub criteria: Map<String, Value>,
}

/// One delivery target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerApiModel {
    /// Always `webhook` for this resource family.
    #[serde(default = "handler_type_default")]
    pub handler_type: String,
    /// Target URL.
    pub url: String,
    /// Shared secret. Never returned by the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Sign payloads with the secret instead of sending it.
    #[serde(default)]
    pub use_secret_for_signing: bool,
    /// Proxy key to route through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// Extra request headers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_http_headers: Vec<KeyValueApiModel>,
}

fn handler_type_default() -> String {
    WEBHOOK_HANDLER_TYPE.to_string()
}

/// A name/value header pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValueApiModel {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: String,
}

/// One `handler` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerModel {
    /// Target URL.
    pub url: String,
    /// Shared secret.
    pub secret: Option<String>,
    /// Sign payloads with the secret.
    pub use_secret_for_signing: bool,
    /// Proxy key.
    pub proxy: Option<String>,
    /// Extra request headers.
    pub custom_http_headers: Option<BTreeMap<String, String>>,
}

/// Typed state of one webhook resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResourceModel {
    /// Domain of the resource type; not part of state.
    pub domain: WebhookDomain,
    /// Subscription key, also the resource id.
    pub key: String,
    /// Free-text description.
    pub description: String,
    /// Whether the subscription fires.
    pub enabled: bool,
    /// Event types to subscribe to.
    pub event_types: BTreeSet<String>,
    /// The single criteria element.
    pub criteria: WebhookCriteria,
    /// Delivery targets.
    pub handlers: Vec<HandlerModel>,
}

impl HandlerModel {
    fn from_value(value: &Value, path: String, diags: &mut Diagnostics) -> Option<Self> {
        let reader = ObjectReader::new(value, path, diags)?;
        Some(Self {
            url: reader.required_string("url", diags)?,
            secret: reader.string("secret", diags),
            use_secret_for_signing: reader.bool_or("use_secret_for_signing", false, diags),
            proxy: reader.string("proxy", diags),
            custom_http_headers: reader.string_map("custom_http_headers", diags),
        })
    }

    fn to_state(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("url".into(), Value::String(self.url.clone()));
        obj.insert("secret".into(), string_value(&self.secret));
        obj.insert(
            "use_secret_for_signing".into(),
            Value::Bool(self.use_secret_for_signing),
        );
        obj.insert("proxy".into(), string_value(&self.proxy));
        obj.insert(
            "custom_http_headers".into(),
            map_value(&self.custom_http_headers),
        );
        Value::Object(obj)
    }

    fn to_api(&self) -> HandlerApiModel {
        HandlerApiModel {
            handler_type: WEBHOOK_HANDLER_TYPE.to_string(),
            url: self.url.clone(),
            secret: self.secret.clone(),
            use_secret_for_signing: self.use_secret_for_signing,
            proxy: self.proxy.clone(),
            custom_http_headers: self
                .custom_http_headers
                .iter()
                .flatten()
                .map(|(name, value)| KeyValueApiModel {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
        }
    }

    /// The prior handler `api` most likely came from.
    ///
    /// Handlers are matched by URL; among several with the same URL, the one
    /// that also agrees on signing and proxy wins. Handlers identical in all
    /// of these cannot be told apart and take the first prior secret.
    fn find_prior<'a>(api: &HandlerApiModel, prior: &'a [HandlerModel]) -> Option<&'a HandlerModel> {
        let proxy = api.proxy.as_deref().filter(|p| !p.is_empty());
        let mut same_url = prior.iter().filter(|h| h.url == api.url);
        let first = same_url.clone().next();
        same_url
            .find(|h| {
                h.use_secret_for_signing == api.use_secret_for_signing
                    && h.proxy.as_deref() == proxy
            })
            .or(first)
    }

    fn from_api(api: HandlerApiModel, prior: &[HandlerModel]) -> Self {
        let prior = Self::find_prior(&api, prior);
        let secret = api
            .secret
            .filter(|s| !s.is_empty())
            .or_else(|| prior.and_then(|h| h.secret.clone()));
        // the API drops empty header lists; keep `{}` if that is what was configured
        let custom_http_headers = if api.custom_http_headers.is_empty() {
            prior
                .and_then(|h| h.custom_http_headers.as_ref())
                .filter(|headers| headers.is_empty())
                .cloned()
        } else {
            Some(
                api.custom_http_headers
                    .into_iter()
                    .map(|kv| (kv.name, kv.value))
                    .collect(),
            )
        };
        Self {
            url: api.url,
            secret,
            use_secret_for_signing: api.use_secret_for_signing,
            proxy: api.proxy.filter(|p| !p.is_empty()),
            custom_http_headers,
        }
    }
}

impl WebhookResourceModel {
    /// Read a configuration, plan or state object.
    ///
    /// Every problem is recorded in `diags`; `None` means the object could
    /// not be read at all.
    pub fn from_value(domain: WebhookDomain, value: &Value, diags: &mut Diagnostics) -> Option<Self> {
        let reader = ObjectReader::new(value, "", diags)?;

        let key = reader.required_string("key", diags);
        let description = reader.string("description", diags).unwrap_or_default();
        let enabled = reader.bool_or("enabled", true, diags);
        let event_types = match reader.string_set("event_types", diags) {
            Some(set) => set,
            None => {
                diags.add_attribute_error(
                    "event_types",
                    "Missing required attribute 'event_types'",
                    "This attribute is required and must be provided",
                );
                BTreeSet::new()
            },
        };

        let criteria_blocks = reader.blocks("criteria", diags);
        let criteria = match criteria_blocks.as_slice() {
            [single] => {
                WebhookCriteria::from_state(domain.criteria_kind(), single, "criteria.0", diags)
            },
            other => {
                diags.add_attribute_error(
                    "criteria",
                    "Invalid Attribute Configuration",
                    format!("criteria must contain exactly one element, got {}", other.len()),
                );
                None
            },
        };

        let handlers = reader
            .blocks("handler", diags)
            .into_iter()
            .enumerate()
            .filter_map(|(i, v)| HandlerModel::from_value(v, format!("handler.{}", i), diags))
            .collect();

        Some(Self {
            domain,
            key: key?,
            description,
            enabled,
            event_types,
            criteria: criteria?,
            handlers,
        })
    }

    /// The state object for this model.
    pub fn to_state(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("id".into(), Value::String(self.key.clone()));
        obj.insert("key".into(), Value::String(self.key.clone()));
        obj.insert(
            "description".into(),
            Value::String(self.description.clone()),
        );
        obj.insert("enabled".into(), Value::Bool(self.enabled));
        obj.insert(
            "event_types".into(),
            Value::Array(self.event_types.iter().cloned().map(Value::String).collect()),
        );
        obj.insert(
            "criteria".into(),
            Value::Array(vec![self.criteria.to_state()]),
        );
        obj.insert(
            "handler".into(),
            Value::Array(self.handlers.iter().map(HandlerModel::to_state).collect()),
        );
        Value::Object(obj)
    }

    /// Build the API payload.
    ///
    /// The criteria rules are checked again here; a violation is recorded in
    /// `diags` and the returned payload must then not be sent.
    pub fn to_api_model(&self, diags: &mut Diagnostics) -> WebhookApiModel {
        self.criteria.validate_into("criteria.0", diags);

        let criteria = match self.criteria.to_api() {
            Ok(map) => map,
            Err(err) => {
                diags.push(
                    Diagnostic::error("Unable to encode criteria")
                        .with_detail(err.to_string())
                        .with_attribute("criteria"),
                );
                Map::new()
            },
        };

        WebhookApiModel {
            key: self.key.clone(),
            description: self.description.clone(),
            enabled: self.enabled,
            event_filter: EventFilterApiModel {
                domain: self.domain.as_str().to_string(),
                event_types: self.event_types.iter().cloned().collect(),
                criteria,
            },
            handlers: self.handlers.iter().map(HandlerModel::to_api).collect(),
        }
    }

    /// Rebuild the model from an API response.
    ///
    /// Secrets are not returned by the API; they are taken from
    /// `prior_handlers` with the same URL.
    pub fn from_api_model(
        domain: WebhookDomain,
        api: WebhookApiModel,
        prior_handlers: &[HandlerModel],
        diags: &mut Diagnostics,
    ) -> Option<Self> {
        if api.event_filter.domain != domain.as_str() {
            diags.push(
                Diagnostic::error("Unexpected webhook domain")
                    .with_detail(format!(
                        "webhook '{}' belongs to domain '{}', expected '{}'",
                        api.key,
                        api.event_filter.domain,
                        domain.as_str()
                    ))
                    .with_attribute("key"),
            );
            return None;
        }

        let criteria = match WebhookCriteria::from_api(domain.criteria_kind(), &api.event_filter.criteria) {
            Ok(criteria) => criteria,
            Err(err) => {
                diags.push(
                    Diagnostic::error("Unable to decode criteria")
                        .with_detail(err.to_string())
                        .with_attribute("criteria"),
                );
                return None;
            },
        };

        Some(Self {
            domain,
            key: api.key,
            description: api.description,
            enabled: api.enabled,
            event_types: api.event_filter.event_types.into_iter().collect(),
            criteria,
            handlers: api
                .handlers
                .into_iter()
                .map(|h| HandlerModel::from_api(h, prior_handlers))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::webhook::criteria::{ReleaseBundleCriteria, RepoCriteria};
    use serde_json::json;

    fn release_bundle_config() -> Value {
        json!({
            "key": "rb-hook",
            "description": "release bundle events",
            "enabled": true,
            "event_types": ["created", "signed"],
            "criteria": [{
                "any_release_bundle": false,
                "registered_release_bundle_names": ["bundle-a"],
                "include_patterns": ["product_*"],
                "exclude_patterns": null
            }],
            "handler": [{
                "url": "https://hooks.example.com/rb",
                "secret": "s3cret",
                "use_secret_for_signing": true,
                "proxy": null,
                "custom_http_headers": {"X-Team": "release"}
            }]
        })
    }

    #[test]
    fn test_from_value() {
        let mut diags = Diagnostics::new();
        let model = WebhookResourceModel::from_value(
            WebhookDomain::ReleaseBundle,
            &release_bundle_config(),
            &mut diags,
        )
        .unwrap();

        assert!(diags.is_empty(), "{}", diags);
        assert_eq!(model.key, "rb-hook");
        assert_eq!(model.event_types.len(), 2);
        assert_eq!(model.handlers[0].secret.as_deref(), Some("s3cret"));
        assert!(matches!(model.criteria, WebhookCriteria::ReleaseBundle(_)));
    }

    #[test]
    fn test_from_value_accumulates_problems() {
        let config = json!({
            "enabled": "yes",
            "criteria": [],
            "handler": [{"secret": "x"}]
        });
        let mut diags = Diagnostics::new();
        assert!(WebhookResourceModel::from_value(WebhookDomain::Build, &config, &mut diags).is_none());

        let paths: Vec<_> = diags.iter().filter_map(|d| d.attribute.as_deref()).collect();
        assert!(paths.contains(&"key"));
        assert!(paths.contains(&"enabled"));
        assert!(paths.contains(&"event_types"));
        assert!(paths.contains(&"criteria"));
        assert!(paths.contains(&"handler.0.url"));
    }

    #[test]
    fn test_to_api_model() {
        let mut diags = Diagnostics::new();
        let model = WebhookResourceModel::from_value(
            WebhookDomain::ReleaseBundle,
            &release_bundle_config(),
            &mut diags,
        )
        .unwrap();
        let api = model.to_api_model(&mut diags);
        assert!(diags.is_empty());

        assert_eq!(
            serde_json::to_value(&api).unwrap(),
            json!({
                "key": "rb-hook",
                "description": "release bundle events",
                "enabled": true,
                "event_filter": {
                    "domain": "release_bundle",
                    "event_types": ["created", "signed"],
                    "criteria": {
                        "anyReleaseBundle": false,
                        "registeredReleaseBundlesNames": ["bundle-a"],
                        "includePatterns": ["product_*"]
                    }
                },
                "handlers": [{
                    "handler_type": "webhook",
                    "url": "https://hooks.example.com/rb",
                    "secret": "s3cret",
                    "use_secret_for_signing": true,
                    "custom_http_headers": [{"name": "X-Team", "value": "release"}]
                }]
            })
        );
    }

    #[test]
    fn test_to_api_model_rejects_invalid_criteria() {
        let mut config = release_bundle_config();
        config["criteria"][0]["registered_release_bundle_names"] = json!([]);

        let mut diags = Diagnostics::new();
        let model =
            WebhookResourceModel::from_value(WebhookDomain::ReleaseBundle, &config, &mut diags)
                .unwrap();
        let _ = model.to_api_model(&mut diags);

        assert!(diags.has_errors());
        assert_eq!(
            diags.iter().next().unwrap().detail.as_deref(),
            Some("registered_release_bundle_names cannot be empty when any_release_bundle is false")
        );
    }

    #[test]
    fn test_round_trip_keeps_every_attribute() {
        let mut diags = Diagnostics::new();
        let model = WebhookResourceModel::from_value(
            WebhookDomain::ReleaseBundle,
            &release_bundle_config(),
            &mut diags,
        )
        .unwrap();

        // the API never echoes secrets back
        let mut api = model.to_api_model(&mut diags);
        api.handlers[0].secret = None;

        let back = WebhookResourceModel::from_api_model(
            WebhookDomain::ReleaseBundle,
            api,
            &model.handlers,
            &mut diags,
        )
        .unwrap();

        assert!(diags.is_empty());
        assert_eq!(back, model);
        assert_eq!(back.to_state(), model.to_state());
    }

    fn wire_round_trip(model: &WebhookResourceModel) -> WebhookResourceModel {
        let mut diags = Diagnostics::new();
        let api = model.to_api_model(&mut diags);
        let mut wire = serde_json::to_value(&api).unwrap();
        for handler in wire["handlers"].as_array_mut().unwrap() {
            handler.as_object_mut().unwrap().remove("secret");
        }
        let api: WebhookApiModel = serde_json::from_value(wire).unwrap();

        let back =
            WebhookResourceModel::from_api_model(model.domain, api, &model.handlers, &mut diags)
                .unwrap();
        assert!(diags.is_empty(), "{}", diags);
        back
    }

    #[test]
    fn test_round_trip_keeps_empty_headers() {
        let mut config = release_bundle_config();
        config["handler"][0]["custom_http_headers"] = json!({});

        let mut diags = Diagnostics::new();
        let model =
            WebhookResourceModel::from_value(WebhookDomain::ReleaseBundle, &config, &mut diags)
                .unwrap();
        assert_eq!(model.handlers[0].custom_http_headers, Some(BTreeMap::new()));

        let back = wire_round_trip(&model);
        assert_eq!(back.to_state(), model.to_state());
        assert_eq!(back.to_state()["handler"][0]["custom_http_headers"], json!({}));
    }

    #[test]
    fn test_round_trip_unset_headers_stay_null() {
        let mut config = release_bundle_config();
        config["handler"][0]["custom_http_headers"] = Value::Null;

        let mut diags = Diagnostics::new();
        let model =
            WebhookResourceModel::from_value(WebhookDomain::ReleaseBundle, &config, &mut diags)
                .unwrap();

        let back = wire_round_trip(&model);
        assert!(back.to_state()["handler"][0]["custom_http_headers"].is_null());
    }

    #[test]
    fn test_secrets_follow_handlers_sharing_a_url() {
        let mut config = release_bundle_config();
        config["handler"] = json!([
            {"url": "https://hooks.example.com/rb", "secret": "plain", "use_secret_for_signing": false},
            {"url": "https://hooks.example.com/rb", "secret": "signing", "use_secret_for_signing": true}
        ]);

        let mut diags = Diagnostics::new();
        let model =
            WebhookResourceModel::from_value(WebhookDomain::ReleaseBundle, &config, &mut diags)
                .unwrap();

        let mut reversed = model.clone();
        reversed.handlers.reverse();
        let mut api = reversed.to_api_model(&mut diags);
        for handler in &mut api.handlers {
            handler.secret = None;
        }
        let back = WebhookResourceModel::from_api_model(
            WebhookDomain::ReleaseBundle,
            api,
            &model.handlers,
            &mut diags,
        )
        .unwrap();

        for handler in &back.handlers {
            let expected = if handler.use_secret_for_signing { "signing" } else { "plain" };
            assert_eq!(handler.secret.as_deref(), Some(expected));
        }
    }

    #[test]
    fn test_from_api_model_plural_flag() {
        let api: WebhookApiModel = serde_json::from_value(json!({
            "key": "dist-hook",
            "description": "",
            "enabled": true,
            "event_filter": {
                "domain": "distribution",
                "event_types": ["distribute_started"],
                "criteria": {"anyReleaseBundles": true}
            },
            "handlers": [{"handler_type": "webhook", "url": "https://hooks.example.com"}],
            "created_by": "admin"
        }))
        .unwrap();

        let mut diags = Diagnostics::new();
        let model =
            WebhookResourceModel::from_api_model(WebhookDomain::Distribution, api, &[], &mut diags)
                .unwrap();

        assert_eq!(
            model.criteria,
            WebhookCriteria::ReleaseBundle(ReleaseBundleCriteria {
                any_release_bundle: true,
                ..Default::default()
            })
        );
        let state = model.to_state();
        assert_eq!(state["criteria"][0]["any_release_bundle"], true);
        assert!(state["criteria"][0]["registered_release_bundle_names"].is_null());
        assert!(state["handler"][0]["secret"].is_null());
    }

    #[test]
    fn test_from_api_model_wrong_domain() {
        let model = WebhookResourceModel {
            domain: WebhookDomain::Artifact,
            key: "repo-hook".into(),
            description: String::new(),
            enabled: true,
            event_types: BTreeSet::from(["deployed".to_string()]),
            criteria: WebhookCriteria::Repo(RepoCriteria {
                any_local: true,
                ..Default::default()
            }),
            handlers: vec![],
        };
        let mut diags = Diagnostics::new();
        let api = model.to_api_model(&mut diags);

        assert!(
            WebhookResourceModel::from_api_model(WebhookDomain::Docker, api, &[], &mut diags)
                .is_none()
        );
        assert_eq!(diags.iter().next().unwrap().summary, "Unexpected webhook domain");
    }
}
