//! Webhook criteria: which repositories, builds or release bundles a
//! subscription applies to.
//!
//! The wire format keeps criteria as an untyped JSON object whose shape
//! depends on the event domain. It is decoded into one [`WebhookCriteria`]
//! variant at the boundary and handled as a typed value everywhere else.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::schema::{Attribute, Block, Diagnostic, Diagnostics};
use crate::values::{set_value, ObjectReader};

/// Which criteria shape a domain uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriteriaKind {
    /// Repository based (`artifact`, `artifact_property`, `docker`).
    Repo,
    /// Build based (`build`).
    Build,
    /// Release bundle based (`release_bundle`, `distribution`, ...).
    ReleaseBundle,
}

/// A violated cross-field rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CriteriaError {
    /// The attribute the rule is anchored to.
    pub attribute: &'static str,
    /// Human readable explanation.
    pub message: &'static str,
}

/// Pattern filters shared by every criteria shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseCriteria {
    /// Ant-style patterns that must match.
    pub include_patterns: Option<BTreeSet<String>>,
    /// Ant-style patterns that must not match.
    pub exclude_patterns: Option<BTreeSet<String>>,
}

/// Criteria for repository domains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoCriteria {
    /// Shared pattern filters.
    pub base: BaseCriteria,
    /// Trigger on any local repository.
    pub any_local: bool,
    /// Trigger on any remote repository.
    pub any_remote: bool,
    /// Trigger on any federated repository.
    pub any_federated: bool,
    /// Trigger on these repositories.
    pub repo_keys: Option<BTreeSet<String>>,
}

/// Criteria for the build domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildCriteria {
    /// Shared pattern filters.
    pub base: BaseCriteria,
    /// Trigger on any build.
    pub any_build: bool,
    /// Trigger on these build names.
    pub selected_builds: Option<BTreeSet<String>>,
}

/// Criteria for release bundle domains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseBundleCriteria {
    /// Shared pattern filters.
    pub base: BaseCriteria,
    /// Trigger on any release bundle or distribution.
    pub any_release_bundle: bool,
    /// Trigger on these release bundle names.
    pub registered_release_bundle_names: Option<BTreeSet<String>>,
}

/// Criteria of one webhook, by domain family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookCriteria {
    /// Repository criteria.
    Repo(RepoCriteria),
    /// Build criteria.
    Build(BuildCriteria),
    /// Release bundle criteria.
    ReleaseBundle(ReleaseBundleCriteria),
}

// Wire shapes. Every field is optional because older Artifactory versions omit some.

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BaseCriteriaApiModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    include_patterns: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exclude_patterns: Option<BTreeSet<String>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepoCriteriaApiModel {
    #[serde(flatten)]
    base: BaseCriteriaApiModel,
    #[serde(default)]
    any_local: Option<bool>,
    #[serde(default)]
    any_remote: Option<bool>,
    #[serde(default)]
    any_federated: Option<bool>,
    #[serde(default)]
    repo_keys: Option<BTreeSet<String>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildCriteriaApiModel {
    #[serde(flatten)]
    base: BaseCriteriaApiModel,
    #[serde(default)]
    any_build: Option<bool>,
    #[serde(default)]
    selected_builds: Option<BTreeSet<String>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseBundleCriteriaApiModel {
    #[serde(flatten)]
    base: BaseCriteriaApiModel,
    #[serde(default)]
    any_release_bundle: Option<bool>,
    // some Artifactory versions answer with the plural spelling
    #[serde(default, rename = "anyReleaseBundles", skip_serializing)]
    any_release_bundles: Option<bool>,
    #[serde(default)]
    registered_release_bundles_names: Option<BTreeSet<String>>,
}

const INCLUDE_PATTERNS: &str = "include_patterns";
const EXCLUDE_PATTERNS: &str = "exclude_patterns";

impl BaseCriteria {
    fn from_state(reader: &ObjectReader<'_>, diags: &mut Diagnostics) -> Self {
        Self {
            include_patterns: reader.string_set(INCLUDE_PATTERNS, diags),
            exclude_patterns: reader.string_set(EXCLUDE_PATTERNS, diags),
        }
    }

    fn write_state(&self, obj: &mut Map<String, Value>) {
        obj.insert(INCLUDE_PATTERNS.into(), set_value(&self.include_patterns));
        obj.insert(EXCLUDE_PATTERNS.into(), set_value(&self.exclude_patterns));
    }

    fn to_api(&self) -> BaseCriteriaApiModel {
        BaseCriteriaApiModel {
            include_patterns: self.include_patterns.clone(),
            exclude_patterns: self.exclude_patterns.clone(),
        }
    }

    fn from_api(api: BaseCriteriaApiModel) -> Self {
        Self {
            include_patterns: api.include_patterns,
            exclude_patterns: api.exclude_patterns,
        }
    }

    fn schema_attributes() -> [(&'static str, Attribute); 2] {
        [
            (
                INCLUDE_PATTERNS,
                Attribute::optional_string_set().with_description(
                    "Simple comma separated wildcard patterns for names.\n\
                     Ant-style path expressions are supported (*, **, ?).\n\
                     For example: `org/apache/**`",
                ),
            ),
            (
                EXCLUDE_PATTERNS,
                Attribute::optional_string_set().with_description(
                    "Simple comma separated wildcard patterns for names.\n\
                     Ant-style path expressions are supported (*, **, ?).\n\
                     For example: `org/apache/**`",
                ),
            ),
        ]
    }
}

fn is_empty(set: &Option<BTreeSet<String>>) -> bool {
    set.as_ref().map_or(true, BTreeSet::is_empty)
}

impl WebhookCriteria {
    /// Check the cross-field rules of this criteria.
    pub fn validate(&self) -> Result<(), CriteriaError> {
        match self {
            Self::Repo(c) => {
                if !c.any_local && !c.any_remote && !c.any_federated && is_empty(&c.repo_keys) {
                    return Err(CriteriaError {
                        attribute: "any_local",
                        message: "repo_keys cannot be empty when any_local, any_remote, and any_federated are false",
                    });
                }
            },
            Self::Build(c) => {
                if !c.any_build && is_empty(&c.selected_builds) && is_empty(&c.base.include_patterns)
                {
                    return Err(CriteriaError {
                        attribute: "any_build",
                        message: "selected_builds or include_patterns cannot be empty when any_build is false",
                    });
                }
            },
            Self::ReleaseBundle(c) => {
                if !c.any_release_bundle && is_empty(&c.registered_release_bundle_names) {
                    return Err(CriteriaError {
                        attribute: "any_release_bundle",
                        message: "registered_release_bundle_names cannot be empty when any_release_bundle is false",
                    });
                }
            },
        }
        Ok(())
    }

    /// Validate and record a violation as an attribute error under `path`.
    pub fn validate_into(&self, path: &str, diags: &mut Diagnostics) {
        if let Err(err) = self.validate() {
            diags.push(
                Diagnostic::error("Invalid Attribute Configuration")
                    .with_detail(err.message)
                    .with_attribute(format!("{}.{}", path, err.attribute)),
            );
        }
    }

    /// The shape this criteria has.
    pub fn kind(&self) -> CriteriaKind {
        match self {
            Self::Repo(_) => CriteriaKind::Repo,
            Self::Build(_) => CriteriaKind::Build,
            Self::ReleaseBundle(_) => CriteriaKind::ReleaseBundle,
        }
    }

    /// The shared pattern filters.
    pub fn base(&self) -> &BaseCriteria {
        match self {
            Self::Repo(c) => &c.base,
            Self::Build(c) => &c.base,
            Self::ReleaseBundle(c) => &c.base,
        }
    }

    /// Read one criteria block element of the given kind.
    pub fn from_state(
        kind: CriteriaKind,
        value: &Value,
        path: &str,
        diags: &mut Diagnostics,
    ) -> Option<Self> {
        let reader = ObjectReader::new(value, path, diags)?;
        let base = BaseCriteria::from_state(&reader, diags);
        Some(match kind {
            CriteriaKind::Repo => Self::Repo(RepoCriteria {
                base,
                any_local: reader.bool_or("any_local", false, diags),
                any_remote: reader.bool_or("any_remote", false, diags),
                any_federated: reader.bool_or("any_federated", false, diags),
                repo_keys: reader.string_set("repo_keys", diags),
            }),
            CriteriaKind::Build => Self::Build(BuildCriteria {
                base,
                any_build: reader.bool_or("any_build", false, diags),
                selected_builds: reader.string_set("selected_builds", diags),
            }),
            CriteriaKind::ReleaseBundle => Self::ReleaseBundle(ReleaseBundleCriteria {
                base,
                any_release_bundle: reader.bool_or("any_release_bundle", false, diags),
                registered_release_bundle_names: reader
                    .string_set("registered_release_bundle_names", diags),
            }),
        })
    }

    /// This criteria as one state block element.
    pub fn to_state(&self) -> Value {
        let mut obj = Map::new();
        self.base().write_state(&mut obj);
        match self {
            Self::Repo(c) => {
                obj.insert("any_local".into(), Value::Bool(c.any_local));
                obj.insert("any_remote".into(), Value::Bool(c.any_remote));
                obj.insert("any_federated".into(), Value::Bool(c.any_federated));
                obj.insert("repo_keys".into(), set_value(&c.repo_keys));
            },
            Self::Build(c) => {
                obj.insert("any_build".into(), Value::Bool(c.any_build));
                obj.insert("selected_builds".into(), set_value(&c.selected_builds));
            },
            Self::ReleaseBundle(c) => {
                obj.insert("any_release_bundle".into(), Value::Bool(c.any_release_bundle));
                obj.insert(
                    "registered_release_bundle_names".into(),
                    set_value(&c.registered_release_bundle_names),
                );
            },
        }
        Value::Object(obj)
    }

    /// The wire form: base criteria merged with the domain fields.
    ///
    /// Required name lists are always sent, as `[]` when unset.
    pub fn to_api(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let base = self.base().to_api();
        let value = match self {
            Self::Repo(c) => serde_json::to_value(RepoCriteriaApiModel {
                base,
                any_local: Some(c.any_local),
                any_remote: Some(c.any_remote),
                any_federated: Some(c.any_federated),
                repo_keys: Some(c.repo_keys.clone().unwrap_or_default()),
            })?,
            Self::Build(c) => serde_json::to_value(BuildCriteriaApiModel {
                base,
                any_build: Some(c.any_build),
                selected_builds: Some(c.selected_builds.clone().unwrap_or_default()),
            })?,
            Self::ReleaseBundle(c) => serde_json::to_value(ReleaseBundleCriteriaApiModel {
                base,
                any_release_bundle: Some(c.any_release_bundle),
                any_release_bundles: None,
                registered_release_bundles_names: Some(
                    c.registered_release_bundle_names.clone().unwrap_or_default(),
                ),
            })?,
        };
        match value {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }

    /// Decode the untyped wire criteria as the given kind.
    ///
    /// Absent lists stay `None`; absent flags read as `false`; unknown keys
    /// are ignored.
    pub fn from_api(kind: CriteriaKind, criteria: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        let value = Value::Object(criteria.clone());
        Ok(match kind {
            CriteriaKind::Repo => {
                let api: RepoCriteriaApiModel = serde_json::from_value(value)?;
                Self::Repo(RepoCriteria {
                    base: BaseCriteria::from_api(api.base),
                    any_local: api.any_local.unwrap_or(false),
                    any_remote: api.any_remote.unwrap_or(false),
                    any_federated: api.any_federated.unwrap_or(false),
                    repo_keys: api.repo_keys,
                })
            },
            CriteriaKind::Build => {
                let api: BuildCriteriaApiModel = serde_json::from_value(value)?;
                Self::Build(BuildCriteria {
                    base: BaseCriteria::from_api(api.base),
                    any_build: api.any_build.unwrap_or(false),
                    selected_builds: api.selected_builds,
                })
            },
            CriteriaKind::ReleaseBundle => {
                let api: ReleaseBundleCriteriaApiModel = serde_json::from_value(value)?;
                Self::ReleaseBundle(ReleaseBundleCriteria {
                    base: BaseCriteria::from_api(api.base),
                    any_release_bundle: api
                        .any_release_bundle
                        .or(api.any_release_bundles)
                        .unwrap_or(false),
                    registered_release_bundle_names: api.registered_release_bundles_names,
                })
            },
        })
    }
}

/// Schema of one criteria block element for `kind`.
pub fn criteria_block(kind: CriteriaKind) -> Block {
    let block = Block::new().with_attributes(BaseCriteria::schema_attributes());
    match kind {
        CriteriaKind::Repo => block
            .with_attribute(
                "any_local",
                Attribute::required_bool().with_description("Trigger on any local repositories"),
            )
            .with_attribute(
                "any_remote",
                Attribute::required_bool().with_description("Trigger on any remote repositories"),
            )
            .with_attribute(
                "any_federated",
                Attribute::required_bool()
                    .with_description("Trigger on any federated repositories"),
            )
            .with_attribute(
                "repo_keys",
                Attribute::required_string_set()
                    .with_description("Trigger on this list of repository keys"),
            )
            .with_description("Specifies where the webhook will be applied on which repositories."),
        CriteriaKind::Build => block
            .with_attribute(
                "any_build",
                Attribute::required_bool().with_description("Trigger on any builds"),
            )
            .with_attribute(
                "selected_builds",
                Attribute::required_string_set()
                    .with_description("Trigger on this list of build names"),
            )
            .with_description("Specifies where the webhook will be applied, on which builds."),
        CriteriaKind::ReleaseBundle => block
            .with_attribute(
                "any_release_bundle",
                Attribute::required_bool()
                    .with_description("Trigger on any release bundles or distributions"),
            )
            .with_attribute(
                "registered_release_bundle_names",
                Attribute::required_string_set()
                    .with_description("Trigger on this list of release bundle names"),
            )
            .with_description(
                "Specifies where the webhook will be applied, on which release bundles or distributions.",
            ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(items: &[&str]) -> Option<BTreeSet<String>> {
        Some(items.iter().map(|s| s.to_string()).collect())
    }

    fn release_bundle(any: bool, list: Option<BTreeSet<String>>) -> WebhookCriteria {
        WebhookCriteria::ReleaseBundle(ReleaseBundleCriteria {
            any_release_bundle: any,
            registered_release_bundle_names: list,
            ..Default::default()
        })
    }

    #[test]
    fn test_release_bundle_empty_names_rejected_without_any() {
        let err = release_bundle(false, names(&[])).validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "registered_release_bundle_names cannot be empty when any_release_bundle is false"
        );
        assert_eq!(err.attribute, "any_release_bundle");
    }

    #[test]
    fn test_release_bundle_empty_names_allowed_with_any() {
        assert!(release_bundle(true, names(&[])).validate().is_ok());
        assert!(release_bundle(true, None).validate().is_ok());
        assert!(release_bundle(false, names(&["bundle-a"])).validate().is_ok());
    }

    #[test]
    fn test_repo_rule() {
        let none = WebhookCriteria::Repo(RepoCriteria::default());
        let err = none.validate().unwrap_err();
        assert!(err.message.starts_with("repo_keys cannot be empty"));

        let remote = WebhookCriteria::Repo(RepoCriteria {
            any_remote: true,
            ..Default::default()
        });
        assert!(remote.validate().is_ok());

        let keyed = WebhookCriteria::Repo(RepoCriteria {
            repo_keys: names(&["libs-release-local"]),
            ..Default::default()
        });
        assert!(keyed.validate().is_ok());
    }

    #[test]
    fn test_build_rule_accepts_include_patterns() {
        let empty = WebhookCriteria::Build(BuildCriteria::default());
        assert!(empty.validate().is_err());

        let patterned = WebhookCriteria::Build(BuildCriteria {
            base: BaseCriteria {
                include_patterns: names(&["nightly-*"]),
                exclude_patterns: None,
            },
            ..Default::default()
        });
        assert!(patterned.validate().is_ok());
    }

    #[test]
    fn test_validate_into_records_path() {
        let mut diags = Diagnostics::new();
        release_bundle(false, names(&[])).validate_into("criteria.0", &mut diags);

        let diag = diags.iter().next().unwrap();
        assert_eq!(diag.summary, "Invalid Attribute Configuration");
        assert_eq!(diag.attribute.as_deref(), Some("criteria.0.any_release_bundle"));
    }

    #[test]
    fn test_to_api_field_names() {
        let criteria = WebhookCriteria::ReleaseBundle(ReleaseBundleCriteria {
            base: BaseCriteria {
                include_patterns: names(&["product_*"]),
                exclude_patterns: None,
            },
            any_release_bundle: false,
            registered_release_bundle_names: names(&["bundle-b", "bundle-a"]),
        });

        let api = criteria.to_api().unwrap();
        assert_eq!(
            Value::Object(api),
            json!({
                "includePatterns": ["product_*"],
                "anyReleaseBundle": false,
                "registeredReleaseBundlesNames": ["bundle-a", "bundle-b"]
            })
        );
    }

    #[test]
    fn test_from_api_plural_flag_and_missing_names() {
        let api = json!({"anyReleaseBundles": true});
        let criteria =
            WebhookCriteria::from_api(CriteriaKind::ReleaseBundle, api.as_object().unwrap())
                .unwrap();

        assert_eq!(criteria, release_bundle(true, None));
        assert_eq!(
            criteria.to_state()["registered_release_bundle_names"],
            Value::Null
        );
        assert_eq!(criteria.to_state()["any_release_bundle"], true);
    }

    #[test]
    fn test_from_api_ignores_unknown_fields() {
        let api = json!({
            "anyBuild": false,
            "selectedBuilds": ["app"],
            "someFutureField": {"nested": 1}
        });
        let criteria =
            WebhookCriteria::from_api(CriteriaKind::Build, api.as_object().unwrap()).unwrap();
        assert_eq!(
            criteria,
            WebhookCriteria::Build(BuildCriteria {
                selected_builds: names(&["app"]),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_from_api_type_mismatch_is_error() {
        let api = json!({"anyLocal": "yes"});
        assert!(WebhookCriteria::from_api(CriteriaKind::Repo, api.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_state_round_trip() {
        let state = json!({
            "any_local": true,
            "any_remote": false,
            "any_federated": false,
            "repo_keys": ["a", "b"],
            "include_patterns": null,
            "exclude_patterns": ["tmp/**"]
        });
        let mut diags = Diagnostics::new();
        let criteria =
            WebhookCriteria::from_state(CriteriaKind::Repo, &state, "criteria.0", &mut diags)
                .unwrap();
        assert!(diags.is_empty());
        assert_eq!(criteria.to_state(), state);
    }

    #[test]
    fn test_criteria_block_attributes() {
        let block = criteria_block(CriteriaKind::ReleaseBundle);
        assert!(block.attributes.contains_key("any_release_bundle"));
        assert!(block.attributes.contains_key("registered_release_bundle_names"));
        assert!(block.attributes.contains_key("include_patterns"));
        assert!(!block.attributes.contains_key("selected_builds"));
    }
}
