//! `artifactory_remote_pypi_repository` data source.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

use super::DataSource;
use crate::client::path_with_segment;
use crate::error::ProviderError;
use crate::plan::normalize;
use crate::provider::ProviderData;
use crate::schema::{
    Attribute, AttributeFlags, AttributeType, AttributeValidator, Diagnostics, Schema,
};
use crate::values::ObjectReader;

/// Data source type name.
pub const TYPE_NAME: &str = "artifactory_remote_pypi_repository";

/// Repository class of remote repositories.
pub const REMOTE_RCLASS: &str = "remote";

/// Package type of PyPI repositories.
pub const PYPI_PACKAGE_TYPE: &str = "pypi";

/// Default layout of remote PyPI repositories.
pub const PYPI_DEFAULT_REPO_LAYOUT: &str = "simple-default";

const REPOSITORIES_PATH: &str = "artifactory/api/repositories";

/// A remote PyPI repository as returned by the repositories API.
///
/// Fields the response omits keep the values of [`Default`]. Field names
/// mirror the API.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PypiRemoteRepo {
    pub key: String,
    pub project_key: String,
    pub rclass: String,
    pub package_type: String,
    pub description: String,
    pub notes: String,
    pub includes_pattern: String,
    pub excludes_pattern: String,
    pub repo_layout_ref: String,
    pub url: String,
    pub username: String,
    pub proxy: String,
    pub hard_fail: bool,
    pub offline: bool,
    pub blacked_out: bool,
    pub xray_index: bool,
    pub store_artifacts_locally: bool,
    pub socket_timeout_millis: i64,
    pub retrieval_cache_period_secs: i64,
    pub missed_retrieval_cache_period_secs: i64,
    pub metadata_retrieval_timeout_secs: i64,
    pub unused_artifacts_cleanup_period_hours: i64,
    pub assumed_offline_period_secs: i64,
    pub synchronize_properties: bool,
    pub block_mismatching_mime_types: bool,
    pub property_sets: Vec<String>,
    pub allow_any_host_auth: bool,
    pub enable_cookie_management: bool,
    pub bypass_head_requests: bool,
    pub priority_resolution: bool,
    pub download_redirect: bool,
    pub list_remote_folder_items: bool,
    #[serde(rename = "pyPIRegistryUrl")]
    pub pypi_registry_url: String,
    #[serde(rename = "pyPIRepositorySuffix")]
    pub pypi_repository_suffix: String,
}

impl Default for PypiRemoteRepo {
    fn default() -> Self {
        Self {
            key: String::new(),
            project_key: String::new(),
            rclass: REMOTE_RCLASS.to_string(),
            package_type: PYPI_PACKAGE_TYPE.to_string(),
            description: String::new(),
            notes: String::new(),
            includes_pattern: "**/*".to_string(),
            excludes_pattern: String::new(),
            repo_layout_ref: PYPI_DEFAULT_REPO_LAYOUT.to_string(),
            url: String::new(),
            username: String::new(),
            proxy: String::new(),
            hard_fail: false,
            offline: false,
            blacked_out: false,
            xray_index: false,
            store_artifacts_locally: true,
            socket_timeout_millis: 15000,
            retrieval_cache_period_secs: 7200,
            missed_retrieval_cache_period_secs: 1800,
            metadata_retrieval_timeout_secs: 60,
            unused_artifacts_cleanup_period_hours: 0,
            assumed_offline_period_secs: 300,
            synchronize_properties: false,
            block_mismatching_mime_types: true,
            property_sets: Vec::new(),
            allow_any_host_auth: false,
            enable_cookie_management: false,
            bypass_head_requests: false,
            priority_resolution: false,
            download_redirect: false,
            list_remote_folder_items: true,
            pypi_registry_url: "https://pypi.org".to_string(),
            pypi_repository_suffix: "simple".to_string(),
        }
    }
}

impl PypiRemoteRepo {
    /// The repository as data source state.
    pub fn to_state(&self) -> Value {
        let mut property_sets = self.property_sets.clone();
        property_sets.sort();

        let strings = [
            ("id", &self.key),
            ("key", &self.key),
            ("project_key", &self.project_key),
            ("package_type", &self.package_type),
            ("description", &self.description),
            ("notes", &self.notes),
            ("includes_pattern", &self.includes_pattern),
            ("excludes_pattern", &self.excludes_pattern),
            ("repo_layout_ref", &self.repo_layout_ref),
            ("url", &self.url),
            ("username", &self.username),
            ("proxy", &self.proxy),
            ("pypi_registry_url", &self.pypi_registry_url),
            ("pypi_repository_suffix", &self.pypi_repository_suffix),
        ];
        let bools = [
            ("hard_fail", self.hard_fail),
            ("offline", self.offline),
            ("blacked_out", self.blacked_out),
            ("xray_index", self.xray_index),
            ("store_artifacts_locally", self.store_artifacts_locally),
            ("synchronize_properties", self.synchronize_properties),
            ("block_mismatching_mime_types", self.block_mismatching_mime_types),
            ("allow_any_host_auth", self.allow_any_host_auth),
            ("enable_cookie_management", self.enable_cookie_management),
            ("bypass_head_requests", self.bypass_head_requests),
            ("priority_resolution", self.priority_resolution),
            ("download_direct", self.download_redirect),
            ("list_remote_folder_items", self.list_remote_folder_items),
        ];
        let ints = [
            ("socket_timeout_millis", self.socket_timeout_millis),
            ("retrieval_cache_period_seconds", self.retrieval_cache_period_secs),
            ("missed_cache_period_seconds", self.missed_retrieval_cache_period_secs),
            ("metadata_retrieval_timeout_secs", self.metadata_retrieval_timeout_secs),
            ("unused_artifacts_cleanup_period_hours", self.unused_artifacts_cleanup_period_hours),
            ("assumed_offline_period_secs", self.assumed_offline_period_secs),
        ];

        let mut obj = Map::new();
        for (name, value) in strings {
            obj.insert(name.into(), Value::String(value.clone()));
        }
        for (name, value) in bools {
            obj.insert(name.into(), Value::Bool(value));
        }
        for (name, value) in ints {
            obj.insert(name.into(), json!(value));
        }
        obj.insert("property_sets".into(), json!(property_sets));
        Value::Object(obj)
    }
}

/// Schema of the data source: `key` in, everything else computed.
pub fn schema() -> Schema {
    let strings = [
        "id",
        "project_key",
        "package_type",
        "description",
        "notes",
        "includes_pattern",
        "excludes_pattern",
        "repo_layout_ref",
        "url",
        "username",
        "proxy",
        "pypi_registry_url",
        "pypi_repository_suffix",
    ];
    let bools = [
        "hard_fail",
        "offline",
        "blacked_out",
        "xray_index",
        "store_artifacts_locally",
        "synchronize_properties",
        "block_mismatching_mime_types",
        "allow_any_host_auth",
        "enable_cookie_management",
        "bypass_head_requests",
        "priority_resolution",
        "download_direct",
        "list_remote_folder_items",
    ];
    let ints = [
        "socket_timeout_millis",
        "retrieval_cache_period_seconds",
        "missed_cache_period_seconds",
        "metadata_retrieval_timeout_secs",
        "unused_artifacts_cleanup_period_hours",
        "assumed_offline_period_secs",
    ];

    let mut schema = Schema::v0()
        .with_description("Provides a data source for a remote Pypi repository")
        .with_attribute(
            "key",
            Attribute::required_string()
                .with_validator(AttributeValidator::StringNotEmpty)
                .with_description("the identity key of the repo."),
        )
        .with_attribute(
            "property_sets",
            Attribute::new(AttributeType::string_set(), AttributeFlags::computed()),
        );
    for name in strings {
        schema = schema.with_attribute(name, Attribute::computed_string());
    }
    for name in bools {
        schema = schema.with_attribute(name, Attribute::computed_bool());
    }
    for name in ints {
        schema = schema.with_attribute(name, Attribute::computed_int64());
    }
    schema
}

/// Looks up a remote PyPI repository by key.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemotePypiRepositoryDataSource;

#[async_trait]
impl DataSource for RemotePypiRepositoryDataSource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        schema()
    }

    #[instrument(skip(self, data, config), fields(data_source_type = TYPE_NAME))]
    async fn read(&self, data: &ProviderData, config: Value) -> Result<Value, ProviderError> {
        let mut diags = Diagnostics::new();
        let key = ObjectReader::new(&config, "", &mut diags)
            .and_then(|r| r.required_string("key", &mut diags));
        let key = match key {
            Some(key) if !diags.has_errors() => key,
            _ => return Err(diags.into()),
        };

        let repo: PypiRemoteRepo = data
            .client
            .get_json(&path_with_segment(REPOSITORIES_PATH, &key)?)
            .await?;
        if repo.rclass != REMOTE_RCLASS || repo.package_type != PYPI_PACKAGE_TYPE {
            return Err(ProviderError::FailedPrecondition(format!(
                "repository '{}' is a {} {} repository, expected {} {}",
                key, repo.rclass, repo.package_type, REMOTE_RCLASS, PYPI_PACKAGE_TYPE
            )));
        }

        debug!(key = %key, "remote pypi repository read");
        Ok(normalize(&schema().block, &repo.to_state()))
    }
}
