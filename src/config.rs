//! Provider configuration.
//!
//! The provider block may leave `url` and `access_token` unset; they then
//! fall back to environment variables, first set variable wins:
//!
//! | Setting        | Variables                                       |
//! |----------------|-------------------------------------------------|
//! | `url`          | `JFROG_URL`, `ARTIFACTORY_URL`                  |
//! | `access_token` | `JFROG_ACCESS_TOKEN`, `ARTIFACTORY_ACCESS_TOKEN`|

use serde::Deserialize;
use serde_json::{json, Value};

use crate::schema::{Attribute, AttributeValidator, Diagnostic, Diagnostics, Schema};

/// Environment variables consulted for the URL, in order.
pub const URL_ENV_VARS: [&str; 2] = ["JFROG_URL", "ARTIFACTORY_URL"];

/// Environment variables consulted for the access token, in order.
pub const ACCESS_TOKEN_ENV_VARS: [&str; 2] = ["JFROG_ACCESS_TOKEN", "ARTIFACTORY_ACCESS_TOKEN"];

/// License types accepted by the pre-flight license check.
pub const ALLOWED_LICENSES: [&str; 3] = ["Enterprise", "Commercial", "Edge"];

const API_KEY_DEPRECATION: &str = "An upcoming version will support the option to block the usage/creation of API Keys (for admins to set on their platform).\n\
In a future version, the option to disable the usage/creation of API Keys will be available and set to disabled by default. Admins will be able to enable the usage/creation of API Keys.\n\
API Keys will eventually be deprecated all together and the option to use them will no longer be available.";

/// The provider block as written by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Artifactory URL.
    pub url: Option<String>,
    /// Deprecated API key.
    pub api_key: Option<String>,
    /// Access token.
    pub access_token: Option<String>,
    /// Pre-flight license check; `true` when unset.
    pub check_license: Option<bool>,
}

/// Configuration after environment fallbacks.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// Artifactory URL.
    pub url: String,
    /// Access token, if any.
    pub access_token: Option<String>,
    /// API key, if any.
    pub api_key: Option<String>,
    /// Whether to check the license.
    pub check_license: bool,
}

impl std::fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("url", &self.url)
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("check_license", &self.check_license)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn first_env<F>(names: &[&str], lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    names.iter().find_map(|name| non_empty(lookup(name)))
}

impl ProviderConfig {
    /// Parse the provider block. `null` means an empty block.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone())
    }

    /// Apply environment fallbacks using `lookup` for variables.
    pub fn resolve_with<F>(self, lookup: F) -> Result<ResolvedConfig, Diagnostics>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = non_empty(self.url).or_else(|| first_env(&URL_ENV_VARS, &lookup));
        let Some(url) = url else {
            return Err(Diagnostic::error("missing URL Configuration")
                .with_detail(format!(
                    "Set the `url` attribute or one of the {} environment variables",
                    URL_ENV_VARS.join(", ")
                ))
                .into());
        };

        Ok(ResolvedConfig {
            url,
            access_token: non_empty(self.access_token)
                .or_else(|| first_env(&ACCESS_TOKEN_ENV_VARS, &lookup)),
            api_key: non_empty(self.api_key),
            check_license: self.check_license.unwrap_or(true),
        })
    }
}

/// Schema of the provider block.
pub fn provider_schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "url",
            Attribute::optional_string()
                .with_validator(AttributeValidator::UrlWithHttpOrHttps)
                .with_description("Artifactory URL."),
        )
        .with_attribute(
            "api_key",
            Attribute::optional_string()
                .sensitive()
                .with_validator(AttributeValidator::StringNotEmpty)
                .with_deprecation(API_KEY_DEPRECATION)
                .with_description("API key. If `access_token` attribute, `JFROG_ACCESS_TOKEN` or `ARTIFACTORY_ACCESS_TOKEN` environment variable is set, the provider will ignore this attribute."),
        )
        .with_attribute(
            "access_token",
            Attribute::optional_string()
                .sensitive()
                .with_description("This is a access token that can be given to you by your admin under `User Management -> Access Tokens`. If not set, the 'api_key' attribute value will be used."),
        )
        .with_attribute(
            "check_license",
            Attribute::optional_bool()
                .with_default(json!(true))
                .with_description("Toggle for pre-flight checking of Artifactory Pro and Enterprise license. Default to `true`."),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_config_wins_over_env() {
        let config = ProviderConfig {
            url: Some("https://config.jfrog.io".into()),
            access_token: Some("config-token".into()),
            ..Default::default()
        };
        let resolved = config
            .resolve_with(env(&[
                ("JFROG_URL", "https://env.jfrog.io"),
                ("JFROG_ACCESS_TOKEN", "env-token"),
            ]))
            .unwrap();

        assert_eq!(resolved.url, "https://config.jfrog.io");
        assert_eq!(resolved.access_token.as_deref(), Some("config-token"));
        assert!(resolved.check_license);
    }

    #[test]
    fn test_env_fallback_order() {
        let resolved = ProviderConfig::default()
            .resolve_with(env(&[
                ("JFROG_URL", ""),
                ("ARTIFACTORY_URL", "https://artifactory.example.com"),
                ("JFROG_ACCESS_TOKEN", "jfrog-token"),
                ("ARTIFACTORY_ACCESS_TOKEN", "artifactory-token"),
            ]))
            .unwrap();

        assert_eq!(resolved.url, "https://artifactory.example.com");
        assert_eq!(resolved.access_token.as_deref(), Some("jfrog-token"));
    }

    #[test]
    fn test_missing_url() {
        let diags = ProviderConfig::default().resolve_with(env(&[])).unwrap_err();
        assert_eq!(diags.iter().next().unwrap().summary, "missing URL Configuration");
    }

    #[test]
    fn test_from_value() {
        let config = ProviderConfig::from_value(&json!({
            "url": "https://example.jfrog.io",
            "check_license": false,
            "api_key": null
        }))
        .unwrap();
        assert_eq!(config.check_license, Some(false));
        assert!(config.api_key.is_none());

        assert_eq!(ProviderConfig::from_value(&Value::Null).unwrap(), ProviderConfig::default());
        assert!(ProviderConfig::from_value(&json!({"check_license": "no"})).is_err());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let resolved = ProviderConfig {
            url: Some("https://example.jfrog.io".into()),
            access_token: Some("tok-123".into()),
            api_key: Some("key-456".into()),
            check_license: None,
        }
        .resolve_with(env(&[]))
        .unwrap();
        let debug = format!("{:?}", resolved);
        assert!(!debug.contains("tok-123"));
        assert!(!debug.contains("key-456"));
    }

    #[test]
    fn test_schema_warns_on_api_key() {
        let diags = validate(
            &provider_schema(),
            &json!({"url": "https://example.jfrog.io", "api_key": "key"}),
        );
        assert!(!diags.has_errors());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags.iter().next().unwrap().attribute.as_deref(), Some("api_key"));
    }

    #[test]
    fn test_schema_rejects_bad_url() {
        let diags = validate(&provider_schema(), &json!({"url": "example.jfrog.io"}));
        assert!(diags.has_errors());
    }
}
