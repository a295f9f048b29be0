//! Artifactory provider
//!
//! Manages JFrog Artifactory objects from declarative configuration. A host
//! engine hands over JSON-shaped configuration and state; this crate
//! validates it, maps it onto Artifactory's REST API and maps the responses
//! back into state.
//!
//! # Overview
//!
//! - **Webhook resources**: one resource type per event domain
//!   (`artifactory_build_webhook`, `artifactory_release_bundle_webhook`, ...)
//!   sharing a single mapper and CRUD dispatcher
//! - **Data sources**: `artifactory_remote_pypi_repository`
//! - **ProviderService trait**: the lifecycle interface a host engine drives,
//!   implemented by [`ArtifactoryProvider`]
//! - **Schema, validation and planning**: schema types, generic validation
//!   and diff/replace planning over JSON values
//! - **HTTP client**: [`client::ArtifactoryClient`] with token or API key auth
//! - **Logging**: `tracing` throughout, with helpers to install a subscriber
//!
//! # Quick Start
//!
//! ```ignore
//! use artifactory_provider::{ArtifactoryProvider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     artifactory_provider::init_logging();
//!
//!     let provider = ArtifactoryProvider::new().with_terraform_version("1.9.0");
//!     let diags = provider
//!         .configure(json!({"url": "https://example.jfrog.io"}))
//!         .await?;
//!     if diags.has_errors() {
//!         return Err(diags.to_string().into());
//!     }
//!
//!     let config = json!({
//!         "key": "release-hook",
//!         "event_types": ["created", "signed"],
//!         "criteria": [{
//!             "any_release_bundle": false,
//!             "registered_release_bundle_names": ["my-bundle"]
//!         }],
//!         "handler": [{"url": "https://hooks.example.com/artifactory"}]
//!     });
//!
//!     let resource_type = "artifactory_release_bundle_webhook";
//!     let diags = provider
//!         .validate_resource_config(resource_type, config.clone())
//!         .await?;
//!     assert!(!diags.has_errors());
//!
//!     let plan = provider.plan(resource_type, None, config.clone(), config).await?;
//!     let state = provider.create(resource_type, plan.planned_state).await?;
//!     println!("{}", state);
//!     Ok(())
//! }
//! ```
//!
//! # Environment
//!
//! - `JFROG_URL` / `ARTIFACTORY_URL`: instance URL when `url` is unset
//! - `JFROG_ACCESS_TOKEN` / `ARTIFACTORY_ACCESS_TOKEN`: token when
//!   `access_token` is unset
//! - `RUST_LOG`: log filter

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod configuration;
pub mod data_sources;
pub mod error;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod testing;
pub mod types;
pub mod usage;
pub mod validation;
pub mod values;

// Re-export main types at crate root
pub use client::{ArtifactoryClient, Auth};
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{ArtifactoryProvider, ProviderData, ProviderService};
pub use resources::webhook::criteria::{CriteriaError, WebhookCriteria};
pub use resources::webhook::{WebhookDomain, WebhookResource};
pub use schema::{Diagnostic, Diagnostics, ProviderSchema};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
