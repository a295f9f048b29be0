//! Managed resource types.
//!
//! Each resource type implements [`Resource`]; the provider looks them up by
//! type name and dispatches lifecycle calls to them.

pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ProviderError;
use crate::provider::ProviderData;
use crate::schema::{Diagnostics, Schema};

use self::webhook::{WebhookDomain, WebhookResource};

/// Lifecycle of one managed resource type.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Resource type name, e.g. `artifactory_build_webhook`.
    fn type_name(&self) -> &str;

    /// Schema of the resource.
    fn schema(&self) -> Schema;

    /// Cross-field checks beyond what the schema can express.
    fn validate_config(&self, config: &Value) -> Diagnostics {
        let _ = config;
        Diagnostics::new()
    }

    /// Create the remote object and return the new state.
    async fn create(&self, data: &ProviderData, planned: Value) -> Result<Value, ProviderError>;

    /// Refresh state; `None` when the remote object no longer exists.
    async fn read(&self, data: &ProviderData, current: Value) -> Result<Option<Value>, ProviderError>;

    /// Update the remote object in place and return the new state.
    async fn update(
        &self,
        data: &ProviderData,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the remote object. Deleting an absent object succeeds.
    async fn delete(&self, data: &ProviderData, current: Value) -> Result<(), ProviderError>;

    /// Fetch an existing object by id and return its state.
    async fn import(&self, data: &ProviderData, id: &str) -> Result<Value, ProviderError> {
        let _ = (data, id);
        Err(ProviderError::Unimplemented(format!(
            "Import not supported for resource type: {}",
            self.type_name()
        )))
    }
}

/// Every resource type the provider manages.
pub fn all() -> Vec<Arc<dyn Resource>> {
    WebhookDomain::ALL
        .iter()
        .map(|domain| Arc::new(WebhookResource::new(*domain)) as Arc<dyn Resource>)
        .collect()
}
