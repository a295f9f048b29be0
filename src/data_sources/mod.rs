//! Read-only data sources.

pub mod remote_pypi_repository;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ProviderError;
use crate::provider::ProviderData;
use crate::schema::{Diagnostics, Schema};

use self::remote_pypi_repository::RemotePypiRepositoryDataSource;

/// One data source type.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Data source type name.
    fn type_name(&self) -> &str;

    /// Schema of the data source.
    fn schema(&self) -> Schema;

    /// Checks beyond what the schema can express.
    fn validate_config(&self, config: &Value) -> Diagnostics {
        let _ = config;
        Diagnostics::new()
    }

    /// Look the object up and return its state.
    async fn read(&self, data: &ProviderData, config: Value) -> Result<Value, ProviderError>;
}

/// Every data source type the provider offers.
pub fn all() -> Vec<Arc<dyn DataSource>> {
    vec![Arc::new(RemotePypiRepositoryDataSource)]
}
