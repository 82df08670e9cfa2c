use crate::error::Result;

pub mod geoserver;

pub use geoserver::GeoServerClient;

/// Which path a publish took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishAction {
    /// The feature type did not exist and was created.
    Created,
    /// The feature type already existed and was updated in place.
    Updated,
}

/// The remote map-publishing catalog.
///
/// Every call is a single attempt; callers own any retry policy.
#[async_trait::async_trait]
pub trait CatalogService: Send + Sync {
    /// Ensure workspace and datastore exist, then create or update the feature
    /// type for `table`.
    async fn publish_postgis_layer(
        &self,
        table: &str,
        title: &str,
        workspace: &str,
        store: &str,
    ) -> Result<PublishAction>;

    /// Delete the feature type and, recursively, the layer built on it.
    async fn delete_layer(&self, name: &str, workspace: &str, store: &str) -> Result<()>;

    /// The published layer document, or `None` if the catalog has no such layer.
    async fn layer_info(&self, name: &str, workspace: &str) -> Result<Option<serde_json::Value>>;
}

/// Split a `workspace:layer` catalog entry.
pub fn split_catalog_entry(entry: &str) -> Option<(&str, &str)> {
    entry
        .split_once(':')
        .filter(|(ws, name)| !ws.is_empty() && !name.is_empty())
}
