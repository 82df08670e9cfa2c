use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};

use super::{DeleteOutcome, Pipeline, StepOutcome};
use crate::catalog::split_catalog_entry;
use crate::entity::layer;
use crate::error::Result;

impl Pipeline {
    /// Tear down a layer's catalog entry and table. Each side is attempted
    /// regardless of how the other went; nothing is retried.
    pub async fn run_delete(
        &self,
        table_name: Option<&str>,
        catalog_entry: Option<&str>,
    ) -> DeleteOutcome {
        let catalog = match catalog_entry.filter(|e| !e.is_empty()) {
            None => None,
            Some(entry) => Some(self.delete_catalog_entry(entry).await),
        };

        let table = match table_name.filter(|t| !t.is_empty()) {
            None => None,
            Some(table) => Some(match self.store.drop_table(table).await {
                Ok(()) => {
                    tracing::info!(table = %table, "dropped table");
                    StepOutcome::ok(format!("Table {table} dropped"))
                }
                Err(e) => {
                    tracing::error!(table = %table, error = %e, "drop table failed");
                    StepOutcome::failed(e.to_string())
                }
            }),
        };

        DeleteOutcome { catalog, table }
    }

    async fn delete_catalog_entry(&self, entry: &str) -> StepOutcome {
        let Some((workspace, name)) = split_catalog_entry(entry) else {
            tracing::warn!(entry = %entry, "malformed catalog entry, expected workspace:layer");
            return StepOutcome::failed(format!("Malformed catalog entry: {entry}"));
        };

        match self
            .catalog
            .delete_layer(name, workspace, &self.settings.datastore)
            .await
        {
            Ok(()) => StepOutcome::ok(format!("Layer {entry} deleted")),
            Err(e) => {
                tracing::error!(entry = %entry, error = %e, "catalog delete failed");
                StepOutcome::failed(e.to_string())
            }
        }
    }
}

/// Forget everything the import pipeline derived for a layer. The source file
/// and declared kinds are kept, so the layer can be imported again.
pub async fn clear_pipeline_fields<C: ConnectionTrait>(
    db: &C,
    layer: layer::Model,
) -> Result<layer::Model> {
    let mut active: layer::ActiveModel = layer.into();
    active.table_name = Set(None);
    active.catalog_entry = Set(None);
    active.feature_count = Set(0);
    active.bbox_west = Set(None);
    active.bbox_south = Set(None);
    active.bbox_east = Set(None);
    active.bbox_north = Set(None);
    active.updated_at = Set(Utc::now().naive_utc());
    Ok(active.update(db).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoaderConfig;
    use crate::loader::SpatialLoader;
    use crate::resolver::Resolver;
    use crate::tasks::TaskSettings;
    use crate::testing::{FakeCatalog, FakeRunner, FakeStore, insert_layer, spatial_config, test_db};
    use sea_orm::DatabaseConnection;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    async fn pipeline(store: Arc<FakeStore>, catalog: Arc<FakeCatalog>) -> Pipeline {
        let db: DatabaseConnection = test_db().await;
        let loader = SpatialLoader::new(
            Arc::new(FakeRunner::succeeding()),
            store.clone(),
            spatial_config(),
            LoaderConfig::default(),
        );
        Pipeline::new(
            db,
            Resolver::new(),
            loader,
            store,
            catalog,
            TaskSettings {
                media_root: PathBuf::from("media"),
                workspace: "geoportal".to_string(),
                datastore: "postgis".to_string(),
                max_retries: 0,
                retry_backoff: Duration::ZERO,
            },
        )
    }

    #[tokio::test]
    async fn test_table_only_drops_table_and_skips_catalog() {
        let store = Arc::new(FakeStore::default());
        let catalog = Arc::new(FakeCatalog::default());
        let p = pipeline(store.clone(), catalog.clone()).await;

        let outcome = p.run_delete(Some("rivers"), None).await;

        assert_eq!(outcome.catalog, None);
        assert!(outcome.table.as_ref().unwrap().success);
        assert_eq!(store.dropped(), vec!["rivers"]);
        assert!(catalog.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_entry_only_deletes_catalog_layer() {
        let store = Arc::new(FakeStore::default());
        let catalog = Arc::new(FakeCatalog::default());
        let p = pipeline(store.clone(), catalog.clone()).await;

        let outcome = p.run_delete(None, Some("geoportal:rivers")).await;

        assert_eq!(outcome.table, None);
        assert!(outcome.catalog.as_ref().unwrap().success);
        assert!(store.dropped().is_empty());
        assert_eq!(
            catalog.deleted(),
            vec![(
                "rivers".to_string(),
                "geoportal".to_string(),
                "postgis".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_catalog_failure_does_not_prevent_drop() {
        let store = Arc::new(FakeStore::default());
        let p = pipeline(store.clone(), Arc::new(FakeCatalog::failing_delete())).await;

        let outcome = p.run_delete(Some("rivers"), Some("geoportal:rivers")).await;

        assert!(!outcome.catalog.as_ref().unwrap().success);
        assert!(outcome.table.as_ref().unwrap().success);
        assert!(!outcome.success());
        assert_eq!(store.dropped(), vec!["rivers"]);
    }

    #[tokio::test]
    async fn test_drop_failure_does_not_prevent_catalog_delete() {
        let catalog = Arc::new(FakeCatalog::default());
        let p = pipeline(Arc::new(FakeStore::failing()), catalog.clone()).await;

        let outcome = p.run_delete(Some("rivers"), Some("geoportal:rivers")).await;

        assert!(outcome.catalog.as_ref().unwrap().success);
        assert!(!outcome.table.as_ref().unwrap().success);
        assert_eq!(catalog.deleted().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_entry_is_a_failed_catalog_step() {
        let catalog = Arc::new(FakeCatalog::default());
        let p = pipeline(Arc::new(FakeStore::default()), catalog.clone()).await;

        let outcome = p.run_delete(None, Some("rivers")).await;

        let step = outcome.catalog.unwrap();
        assert!(!step.success);
        assert!(step.message.contains("Malformed"));
        assert!(catalog.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_nothing_to_delete() {
        let p = pipeline(Arc::new(FakeStore::default()), Arc::new(FakeCatalog::default())).await;
        let outcome = p.run_delete(Some(""), None).await;
        assert_eq!(outcome, DeleteOutcome::default());
        assert!(outcome.success());
    }

    #[tokio::test]
    async fn test_clear_pipeline_fields_keeps_source() {
        let db = test_db().await;
        let layer = insert_layer(&db, "rivers", Some(std::path::Path::new("rivers.zip"))).await;
        let mut active: layer::ActiveModel = layer.into();
        active.table_name = Set(Some("rivers".to_string()));
        active.catalog_entry = Set(Some("geoportal:rivers".to_string()));
        active.feature_count = Set(12);
        active.bbox_west = Set(Some(1.0));
        active.bbox_south = Set(Some(2.0));
        active.bbox_east = Set(Some(3.0));
        active.bbox_north = Set(Some(4.0));
        let loaded = active.update(&db).await.unwrap();
        assert_eq!(loaded.import_status(), layer::ImportStatus::Imported);

        let cleared = clear_pipeline_fields(&db, loaded).await.unwrap();

        assert_eq!(cleared.table_name, None);
        assert_eq!(cleared.catalog_entry, None);
        assert_eq!(cleared.feature_count, 0);
        assert_eq!(cleared.bbox(), None);
        assert_eq!(cleared.source_file.as_deref(), Some("rivers.zip"));
        assert_eq!(cleared.import_status(), layer::ImportStatus::Pending);
    }
}
