use std::path::PathBuf;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use uuid::Uuid;

use super::{
    ImportOutcome, ImportStage, Pipeline, display_label, normalize_geometry_kind,
    table_name_for_slug, with_retries,
};
use crate::entity::{layer, layer_attribute};
use crate::error::{PipelineError, Result};
use crate::metadata;
use crate::spatial::ColumnInfo;

/// Namespace for deterministic attribute ids (UUID v5 of `layer_id:field_name`).
const ATTRIBUTE_NS: Uuid = Uuid::from_bytes([
    0x3f, 0x6c, 0x1d, 0x82, 0x9a, 0x4b, 0x5e, 0x07,
    0x91, 0xc2, 0x5d, 0x3a, 0xe8, 0x70, 0x14, 0xbb,
]);

fn attribute_uuid(layer_id: Uuid, field_name: &str) -> Uuid {
    let key = format!("{layer_id}:{field_name}");
    Uuid::new_v5(&ATTRIBUTE_NS, key.as_bytes())
}

impl Pipeline {
    /// Import a layer's source file, retrying unexpected errors.
    ///
    /// Never fails: errors become a failed [`ImportOutcome`].
    pub async fn run_import(
        &self,
        layer_id: Uuid,
        progress: &(dyn Fn(ImportStage) + Send + Sync),
    ) -> ImportOutcome {
        progress(ImportStage::Queued);

        let result = with_retries(
            self.settings.max_retries,
            self.settings.retry_backoff,
            "import",
            move || self.import_layer(layer_id, progress),
        )
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(layer_id = %layer_id, error = %e, "import failed");
                ImportOutcome::failed(e.to_string())
            }
        }
    }

    /// One import attempt. Business failures are returned before any side effect
    /// on the layer record.
    pub async fn import_layer(
        &self,
        layer_id: Uuid,
        progress: &(dyn Fn(ImportStage) + Send + Sync),
    ) -> Result<ImportOutcome> {
        let layer = layer::Entity::find_by_id(layer_id)
            .one(&self.db)
            .await?
            .ok_or(PipelineError::RecordNotFound(layer_id))?;

        let source = self.source_path(&layer)?;
        let table = table_name_for_slug(&layer.slug);
        tracing::info!(
            layer = %layer.title,
            table = %table,
            source = %source.display(),
            "starting import"
        );

        progress(ImportStage::Resolving);
        let resolved = self.resolver.resolve(&source).await?;

        progress(ImportStage::Loading);
        let result = self.loader.load(resolved.path(), &table).await;
        // Extraction directory goes away here, before any early return.
        drop(resolved);

        if !result.success {
            return Err(result.error.unwrap_or(PipelineError::ConversionFailed {
                diagnostic: result.message,
            }));
        }

        progress(ImportStage::Extracting);
        let bbox = metadata::table_bbox(self.store.as_ref(), &table).await;
        let columns = metadata::table_columns(self.store.as_ref(), &table).await;
        let geom_kind = normalize_geometry_kind(result.geom_type.as_deref().unwrap_or_default());

        progress(ImportStage::UpdatingRecord);
        let txn = self.db.begin().await?;

        let mut active: layer::ActiveModel = layer.into();
        active.table_name = Set(Some(table.clone()));
        active.feature_count = Set(result.feature_count);
        active.geom_kind = Set(geom_kind.as_str().to_string());
        active.bbox_west = Set(bbox.map(|b| b.west));
        active.bbox_south = Set(bbox.map(|b| b.south));
        active.bbox_east = Set(bbox.map(|b| b.east));
        active.bbox_north = Set(bbox.map(|b| b.north));
        active.updated_at = Set(Utc::now().naive_utc());
        let layer = active.update(&txn).await?;

        progress(ImportStage::CreatingAttributes);
        upsert_attributes(&txn, layer.id, &columns).await?;
        txn.commit().await?;

        progress(ImportStage::Publishing);
        let workspace = &self.settings.workspace;
        let catalog_entry = match self
            .catalog
            .publish_postgis_layer(&table, &layer.title, workspace, &self.settings.datastore)
            .await
        {
            Ok(action) => {
                let entry = format!("{workspace}:{table}");
                let mut active: layer::ActiveModel = layer.clone().into();
                active.catalog_entry = Set(Some(entry.clone()));
                active.updated_at = Set(Utc::now().naive_utc());
                active.update(&self.db).await?;
                tracing::info!(layer = %layer.title, entry = %entry, ?action, "published to catalog");
                Some(entry)
            }
            Err(e) => {
                // Data stays queryable; publication can be retried with a re-import.
                tracing::warn!(layer = %layer.title, error = %e, "catalog publish failed");
                None
            }
        };

        progress(ImportStage::Done);
        Ok(ImportOutcome {
            success: true,
            message: format!("Imported {} features", result.feature_count),
            feature_count: result.feature_count,
            geom_type: Some(geom_kind.as_str().to_string()),
            geoserver: catalog_entry.is_some(),
            catalog_entry,
            table_name: Some(table),
        })
    }

    /// Absolute path of the layer's source file, which must exist.
    fn source_path(&self, layer: &layer::Model) -> Result<PathBuf> {
        let raw = layer
            .source_file
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                PipelineError::SourceFileMissing(format!("layer '{}' has no source file", layer.slug))
            })?;

        let path = self.settings.media_root.join(raw);
        if !path.is_file() {
            return Err(PipelineError::SourceFileMissing(path.display().to_string()));
        }
        Ok(path)
    }
}

/// Create or update one attribute row per column, keyed by field name.
/// Rows for columns that disappeared are left in place.
async fn upsert_attributes<C: ConnectionTrait>(
    db: &C,
    layer_id: Uuid,
    columns: &[ColumnInfo],
) -> Result<()> {
    for (i, col) in columns.iter().enumerate() {
        let existing = layer_attribute::Entity::find()
            .filter(layer_attribute::Column::LayerId.eq(layer_id))
            .filter(layer_attribute::Column::FieldName.eq(col.name.as_str()))
            .one(db)
            .await?;

        let display_name = display_label(&col.name);
        let sort_order = i as i32;

        match existing {
            Some(attr) => {
                let mut active: layer_attribute::ActiveModel = attr.into();
                active.display_name = Set(display_name);
                active.show_in_popup = Set(true);
                active.sort_order = Set(sort_order);
                active.update(db).await?;
            }
            None => {
                layer_attribute::ActiveModel {
                    id: Set(attribute_uuid(layer_id, &col.name)),
                    layer_id: Set(layer_id),
                    field_name: Set(col.name.clone()),
                    display_name: Set(display_name),
                    show_in_popup: Set(true),
                    sort_order: Set(sort_order),
                }
                .insert(db)
                .await?;
            }
        }
    }
    Ok(())
}
