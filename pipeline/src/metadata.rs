//! Best-effort metadata reads for a freshly loaded table.
//!
//! Neither query is allowed to fail an import: errors are logged and degrade
//! to "no extent" / "no columns".

use crate::error::PipelineError;
use crate::spatial::{BoundingBox, ColumnInfo, SpatialStore};

pub async fn table_bbox(store: &dyn SpatialStore, table: &str) -> Option<BoundingBox> {
    match store.extent(table).await {
        Ok(bbox) => bbox,
        Err(e) => {
            let e = PipelineError::MetadataQueryFailed(format!("extent of {table}: {e}"));
            tracing::warn!(table = %table, error = %e, "could not compute bounding box");
            None
        }
    }
}

pub async fn table_columns(store: &dyn SpatialStore, table: &str) -> Vec<ColumnInfo> {
    match store.columns(table).await {
        Ok(columns) => columns,
        Err(e) => {
            let e = PipelineError::MetadataQueryFailed(format!("columns of {table}: {e}"));
            tracing::warn!(table = %table, error = %e, "could not list columns");
            Vec::new()
        }
    }
}
