use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{layer, layer_attribute};
use crate::jobs::Job;
use crate::spatial::BoundingBox;

// ---------- layer responses ----------

#[derive(Debug, Serialize, Clone)]
pub struct LayerResponse {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub layer_kind: String,
    pub geom_kind: String,
    pub source_file: Option<String>,
    pub catalog_entry: Option<String>,
    pub table_name: Option<String>,
    pub feature_count: i64,
    pub bbox: Option<BoundingBox>,
    pub is_published: bool,
    /// "imported", "loaded", "pending" or "no_file"
    pub import_status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<layer::Model> for LayerResponse {
    fn from(m: layer::Model) -> Self {
        Self {
            bbox: m.bbox(),
            import_status: m.import_status().as_str().to_string(),
            id: m.id,
            title: m.title,
            slug: m.slug,
            layer_kind: m.layer_kind,
            geom_kind: m.geom_kind,
            source_file: m.source_file,
            catalog_entry: m.catalog_entry,
            table_name: m.table_name,
            feature_count: m.feature_count,
            is_published: m.is_published,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct AttributeResponse {
    pub field_name: String,
    pub display_name: String,
    pub show_in_popup: bool,
    pub sort_order: i32,
}

impl From<layer_attribute::Model> for AttributeResponse {
    fn from(m: layer_attribute::Model) -> Self {
        Self {
            field_name: m.field_name,
            display_name: m.display_name,
            show_in_popup: m.show_in_popup,
            sort_order: m.sort_order,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LayerDetailResponse {
    #[serde(flatten)]
    pub layer: LayerResponse,
    pub attributes: Vec<AttributeResponse>,
}

// ---------- job requests / responses ----------

#[derive(Debug, Deserialize)]
pub struct LayerIdsRequest {
    pub layer_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job_id: String,
}

#[derive(Debug, Serialize)]
pub struct BulkJobsResponse {
    pub job_ids: Vec<String>,
    /// Layers that were not queued, with the reason.
    pub skipped: Vec<SkippedLayer>,
}

#[derive(Debug, Serialize)]
pub struct SkippedLayer {
    pub layer_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub kind: String,
    pub layer_id: Option<Uuid>,
    pub status: String,
    pub elapsed_ms: u128,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl From<&Job> for JobStatusResponse {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            kind: job.kind.as_str().to_string(),
            layer_id: job.layer_id,
            status: job.status.as_str().to_string(),
            elapsed_ms: job.created_at.elapsed().as_millis(),
            result: job.result.clone(),
            error: job.error.clone(),
        }
    }
}
