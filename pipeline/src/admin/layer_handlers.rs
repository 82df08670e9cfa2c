use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use sea_orm::{ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use crate::catalog::split_catalog_entry;
use crate::entity::{layer, layer_attribute};
use crate::tasks::delete::clear_pipeline_fields;

use super::{
    AdminState, ApiErr,
    dto::{
        AttributeResponse, BulkJobsResponse, LayerDetailResponse,
        LayerIdsRequest, LayerResponse, SkippedLayer, SubmitJobResponse,
    },
};

async fn find_layer(state: &AdminState, id: Uuid) -> Result<layer::Model, ApiErr> {
    layer::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(ApiErr::internal)?
        .ok_or_else(|| ApiErr::not_found("Layer not found"))
}

fn has_value(v: &Option<String>) -> bool {
    v.as_deref().is_some_and(|s| !s.is_empty())
}

/// Id of the import currently running for a layer.
/// Teardown must wait for it, or the table it writes would be orphaned.
async fn running_import(state: &AdminState, id: Uuid) -> Option<String> {
    state
        .queue
        .jobs()
        .lock()
        .await
        .active_for_layer(id)
        .map(|job| job.id.clone())
}

// ---------- GET /layers ----------

pub async fn list_layers(
    State(state): State<AdminState>,
) -> Result<Json<Vec<LayerResponse>>, ApiErr> {
    let layers = layer::Entity::find()
        .order_by_asc(layer::Column::Title)
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?;

    Ok(Json(layers.into_iter().map(LayerResponse::from).collect()))
}

// ---------- GET /layers/{id} ----------

pub async fn get_layer(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LayerDetailResponse>, ApiErr> {
    let layer = find_layer(&state, id).await?;

    let attributes = layer_attribute::Entity::find()
        .filter(layer_attribute::Column::LayerId.eq(id))
        .order_by_asc(layer_attribute::Column::SortOrder)
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?;

    Ok(Json(LayerDetailResponse {
        layer: LayerResponse::from(layer),
        attributes: attributes.into_iter().map(AttributeResponse::from).collect(),
    }))
}

// ---------- DELETE /layers/{id} ----------

pub async fn delete_layer(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiErr> {
    let layer = find_layer(&state, id).await?;

    if let Some(job_id) = running_import(&state, id).await {
        return Err(ApiErr::conflict(format!(
            "Import in progress (job_id: {job_id})"
        )));
    }

    if has_value(&layer.table_name) || has_value(&layer.catalog_entry) {
        state
            .queue
            .enqueue_delete(layer.table_name.clone(), layer.catalog_entry.clone())
            .await;
    }

    layer_attribute::Entity::delete_many()
        .filter(layer_attribute::Column::LayerId.eq(id))
        .exec(&state.db)
        .await
        .map_err(ApiErr::internal)?;
    layer.delete(&state.db).await.map_err(ApiErr::internal)?;

    tracing::info!(layer_id = %id, "layer deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---------- POST /layers/{id}/import ----------

pub async fn submit_import(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<SubmitJobResponse>), ApiErr> {
    find_layer(&state, id).await?;

    let job_id = state.queue.enqueue_import(id).await.map_err(|existing_id| {
        ApiErr::conflict(format!("Import already in progress (job_id: {existing_id})"))
    })?;

    Ok((StatusCode::ACCEPTED, Json(SubmitJobResponse { job_id })))
}

// ---------- POST /layers/import ----------

/// Queue an import for every selected layer that has a source file.
pub async fn bulk_import(
    State(state): State<AdminState>,
    Json(body): Json<LayerIdsRequest>,
) -> Result<Json<BulkJobsResponse>, ApiErr> {
    let mut job_ids = Vec::new();
    let mut skipped = Vec::new();

    for id in body.layer_ids {
        let found = layer::Entity::find_by_id(id)
            .one(&state.db)
            .await
            .map_err(ApiErr::internal)?;

        let reason = match found {
            None => Some("not found".to_string()),
            Some(l) if !has_value(&l.source_file) => Some("no source file".to_string()),
            Some(_) => match state.queue.enqueue_import(id).await {
                Ok(job_id) => {
                    job_ids.push(job_id);
                    None
                }
                Err(existing_id) => Some(format!("already importing (job_id: {existing_id})")),
            },
        };

        if let Some(reason) = reason {
            skipped.push(SkippedLayer {
                layer_id: id,
                reason,
            });
        }
    }

    tracing::info!(queued = job_ids.len(), skipped = skipped.len(), "bulk import");
    Ok(Json(BulkJobsResponse { job_ids, skipped }))
}

// ---------- POST /layers/reset ----------

/// Queue teardown of each layer's table and catalog entry, then clear the
/// pipeline-derived fields. Layers with nothing imported or with an import
/// still running are skipped.
pub async fn bulk_reset(
    State(state): State<AdminState>,
    Json(body): Json<LayerIdsRequest>,
) -> Result<Json<BulkJobsResponse>, ApiErr> {
    let mut job_ids = Vec::new();
    let mut skipped = Vec::new();

    for id in body.layer_ids {
        let found = layer::Entity::find_by_id(id)
            .one(&state.db)
            .await
            .map_err(ApiErr::internal)?;

        let reason = match found {
            None => Some("not found".to_string()),
            Some(l) if !has_value(&l.table_name) && !has_value(&l.catalog_entry) => {
                Some("nothing to reset".to_string())
            }
            Some(l) => match running_import(&state, id).await {
                Some(existing_id) => Some(format!("import in progress (job_id: {existing_id})")),
                None => {
                    let job_id = state
                        .queue
                        .enqueue_delete(l.table_name.clone(), l.catalog_entry.clone())
                        .await;
                    job_ids.push(job_id);

                    clear_pipeline_fields(&state.db, l)
                        .await
                        .map_err(ApiErr::internal)?;
                    None
                }
            },
        };

        if let Some(reason) = reason {
            skipped.push(SkippedLayer {
                layer_id: id,
                reason,
            });
        }
    }

    tracing::info!(queued = job_ids.len(), skipped = skipped.len(), "bulk reset");
    Ok(Json(BulkJobsResponse { job_ids, skipped }))
}

// ---------- GET /layers/{id}/catalog ----------

/// The live catalog document for a published layer.
pub async fn get_catalog_layer(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiErr> {
    let layer = find_layer(&state, id).await?;

    let entry = layer
        .catalog_entry
        .as_deref()
        .ok_or_else(|| ApiErr::not_found("Layer is not published"))?;
    let (workspace, name) = split_catalog_entry(entry)
        .ok_or_else(|| ApiErr::not_found(format!("Malformed catalog entry: {entry}")))?;

    let doc = state
        .queue
        .pipeline()
        .catalog()
        .layer_info(name, workspace)
        .await
        .map_err(|e| ApiErr::new(StatusCode::BAD_GATEWAY, e.to_string()))?
        .ok_or_else(|| ApiErr::not_found("Layer not found in catalog"))?;

    Ok(Json(doc))
}
