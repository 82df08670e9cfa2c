use axum::{
    extract::{Path, State},
    response::{
        Json,
        sse::{Event, KeepAlive, Sse},
    },
};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use super::{AdminState, ApiErr, dto::JobStatusResponse};

// ---------- GET /jobs/{job_id}: poll status ----------

pub async fn job_status(
    State(state): State<AdminState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiErr> {
    let store = state.queue.jobs().lock().await;
    let job = store
        .get(&job_id)
        .ok_or_else(|| ApiErr::not_found("Job not found"))?;

    Ok(Json(JobStatusResponse::from(job)))
}

// ---------- GET /jobs/{job_id}/events: SSE stream ----------

pub async fn job_events(
    State(state): State<AdminState>,
    Path(job_id): Path<String>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, ApiErr> {
    let rx = {
        let store = state.queue.jobs().lock().await;
        store
            .subscribe(&job_id)
            .ok_or_else(|| ApiErr::not_found("Job not found"))?
    };

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => Some(Ok(event.to_sse_event().ok()?)),
        Err(_) => None, // lagged, skip
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}
