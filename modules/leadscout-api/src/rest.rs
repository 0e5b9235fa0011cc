use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use leadscout_common::{Criteria, JobStatus};

use crate::export::leads_to_csv;
use crate::AppState;

#[derive(Deserialize)]
pub struct ScrapeRequest {
    pub service: String,
    pub industry: String,
    pub location: String,
    pub agents: Vec<String>,
}

/// POST /scrape - validate and schedule a job, reply 202 with its id.
pub async fn submit_job(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScrapeRequest>,
) -> impl IntoResponse {
    let criteria = Criteria::new(request.service, request.industry, request.location);

    match state.orchestrator.submit(criteria, &request.agents).await {
        Ok(job_id) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "job_id": job_id })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// GET /status/{job_id} - full snapshot of a job, leads and log included.
pub async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.orchestrator.snapshot(job_id).await {
        Some(job) => Json(job).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "job not found" })),
        )
            .into_response(),
    }
}

/// GET /results/{job_id} - leads only, once the job is done.
pub async fn job_results(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.orchestrator.snapshot(job_id).await {
        Some(job) if job.status == JobStatus::Completed => Json(serde_json::json!({
            "job_id": job_id,
            "leads": job.leads,
        }))
        .into_response(),
        Some(_) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "job not completed yet" })),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "job not found" })),
        )
            .into_response(),
    }
}

/// GET /export_csv - every stored lead as a CSV attachment.
pub async fn export_csv(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let leads = match state.orchestrator.export_all_leads().await {
        Ok(leads) => leads,
        Err(e) => {
            warn!(error = %e, "Failed to load leads for export");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if leads.is_empty() {
        return StatusCode::NO_CONTENT.into_response();
    }

    let body = leads_to_csv(&leads);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=leads.csv",
            ),
        ],
        body,
    )
        .into_response()
}
