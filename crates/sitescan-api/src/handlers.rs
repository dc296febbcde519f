use crate::errors::ApiError;
use crate::models::{
    status_label, ListAuditsQuery, ListAuditsResponse, PollAuditResponse, SubmitAuditBody,
    SubmitAuditResponse,
};
use crate::persistence::ListFilter;
use crate::runner::spawn_audit;
use crate::state::AppState;
use crate::validation::validate_submit;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use sitescan_types::{AuditReport, AuditStatus};
use tracing::info;
use uuid::Uuid;

pub async fn healthz() -> &'static str {
    "ok"
}

/// Submit an audit. The seed is validated before any fetch; a malformed
/// seed never reaches the crawler.
#[tracing::instrument(skip(state, body), fields(url = %body.url))]
pub async fn submit_audit(
    State(state): State<AppState>,
    Json(body): Json<SubmitAuditBody>,
) -> Result<(StatusCode, Json<SubmitAuditResponse>), ApiError> {
    let (seed, config) = validate_submit(&body)?;

    let audit_id = Uuid::new_v4().to_string();
    let report = AuditReport::queued(&audit_id, seed.as_str());
    state
        .store
        .save(report)
        .await
        .map_err(|e| ApiError::Store {
            message: e.to_string(),
        })?;

    state.register_run(&audit_id);
    spawn_audit(state, audit_id.clone(), seed, config);

    info!(audit_id = %audit_id, "Audit accepted");
    Ok((StatusCode::ACCEPTED, Json(SubmitAuditResponse { audit_id })))
}

/// Poll an audit. The full report rides along only once it is `Completed`.
pub async fn poll_audit(
    State(state): State<AppState>,
    Path(audit_id): Path<String>,
) -> Result<Json<PollAuditResponse>, ApiError> {
    let report = state
        .store
        .load(&audit_id)
        .await
        .map_err(|e| ApiError::Store {
            message: e.to_string(),
        })?
        .ok_or_else(|| ApiError::not_found(&audit_id))?;

    let (status, failure_reason) = status_label(&report.status);
    let completed = report.status == AuditStatus::Completed;
    Ok(Json(PollAuditResponse {
        audit_id,
        status,
        failure_reason,
        report: completed.then_some(report),
    }))
}

/// Cancel an audit. Idempotent: cancelling a finished or already-cancelled
/// run is a no-op success.
pub async fn cancel_audit(
    State(state): State<AppState>,
    Path(audit_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let known = state
        .store
        .load(&audit_id)
        .await
        .map_err(|e| ApiError::Store {
            message: e.to_string(),
        })?
        .is_some();
    if !known {
        return Err(ApiError::not_found(&audit_id));
    }

    if let Some(handle) = state.runs.get(&audit_id) {
        handle.cancel.cancel();
        info!(audit_id = %audit_id, "Cancellation requested");
    }
    Ok(StatusCode::ACCEPTED)
}

pub async fn list_audits(
    State(state): State<AppState>,
    Query(query): Query<ListAuditsQuery>,
) -> Result<Json<ListAuditsResponse>, ApiError> {
    let audit_ids = state
        .store
        .list(ListFilter {
            status: query.status,
        })
        .await
        .map_err(|e| ApiError::Store {
            message: e.to_string(),
        })?;
    Ok(Json(ListAuditsResponse { audit_ids }))
}
