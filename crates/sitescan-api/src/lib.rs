//! # SiteScan API
//!
//! The outward face of the audit engine: submit a seed URL, poll for the
//! finished report, cancel a running audit. Reports flow through an opaque
//! persistence port; the bundled store is in-memory.

pub mod errors;
pub mod handlers;
pub mod models;
pub mod persistence;
pub mod runner;
pub mod state;
pub mod validation;

use axum::routing::{get, post};
use axum::Router;
use state::AppState;
use tower_http::trace::TraceLayer;

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/audits", post(handlers::submit_audit).get(handlers::list_audits))
        .route("/audits/:id", get(handlers::poll_audit))
        .route("/audits/:id/cancel", post(handlers::cancel_audit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
