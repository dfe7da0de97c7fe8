//! rightsize-api — REST API for rightsize.
//!
//! Axum route handlers for declaring scalers, inspecting their status,
//! and forcing or resetting reconciliation, plus the Prometheus scrape
//! endpoint.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/scalers` | List all scalers |
//! | POST | `/api/v1/scalers` | Create or update a scaler |
//! | GET | `/api/v1/scalers/{id}` | Get a scaler record |
//! | DELETE | `/api/v1/scalers/{id}` | Delete a scaler |
//! | GET | `/api/v1/scalers/{id}/status` | Status view |
//! | POST | `/api/v1/scalers/{id}/reconcile` | Run one tick now |
//! | POST | `/api/v1/scalers/{id}/reset` | Clear an `Error` state |
//! | GET | `/metrics` | Prometheus exposition |
//!
//! `{id}` is the URL-encoded `namespace/name` key, e.g. `default%2Forders`.

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use rightsize_controller::Reconciler;
use rightsize_metrics::GaugeRegistry;
use rightsize_state::StateStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
    pub gauges: GaugeRegistry,
    pub reconciler: Arc<Reconciler>,
}

/// Build the complete API router (REST + metrics).
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/scalers", get(handlers::list_scalers).post(handlers::upsert_scaler))
        .route("/scalers/{id}", get(handlers::get_scaler).delete(handlers::delete_scaler))
        .route("/scalers/{id}/status", get(handlers::get_status))
        .route("/scalers/{id}/reconcile", post(handlers::reconcile_scaler))
        .route("/scalers/{id}/reset", post(handlers::reset_scaler))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::prometheus_metrics).with_state(state))
}
