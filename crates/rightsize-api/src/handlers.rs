//! REST API handlers.
//!
//! Spec writes go straight to `StateStore`; anything that touches status
//! goes through the reconciler's per-key lock.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::info;

use rightsize_controller::TickOutcome;
use rightsize_core::config::ScalerEntry;
use rightsize_state::StateError;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn internal(e: impl std::fmt::Display) -> axum::response::Response {
    error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
}

fn not_found() -> axum::response::Response {
    error_response("scaler not found", StatusCode::NOT_FOUND).into_response()
}

// ── Scalers ────────────────────────────────────────────────────

/// GET /api/v1/scalers
pub async fn list_scalers(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_scalers() {
        Ok(records) => ApiResponse::ok(records).into_response(),
        Err(e) => internal(e),
    }
}

/// POST /api/v1/scalers
///
/// Creates the record, or replaces the spec of an existing one while
/// keeping its status.
pub async fn upsert_scaler(
    State(state): State<ApiState>,
    Json(entry): Json<ScalerEntry>,
) -> impl IntoResponse {
    if entry.namespace.is_empty() || entry.name.is_empty() {
        return error_response("namespace and name must not be empty", StatusCode::BAD_REQUEST)
            .into_response();
    }
    if entry.namespace.contains('/') || entry.name.contains('/') {
        return error_response("namespace and name must not contain '/'", StatusCode::BAD_REQUEST)
            .into_response();
    }
    if let Err(e) = entry.spec.validate() {
        return error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response();
    }

    let key = entry.to_record().table_key();
    let existing = match state.store.get_scaler(&key) {
        Ok(existing) => existing,
        Err(e) => return internal(e),
    };
    let existed = existing.is_some();

    match state.store.put_scaler(&entry.to_record()) {
        Ok(stored) => {
            // A retargeted scaler must not keep exporting its old series.
            let retargeted = existing.as_ref().is_some_and(|old| {
                old.spec.function_id != stored.spec.function_id
                    || old.spec.queue_id != stored.spec.queue_id
            });
            if retargeted {
                state.gauges.forget(&stored.namespace, &stored.name);
            }
            info!(%key, existed, "scaler declared");
            let status = if existed {
                StatusCode::OK
            } else {
                StatusCode::CREATED
            };
            (status, ApiResponse::ok(stored)).into_response()
        }
        Err(e) => internal(e),
    }
}

/// GET /api/v1/scalers/{id}
pub async fn get_scaler(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_scaler(&id) {
        Ok(Some(record)) => ApiResponse::ok(record).into_response(),
        Ok(None) => not_found(),
        Err(e) => internal(e),
    }
}

/// DELETE /api/v1/scalers/{id}
///
/// The record's loop notices the deletion on its next tick and stops.
pub async fn delete_scaler(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let _guard = state.reconciler.lock(&id).await;
    match state.store.delete_scaler(&id) {
        Ok(true) => {
            if let Some((namespace, name)) = id.split_once('/') {
                state.gauges.forget(namespace, name);
            }
            info!(key = %id, "scaler deleted");
            ApiResponse::ok("deleted").into_response()
        }
        Ok(false) => not_found(),
        Err(e) => internal(e),
    }
}

/// GET /api/v1/scalers/{id}/status
pub async fn get_status(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_scaler(&id) {
        Ok(Some(record)) => ApiResponse::ok(record.status_view()).into_response(),
        Ok(None) => not_found(),
        Err(e) => internal(e),
    }
}

// ── Control ────────────────────────────────────────────────────

/// POST /api/v1/scalers/{id}/reconcile
///
/// Runs one tick now. The gate still applies, so this is a no-op inside
/// the cooldown or while the record is in `Error`.
pub async fn reconcile_scaler(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let report = state.reconciler.reconcile(&id).await;
    match report.outcome {
        TickOutcome::Missing => not_found(),
        _ => ApiResponse::ok(report.summary()).into_response(),
    }
}

/// POST /api/v1/scalers/{id}/reset
///
/// Moves the record back to `Pending`, keeping concurrency and the last
/// adjustment time. This is the only way out of `Error`.
pub async fn reset_scaler(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let _guard = state.reconciler.lock(&id).await;
    match state.store.reset_status(&id) {
        Ok(record) => {
            info!(key = %id, "scaler reset to Pending");
            ApiResponse::ok(record.status_view()).into_response()
        }
        Err(StateError::NotFound(_)) => not_found(),
        Err(e) => internal(e),
    }
}

// ── Prometheus ─────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let body = rightsize_metrics::render_prometheus(&state.gauges);
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rightsize_controller::{Collaborators, ReconcileSettings, Reconciler};
    use rightsize_core::{GaugeLabels, GaugeSink, ScalerSpec, ScalerState};
    use rightsize_metrics::GaugeRegistry;
    use rightsize_platform::InMemoryPlatform;
    use rightsize_state::StateStore;

    async fn test_state() -> ApiState {
        let store = StateStore::open_in_memory().unwrap();
        let gauges = GaugeRegistry::new();
        let platform = InMemoryPlatform::new();
        platform
            .put_function("thumbnailer", Some(2), &["arn:aws:sqs:us-east-1:1:uploads"])
            .await;
        platform.set_datapoints("uploads", vec![120.0, 80.0]).await;

        let collab = Collaborators {
            store: Arc::new(store.clone()),
            verifier: Arc::new(platform.clone()),
            sampler: Arc::new(platform.clone()),
            applier: Arc::new(platform),
            gauges: Arc::new(gauges.clone()),
        };
        ApiState {
            store,
            gauges,
            reconciler: Arc::new(Reconciler::new(collab, ReconcileSettings::default())),
        }
    }

    fn entry(name: &str) -> ScalerEntry {
        ScalerEntry {
            namespace: "media".to_string(),
            name: name.to_string(),
            spec: ScalerSpec {
                queue_id: "uploads".to_string(),
                backlog_threshold: 50,
                function_id: "thumbnailer".to_string(),
                min_concurrency: 1,
                max_concurrency: 10,
                step_concurrency: 3,
            },
        }
    }

    #[tokio::test]
    async fn list_scalers_empty() {
        let state = test_state().await;
        let resp = list_scalers(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn upsert_creates_then_updates() {
        let state = test_state().await;

        let resp = upsert_scaler(State(state.clone()), Json(entry("thumbs")))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = upsert_scaler(State(state), Json(entry("thumbs")))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn upsert_keeps_status() {
        let state = test_state().await;
        let record = state.store.put_scaler(&entry("thumbs").to_record()).unwrap();
        let mut status = record.status.clone();
        status.state = Some(ScalerState::Adjusted);
        status.concurrency = 7;
        state.store.write_status("media/thumbs", &status).unwrap();

        let mut changed = entry("thumbs");
        changed.spec.max_concurrency = 40;
        upsert_scaler(State(state.clone()), Json(changed)).await;

        let stored = state.store.get_scaler("media/thumbs").unwrap().unwrap();
        assert_eq!(stored.spec.max_concurrency, 40);
        assert_eq!(stored.status.concurrency, 7);
        assert_eq!(stored.status.state, Some(ScalerState::Adjusted));
    }

    #[tokio::test]
    async fn upsert_retarget_drops_old_gauge() {
        let state = test_state().await;
        let record = state.store.put_scaler(&entry("thumbs").to_record()).unwrap();
        state.gauges.set_gauge(GaugeLabels::for_record(&record), 4.0);

        // Same targets: the series stays.
        upsert_scaler(State(state.clone()), Json(entry("thumbs"))).await;
        assert_eq!(state.gauges.len(), 1);

        let mut moved = entry("thumbs");
        moved.spec.function_id = "thumbnailer-v2".to_string();
        upsert_scaler(State(state.clone()), Json(moved)).await;
        assert!(state.gauges.get(&GaugeLabels::for_record(&record)).is_none());
        assert!(state.gauges.is_empty());
    }

    #[tokio::test]
    async fn upsert_rejects_invalid_spec() {
        let state = test_state().await;
        let mut bad = entry("thumbs");
        bad.spec.min_concurrency = 20;

        let resp = upsert_scaler(State(state.clone()), Json(bad))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(state.store.list_scalers().unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_rejects_slash_in_name() {
        let state = test_state().await;
        let resp = upsert_scaler(State(state), Json(entry("a/b")))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_nonexistent_scaler() {
        let state = test_state().await;
        let resp = get_scaler(State(state), Path("media/nope".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_forgets_gauge() {
        let state = test_state().await;
        let record = state.store.put_scaler(&entry("thumbs").to_record()).unwrap();
        state.gauges.set_gauge(GaugeLabels::for_record(&record), 4.0);

        let resp = delete_scaler(State(state.clone()), Path("media/thumbs".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(state.gauges.is_empty());

        let resp = delete_scaler(State(state), Path("media/thumbs".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reconcile_adjusts_and_reports() {
        let state = test_state().await;
        state.store.put_scaler(&entry("thumbs").to_record()).unwrap();

        let resp = reconcile_scaler(State(state.clone()), Path("media/thumbs".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let stored = state.store.get_scaler("media/thumbs").unwrap().unwrap();
        assert_eq!(stored.status.state, Some(ScalerState::Adjusted));
        assert_eq!(stored.status.concurrency, 5);
    }

    #[tokio::test]
    async fn reconcile_unknown_is_not_found() {
        let state = test_state().await;
        let resp = reconcile_scaler(State(state), Path("media/ghost".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reset_clears_error() {
        let state = test_state().await;
        let record = state.store.put_scaler(&entry("thumbs").to_record()).unwrap();
        let mut status = record.status.clone();
        status.state = Some(ScalerState::Error);
        status.concurrency = 4;
        state.store.write_status("media/thumbs", &status).unwrap();

        let resp = reset_scaler(State(state.clone()), Path("media/thumbs".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let stored = state.store.get_scaler("media/thumbs").unwrap().unwrap();
        assert_eq!(stored.status.state, Some(ScalerState::Pending));
        assert_eq!(stored.status.concurrency, 4);
    }

    #[tokio::test]
    async fn reset_unknown_is_not_found() {
        let state = test_state().await;
        let resp = reset_scaler(State(state), Path("media/ghost".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn prometheus_endpoint_returns_text() {
        let state = test_state().await;
        let resp = prometheus_metrics(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.contains("text/plain"));
    }
}
