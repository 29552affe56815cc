use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use common::detections::{
    DetectionBatch, DetectionEvent, DetectorStatus, IngestAck, OccupancySnapshot,
};

use crate::ingest::IngestHandler;
use crate::store::ParkingStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ParkingStore>,
    pub handler: Arc<IngestHandler>,
}

impl AppState {
    pub fn new(store: Arc<dyn ParkingStore>) -> Self {
        let handler = Arc::new(IngestHandler::new(store.clone()));
        Self { store, handler }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health checks
        .route("/health", axum::routing::get(health_check))
        .route("/readyz", axum::routing::get(ready_check))
        .route("/metrics", axum::routing::get(metrics))
        // Detection ingestion
        .route("/v1/detections", axum::routing::post(ingest_detection))
        .route("/v1/detections/batch", axum::routing::post(ingest_batch))
        // Detector heartbeat
        .route("/v1/status", axum::routing::post(detector_status))
        // Occupancy
        .route("/v1/occupancy", axum::routing::get(get_occupancy))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "ingest-service"
    }))
}

async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(true) => (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "store": "connected"
            })),
        )
            .into_response(),
        _ => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not ready",
                "store": "disconnected"
            })),
        )
            .into_response(),
    }
}

async fn ingest_detection(
    State(state): State<AppState>,
    Json(event): Json<DetectionEvent>,
) -> impl IntoResponse {
    match state.handler.ingest_single(&event).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(IngestAck {
                status: "success".to_string(),
                applied: outcome.applied,
                skipped: outcome.skipped,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to ingest detection: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}

async fn ingest_batch(
    State(state): State<AppState>,
    Json(batch): Json<DetectionBatch>,
) -> impl IntoResponse {
    match state.handler.ingest_batch(&batch).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(IngestAck {
                status: "success".to_string(),
                applied: outcome.applied,
                skipped: outcome.skipped,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to ingest detection batch: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}

async fn detector_status(Json(status): Json<DetectorStatus>) -> impl IntoResponse {
    info!(
        fps = status.fps,
        running = status.running,
        "detector status"
    );
    Json(json!({"status": "ok"}))
}

async fn get_occupancy(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.latest_occupancy().await {
        Ok(Some(occupancy)) => Json(OccupancySnapshot {
            total_spaces: occupancy.total_spaces,
            occupied_spaces: occupancy.occupied_spaces,
            last_updated: occupancy.last_updated,
        })
        .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "no occupancy recorded yet"})),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to read occupancy: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}

async fn metrics() -> impl IntoResponse {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = telemetry::metrics::REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response();
    }

    match String::from_utf8(buffer) {
        Ok(s) => s.into_response(),
        Err(e) => {
            tracing::error!("Failed to convert metrics to UTF-8: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to convert metrics",
            )
                .into_response()
        }
    }
}
