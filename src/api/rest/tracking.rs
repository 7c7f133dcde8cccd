use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::engine::ingest;
use crate::error::AppError;
use crate::geo::{validate_coordinates, GeoPoint};
use crate::models::session::DeliverySession;
use crate::models::update::{SubmitOutcome, TrackingStatus, TrackingUpdate, TrackingUpdateInput};
use crate::query::{track, TrackingView};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tracking-updates", post(submit_update))
        .route("/api/tracking/near", get(query_near))
        .route("/api/tracking/status/:status", get(updates_by_status))
        .route("/api/tracking/order/:order_id", get(order_history))
        .route("/api/tracking/driver/:driver_id/route", get(driver_route))
        .route("/api/tracking/:tracking_number", get(current_tracking))
        .route("/api/tracking/:tracking_number/history", get(tracking_history))
        .route("/api/sessions/driver/:driver_id", get(sessions_by_driver))
}

/// Lifecycle rejections are not transport errors: the update is stored
/// and the response carries `applied: false` with the rejection reason,
/// so late-arriving telemetry does not look like a failure to the device.
async fn submit_update(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TrackingUpdateInput>,
) -> Result<Json<SubmitOutcome>, AppError> {
    let outcome = ingest::submit(&state, payload).await?;
    Ok(Json(outcome))
}

async fn current_tracking(
    State(state): State<Arc<AppState>>,
    Path(tracking_number): Path<String>,
) -> Result<Json<TrackingView>, AppError> {
    Ok(Json(track(&state, &tracking_number)?))
}

async fn tracking_history(
    State(state): State<Arc<AppState>>,
    Path(tracking_number): Path<String>,
) -> Result<Json<Vec<TrackingUpdate>>, AppError> {
    let history = state.store.query_by_tracking_number(&tracking_number);
    if history.is_empty() {
        return Err(AppError::NotFound(
            "Tracking information not found".to_string(),
        ));
    }

    Ok(Json(history.iter().map(|u| (**u).clone()).collect()))
}

async fn order_history(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<u64>,
) -> Result<Json<Vec<TrackingUpdate>>, AppError> {
    if !state.orders.exists(order_id) {
        return Err(AppError::UnknownOrder(order_id));
    }

    let history = state.store.query_by_order(order_id);
    Ok(Json(history.iter().map(|u| (**u).clone()).collect()))
}

#[derive(Deserialize)]
struct RouteWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

async fn driver_route(
    State(state): State<Arc<AppState>>,
    Path(driver_id): Path<u64>,
    Query(window): Query<RouteWindow>,
) -> Result<Json<Vec<TrackingUpdate>>, AppError> {
    if window.end < window.start {
        return Err(AppError::Validation(
            "route window end precedes start".to_string(),
        ));
    }

    let route = state
        .store
        .query_by_driver_range(driver_id, window.start, window.end);
    Ok(Json(route.iter().map(|u| (**u).clone()).collect()))
}

async fn updates_by_status(
    State(state): State<Arc<AppState>>,
    Path(status): Path<String>,
) -> Result<Json<Vec<TrackingUpdate>>, AppError> {
    let status: TrackingStatus = serde_json::from_value(serde_json::Value::String(status))
        .map_err(|_| AppError::Validation("unrecognized tracking status".to_string()))?;

    let updates = state.store.query_by_status(status);
    Ok(Json(updates.iter().map(|u| (**u).clone()).collect()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NearQuery {
    latitude: f64,
    longitude: f64,
    radius_meters: f64,
}

async fn query_near(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NearQuery>,
) -> Result<Json<Vec<TrackingUpdate>>, AppError> {
    let center = GeoPoint {
        latitude: params.latitude,
        longitude: params.longitude,
    };
    validate_coordinates(&center)?;

    if !params.radius_meters.is_finite() || params.radius_meters <= 0.0 {
        return Err(AppError::Validation(
            "radiusMeters must be positive".to_string(),
        ));
    }

    let hits = state.store.query_near(&center, params.radius_meters);
    Ok(Json(hits.iter().map(|u| (**u).clone()).collect()))
}

async fn sessions_by_driver(
    State(state): State<Arc<AppState>>,
    Path(driver_id): Path<u64>,
) -> Json<Vec<DeliverySession>> {
    Json(state.registry.get_by_driver(driver_id))
}
