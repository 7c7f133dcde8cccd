use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;

use crate::error::AppError;
use crate::models::order::KnownOrder;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/orders", post(register_order))
}

/// Inbound replication from the order service: announces a shipment so
/// ingestion can validate `orderId`/`trackingNumber` references.
async fn register_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<KnownOrder>,
) -> Result<Json<KnownOrder>, AppError> {
    if payload.tracking_number.trim().is_empty() {
        return Err(AppError::Validation(
            "trackingNumber must not be empty".to_string(),
        ));
    }

    if !state.orders.register(payload.clone()) {
        return Err(AppError::Conflict(format!(
            "order {} is already registered",
            payload.order_id
        )));
    }

    Ok(Json(payload))
}
