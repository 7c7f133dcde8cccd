use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::update::{TrackingStatus, TrackingUpdate};
use crate::state::AppState;

/// "Where is my package" view: current state from the session registry
/// plus a bounded recent history window from the audit log.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingView {
    pub tracking_number: String,
    pub status: TrackingStatus,
    pub current_location: Option<GeoPoint>,
    pub location_description: Option<String>,
    pub driver_name: Option<String>,
    /// Always null: ETA computation is out of scope, the field exists
    /// for portal client compatibility.
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub last_update: DateTime<Utc>,
    pub history: Vec<TrackingUpdate>,
}

/// A tracking number with no updates at all is `NotFound`; an order
/// that exists but has not reported a position yet yields a view with a
/// null `currentLocation` instead.
pub fn track(state: &AppState, tracking_number: &str) -> Result<TrackingView, AppError> {
    let updates = state.store.query_by_tracking_number(tracking_number);

    let latest = updates
        .last()
        .ok_or_else(|| AppError::NotFound("Tracking information not found".to_string()))?
        .clone();

    // A reused tracking number resolves to the most recent order.
    let session = state.registry.get(latest.order_id);

    let (status, current_location, last_update) = match &session {
        Some(session) => (
            session.current_status,
            session.last_location,
            session.last_update_timestamp,
        ),
        None => (latest.status, latest.point(), latest.timestamp),
    };

    let window_start = updates.len().saturating_sub(state.history_window);
    let history = updates[window_start..]
        .iter()
        .map(|update| (**update).clone())
        .collect();

    Ok(TrackingView {
        tracking_number: tracking_number.to_string(),
        status,
        current_location,
        location_description: latest.location_description.clone(),
        driver_name: latest.driver_name.clone(),
        estimated_delivery: None,
        last_update,
        history,
    })
}
