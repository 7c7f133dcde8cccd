use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::{GeoJsonPoint, GeoPoint};
use crate::models::session::DeliverySession;

/// Shipment lifecycle states, linearly ordered up to `Delivered`.
/// `Cancelled` is a side exit reachable from any non-terminal state.
/// Wire form is SCREAMING_SNAKE_CASE for compatibility with stored data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackingStatus {
    Pending,
    Confirmed,
    InTransit,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl TrackingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrackingStatus::Delivered | TrackingStatus::Cancelled)
    }
}

/// One reported observation of a shipment, immutable once stored.
/// Corrections are modeled as new updates, never in-place edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingUpdate {
    pub id: Uuid,
    pub order_id: u64,
    pub tracking_number: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Derived GeoJSON mirror of the flat pair, kept for spatial indexing.
    pub location: Option<GeoJsonPoint>,
    pub location_description: Option<String>,
    pub status: TrackingStatus,
    pub notes: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub driver_id: Option<u64>,
    pub driver_name: Option<String>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub accuracy: Option<f64>,
}

impl TrackingUpdate {
    pub fn point(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }
}

/// Raw submission body from a driver device.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingUpdateInput {
    /// Deduplication key for idempotent retries. Without it, duplicate
    /// retries may create duplicate audit entries.
    pub client_update_id: Option<Uuid>,
    pub order_id: u64,
    pub tracking_number: String,
    pub location: Option<GeoPoint>,
    pub location_description: Option<String>,
    pub status: TrackingStatus,
    pub notes: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub driver_id: Option<u64>,
    pub driver_name: Option<String>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub accuracy: Option<f64>,
}

/// Why an otherwise well-formed update was not applied to the session's
/// current state. The update still lands in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectionReason {
    /// Lifecycle rank would regress.
    InvalidTransition,
    /// Current status is terminal; no further transitions.
    TerminalState,
    /// Timestamp precedes the session's last accepted update.
    StaleTimestamp,
}

/// Result of a submission: the stored update plus whether it mutated
/// the delivery session's current state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub update: TrackingUpdate,
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<RejectionReason>,
    pub session: DeliverySession,
}
