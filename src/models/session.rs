use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::models::update::TrackingStatus;

/// Derived "current state" view for one order's shipment. At most one
/// active session per order; a terminal status marks it inactive.
/// Sessions are never deleted, only deactivated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverySession {
    pub order_id: u64,
    pub session_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub driver_id: Option<u64>,
    pub current_status: TrackingStatus,
    pub last_update_timestamp: DateTime<Utc>,
    pub last_location: Option<GeoPoint>,
    pub active: bool,
}

impl DeliverySession {
    pub fn open(order_id: u64, status: TrackingStatus, timestamp: DateTime<Utc>) -> Self {
        Self {
            order_id,
            session_id: Uuid::new_v4(),
            start_time: timestamp,
            driver_id: None,
            current_status: status,
            last_update_timestamp: timestamp,
            last_location: None,
            active: !status.is_terminal(),
        }
    }
}
