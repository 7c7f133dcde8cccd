use serde::Serialize;

use crate::models::session::DeliverySession;
use crate::models::update::{RejectionReason, TrackingUpdate};

/// Live feed payload pushed to WebSocket subscribers. Every stored
/// update emits `Updated`; sessions reaching a terminal status also
/// emit `SessionClosed` for downstream notification.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum TrackingEvent {
    #[serde(rename_all = "camelCase")]
    Updated {
        update: TrackingUpdate,
        applied: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        rejection: Option<RejectionReason>,
    },
    #[serde(rename_all = "camelCase")]
    SessionClosed { session: DeliverySession },
}
