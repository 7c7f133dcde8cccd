use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::geo::GeoPoint;
use crate::models::session::DeliverySession;
use crate::models::update::TrackingStatus;

/// Maps each order to its delivery session and owns the per-order lock
/// table that serializes ingestion: the validate-append-mutate sequence
/// runs under `lock_for(order_id)`, so no two concurrent submissions
/// mutate the same session while different orders proceed in parallel.
/// Sessions are never removed; terminal ones stay behind, inactive.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<u64, DeliverySession>,
    locks: DashMap<u64, Arc<Mutex<()>>>,
}

pub struct SessionMutation {
    pub status: TrackingStatus,
    pub timestamp: DateTime<Utc>,
    pub location: Option<GeoPoint>,
    pub driver_id: Option<u64>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, order_id: u64) -> Arc<Mutex<()>> {
        self.locks
            .entry(order_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub fn get(&self, order_id: u64) -> Option<DeliverySession> {
        self.sessions.get(&order_id).map(|entry| entry.value().clone())
    }

    pub fn get_active(&self, order_id: u64) -> Option<DeliverySession> {
        self.sessions
            .get(&order_id)
            .filter(|entry| entry.active)
            .map(|entry| entry.value().clone())
    }

    /// Active sessions currently worked by a driver, for fleet views.
    pub fn get_by_driver(&self, driver_id: u64) -> Vec<DeliverySession> {
        self.sessions
            .iter()
            .filter(|entry| entry.active && entry.driver_id == Some(driver_id))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Creates the session on the order's first accepted update, then
    /// applies the mutation. Callers must hold the order's lock.
    pub fn upsert(&self, order_id: u64, mutation: SessionMutation) -> DeliverySession {
        let mut entry = self
            .sessions
            .entry(order_id)
            .or_insert_with(|| DeliverySession::open(order_id, mutation.status, mutation.timestamp));

        entry.current_status = mutation.status;
        entry.last_update_timestamp = mutation.timestamp;
        if mutation.location.is_some() {
            entry.last_location = mutation.location;
        }
        if mutation.driver_id.is_some() {
            entry.driver_id = mutation.driver_id;
        }
        if mutation.status.is_terminal() {
            entry.active = false;
        }

        entry.value().clone()
    }

    /// Records a session for an order whose first update was rejected as
    /// a current-state change, so `track()` still has a current view.
    pub fn open_if_absent(
        &self,
        order_id: u64,
        status: TrackingStatus,
        timestamp: DateTime<Utc>,
    ) -> DeliverySession {
        self.sessions
            .entry(order_id)
            .or_insert_with(|| DeliverySession::open(order_id, status, timestamp))
            .value()
            .clone()
    }

    pub fn active_count(&self) -> usize {
        self.sessions.iter().filter(|entry| entry.active).count()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{SessionMutation, SessionRegistry};
    use crate::geo::GeoPoint;
    use crate::models::update::TrackingStatus;

    fn mutation(status: TrackingStatus, ts_secs: i64, driver_id: Option<u64>) -> SessionMutation {
        SessionMutation {
            status,
            timestamp: Utc.timestamp_opt(ts_secs, 0).unwrap(),
            location: Some(GeoPoint {
                latitude: 53.55,
                longitude: 9.99,
            }),
            driver_id,
        }
    }

    #[test]
    fn upsert_creates_then_mutates_a_single_session() {
        let registry = SessionRegistry::new();

        let created = registry.upsert(1, mutation(TrackingStatus::Pending, 100, None));
        assert!(created.active);
        assert_eq!(created.current_status, TrackingStatus::Pending);

        let updated = registry.upsert(1, mutation(TrackingStatus::InTransit, 200, Some(42)));
        assert_eq!(updated.session_id, created.session_id);
        assert_eq!(updated.current_status, TrackingStatus::InTransit);
        assert_eq!(updated.driver_id, Some(42));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn terminal_status_deactivates_but_retains_the_session() {
        let registry = SessionRegistry::new();
        registry.upsert(1, mutation(TrackingStatus::InTransit, 100, Some(42)));
        registry.upsert(1, mutation(TrackingStatus::Delivered, 200, Some(42)));

        assert!(registry.get_active(1).is_none());
        let retained = registry.get(1).unwrap();
        assert!(!retained.active);
        assert_eq!(retained.current_status, TrackingStatus::Delivered);
    }

    #[test]
    fn driver_id_is_not_cleared_by_driverless_updates() {
        let registry = SessionRegistry::new();
        registry.upsert(1, mutation(TrackingStatus::InTransit, 100, Some(42)));
        registry.upsert(1, mutation(TrackingStatus::OutForDelivery, 200, None));

        assert_eq!(registry.get(1).unwrap().driver_id, Some(42));
    }

    #[test]
    fn get_by_driver_lists_only_active_sessions() {
        let registry = SessionRegistry::new();
        registry.upsert(1, mutation(TrackingStatus::InTransit, 100, Some(42)));
        registry.upsert(2, mutation(TrackingStatus::OutForDelivery, 100, Some(42)));
        registry.upsert(3, mutation(TrackingStatus::InTransit, 100, Some(7)));
        registry.upsert(2, mutation(TrackingStatus::Delivered, 200, Some(42)));

        let active = registry.get_by_driver(42);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].order_id, 1);
        assert_eq!(registry.active_count(), 2);
    }
}
