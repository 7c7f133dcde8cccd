use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rstar::{RTree, RTreeObject, AABB};
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::{haversine_m, GeoPoint};
use crate::models::update::{TrackingStatus, TrackingUpdate};

// Meters per degree of latitude; used to size the R-tree search envelope.
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Result of an append: either a freshly stored update or the original
/// entry for an already-seen `clientUpdateId`.
pub enum Appended {
    Fresh(Arc<TrackingUpdate>),
    Duplicate(Arc<TrackingUpdate>),
}

impl Appended {
    pub fn update(&self) -> &Arc<TrackingUpdate> {
        match self {
            Appended::Fresh(update) | Appended::Duplicate(update) => update,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Appended::Duplicate(_))
    }
}

struct SpatialEntry {
    position: [f64; 2],
    update: Arc<TrackingUpdate>,
}

impl RTreeObject for SpatialEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

/// Append-only audit log of tracking updates. Entries are immutable;
/// secondary indexes cover the lookups the portal and dashboards need:
/// tracking number, order, driver + time range, status, and proximity.
pub struct TrackingStore {
    by_tracking: DashMap<String, Vec<Arc<TrackingUpdate>>>,
    by_order: DashMap<u64, Vec<Arc<TrackingUpdate>>>,
    by_status: DashMap<TrackingStatus, Vec<Arc<TrackingUpdate>>>,
    by_driver: RwLock<BTreeMap<(u64, DateTime<Utc>, Uuid), Arc<TrackingUpdate>>>,
    spatial: RwLock<RTree<SpatialEntry>>,
    dedup: DashMap<Uuid, Arc<TrackingUpdate>>,
    total: AtomicUsize,
}

impl Default for TrackingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackingStore {
    pub fn new() -> Self {
        Self {
            by_tracking: DashMap::new(),
            by_order: DashMap::new(),
            by_status: DashMap::new(),
            by_driver: RwLock::new(BTreeMap::new()),
            spatial: RwLock::new(RTree::new()),
            dedup: DashMap::new(),
            total: AtomicUsize::new(0),
        }
    }

    /// Appends an update to the log. Never rejects data; only a
    /// storage-layer failure would surface, as `AppError::Persistence`.
    /// When `client_update_id` was already appended the original stored
    /// entry is returned instead of creating a duplicate.
    pub fn append(
        &self,
        update: TrackingUpdate,
        client_update_id: Option<Uuid>,
    ) -> Result<Appended, AppError> {
        if let Some(client_id) = client_update_id {
            match self.dedup.entry(client_id) {
                dashmap::mapref::entry::Entry::Occupied(existing) => {
                    return Ok(Appended::Duplicate(existing.get().clone()));
                }
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    let stored = self.insert(update);
                    slot.insert(stored.clone());
                    return Ok(Appended::Fresh(stored));
                }
            }
        }

        Ok(Appended::Fresh(self.insert(update)))
    }

    fn insert(&self, update: TrackingUpdate) -> Arc<TrackingUpdate> {
        let stored = Arc::new(update);

        self.by_tracking
            .entry(stored.tracking_number.clone())
            .or_default()
            .push(stored.clone());
        self.by_order
            .entry(stored.order_id)
            .or_default()
            .push(stored.clone());
        self.by_status
            .entry(stored.status)
            .or_default()
            .push(stored.clone());

        if let Some(driver_id) = stored.driver_id {
            let mut by_driver = self.by_driver.write().unwrap_or_else(|e| e.into_inner());
            by_driver.insert((driver_id, stored.timestamp, stored.id), stored.clone());
        }

        if let Some(point) = stored.point() {
            let mut spatial = self.spatial.write().unwrap_or_else(|e| e.into_inner());
            spatial.insert(SpatialEntry {
                position: [point.longitude, point.latitude],
                update: stored.clone(),
            });
        }

        self.total.fetch_add(1, Ordering::Relaxed);
        stored
    }

    /// Full history for a tracking number, sorted by timestamp, newest
    /// last. The result is independent of submission order.
    pub fn query_by_tracking_number(&self, tracking_number: &str) -> Vec<Arc<TrackingUpdate>> {
        let mut updates = self
            .by_tracking
            .get(tracking_number)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        updates.sort_by_key(|u| (u.timestamp, u.id));
        updates
    }

    pub fn query_by_order(&self, order_id: u64) -> Vec<Arc<TrackingUpdate>> {
        let mut updates = self
            .by_order
            .get(&order_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        updates.sort_by_key(|u| (u.timestamp, u.id));
        updates
    }

    pub fn query_by_status(&self, status: TrackingStatus) -> Vec<Arc<TrackingUpdate>> {
        let mut updates = self
            .by_status
            .get(&status)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        updates.sort_by_key(|u| (u.timestamp, u.id));
        updates
    }

    /// Driver route reconstruction over a time window, oldest first.
    pub fn query_by_driver_range(
        &self,
        driver_id: u64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<Arc<TrackingUpdate>> {
        let by_driver = self.by_driver.read().unwrap_or_else(|e| e.into_inner());
        by_driver
            .range((driver_id, start, Uuid::nil())..=(driver_id, end, Uuid::max()))
            .map(|(_, update)| update.clone())
            .collect()
    }

    /// Proximity lookup: R-tree envelope pre-filter, then exact
    /// haversine distance. Updates without coordinates are never indexed.
    pub fn query_near(&self, center: &GeoPoint, radius_meters: f64) -> Vec<Arc<TrackingUpdate>> {
        let delta_lat = radius_meters / METERS_PER_DEGREE;
        let cos_lat = center.latitude.to_radians().cos().abs().max(0.01);
        let delta_lng = radius_meters / (METERS_PER_DEGREE * cos_lat);

        let envelope = AABB::from_corners(
            [center.longitude - delta_lng, center.latitude - delta_lat],
            [center.longitude + delta_lng, center.latitude + delta_lat],
        );

        let spatial = self.spatial.read().unwrap_or_else(|e| e.into_inner());
        spatial
            .locate_in_envelope_intersecting(&envelope)
            .filter(|entry| {
                entry
                    .update
                    .point()
                    .map(|point| haversine_m(center, &point) <= radius_meters)
                    .unwrap_or(false)
            })
            .map(|entry| entry.update.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::TrackingStore;
    use crate::geo::{GeoJsonPoint, GeoPoint};
    use crate::models::update::{TrackingStatus, TrackingUpdate};

    fn update(
        order_id: u64,
        tracking_number: &str,
        status: TrackingStatus,
        ts_secs: i64,
        point: Option<GeoPoint>,
        driver_id: Option<u64>,
    ) -> TrackingUpdate {
        TrackingUpdate {
            id: Uuid::new_v4(),
            order_id,
            tracking_number: tracking_number.to_string(),
            latitude: point.map(|p| p.latitude),
            longitude: point.map(|p| p.longitude),
            location: point.map(|p| GeoJsonPoint::from_point(&p)),
            location_description: None,
            status,
            notes: None,
            timestamp: Utc.timestamp_opt(ts_secs, 0).unwrap(),
            driver_id,
            driver_name: None,
            speed: None,
            heading: None,
            accuracy: None,
        }
    }

    #[test]
    fn history_is_sorted_regardless_of_append_order() {
        let store = TrackingStore::new();
        store
            .append(update(1, "TRK-1", TrackingStatus::InTransit, 300, None, None), None)
            .unwrap();
        store
            .append(update(1, "TRK-1", TrackingStatus::Pending, 100, None, None), None)
            .unwrap();
        store
            .append(update(1, "TRK-1", TrackingStatus::Confirmed, 200, None, None), None)
            .unwrap();

        let history = store.query_by_tracking_number("TRK-1");
        let timestamps: Vec<i64> = history.iter().map(|u| u.timestamp.timestamp()).collect();
        assert_eq!(timestamps, vec![100, 200, 300]);
    }

    #[test]
    fn duplicate_client_id_returns_original_entry() {
        let store = TrackingStore::new();
        let client_id = Uuid::new_v4();

        let first = store
            .append(
                update(1, "TRK-1", TrackingStatus::Pending, 100, None, None),
                Some(client_id),
            )
            .unwrap();
        assert!(!first.is_duplicate());

        let second = store
            .append(
                update(1, "TRK-1", TrackingStatus::Pending, 100, None, None),
                Some(client_id),
            )
            .unwrap();
        assert!(second.is_duplicate());
        assert_eq!(second.update().id, first.update().id);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn near_query_filters_by_radius() {
        let store = TrackingStore::new();
        let hamburg = GeoPoint {
            latitude: 53.5511,
            longitude: 9.9937,
        };
        let nearby = GeoPoint {
            latitude: 53.5520,
            longitude: 9.9950,
        };
        let berlin = GeoPoint {
            latitude: 52.52,
            longitude: 13.405,
        };

        store
            .append(
                update(1, "TRK-1", TrackingStatus::InTransit, 100, Some(nearby), None),
                None,
            )
            .unwrap();
        store
            .append(
                update(2, "TRK-2", TrackingStatus::InTransit, 100, Some(berlin), None),
                None,
            )
            .unwrap();
        store
            .append(update(3, "TRK-3", TrackingStatus::Pending, 100, None, None), None)
            .unwrap();

        let hits = store.query_near(&hamburg, 500.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].tracking_number, "TRK-1");
    }

    #[test]
    fn driver_range_respects_time_window() {
        let store = TrackingStore::new();
        for ts in [100, 200, 300, 400] {
            store
                .append(
                    update(1, "TRK-1", TrackingStatus::InTransit, ts, None, Some(42)),
                    None,
                )
                .unwrap();
        }
        store
            .append(
                update(2, "TRK-2", TrackingStatus::InTransit, 250, None, Some(7)),
                None,
            )
            .unwrap();

        let route = store.query_by_driver_range(
            42,
            Utc.timestamp_opt(150, 0).unwrap(),
            Utc.timestamp_opt(350, 0).unwrap(),
        );
        let timestamps: Vec<i64> = route.iter().map(|u| u.timestamp.timestamp()).collect();
        assert_eq!(timestamps, vec![200, 300]);
    }

    #[test]
    fn status_index_tracks_appends() {
        let store = TrackingStore::new();
        store
            .append(update(1, "TRK-1", TrackingStatus::Pending, 100, None, None), None)
            .unwrap();
        store
            .append(update(2, "TRK-2", TrackingStatus::InTransit, 200, None, None), None)
            .unwrap();
        store
            .append(update(3, "TRK-3", TrackingStatus::InTransit, 150, None, None), None)
            .unwrap();

        let in_transit = store.query_by_status(TrackingStatus::InTransit);
        assert_eq!(in_transit.len(), 2);
        assert_eq!(in_transit[0].tracking_number, "TRK-3");
        assert_eq!(in_transit[1].tracking_number, "TRK-2");
    }
}
