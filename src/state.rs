use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::models::event::TrackingEvent;
use crate::models::order::OrderDirectory;
use crate::observability::metrics::Metrics;
use crate::registry::SessionRegistry;
use crate::store::TrackingStore;

pub struct AppState {
    pub orders: OrderDirectory,
    pub store: TrackingStore,
    pub registry: SessionRegistry,
    pub events_tx: broadcast::Sender<TrackingEvent>,
    pub metrics: Metrics,
    pub history_window: usize,
    pub persist_max_attempts: u32,
    pub persist_backoff: Duration,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        Self {
            orders: OrderDirectory::new(),
            store: TrackingStore::new(),
            registry: SessionRegistry::new(),
            events_tx,
            metrics: Metrics::new(),
            history_window: config.history_window,
            persist_max_attempts: config.persist_max_attempts,
            persist_backoff: config.persist_backoff,
        }
    }
}
