use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// The slice of the external order service this engine needs: enough to
/// answer `orderExists` and resolve an order's tracking number. The
/// order service replicates rows in over `POST /api/orders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnownOrder {
    pub order_id: u64,
    pub tracking_number: String,
}

#[derive(Default)]
pub struct OrderDirectory {
    orders: DashMap<u64, KnownOrder>,
}

impl OrderDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the order id is already registered.
    pub fn register(&self, order: KnownOrder) -> bool {
        match self.orders.entry(order.order_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(order);
                true
            }
        }
    }

    pub fn exists(&self, order_id: u64) -> bool {
        self.orders.contains_key(&order_id)
    }

    pub fn get(&self, order_id: u64) -> Option<KnownOrder> {
        self.orders.get(&order_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{KnownOrder, OrderDirectory};

    #[test]
    fn register_rejects_duplicate_order_id() {
        let directory = OrderDirectory::new();
        assert!(directory.register(KnownOrder {
            order_id: 1,
            tracking_number: "TRK-1001".to_string(),
        }));
        assert!(!directory.register(KnownOrder {
            order_id: 1,
            tracking_number: "TRK-9999".to_string(),
        }));

        let stored = directory.get(1).unwrap();
        assert_eq!(stored.tracking_number, "TRK-1001");
    }

    #[test]
    fn exists_reflects_registration() {
        let directory = OrderDirectory::new();
        assert!(!directory.exists(7));
        directory.register(KnownOrder {
            order_id: 7,
            tracking_number: "TRK-7".to_string(),
        });
        assert!(directory.exists(7));
    }
}
