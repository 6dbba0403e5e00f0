//! # Order Completion Gate
//!
//! Idempotent boundary converting a successful payment outcome into a
//! placed/paid order. Duplicate or concurrent calls for the same collection
//! collapse into a single effective completion; the second caller observes
//! the already-placed order, never a duplicate.

use crate::collection::{OrderPaymentStatus, PlacedOrder};
use crate::error::CheckoutResult;
use crate::store::BoxedSessionStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Completion gate contract. `complete` is called at most once per
/// successful confirmation by the engine, but must itself be safe under
/// concurrent invocation from independent flows.
#[async_trait]
pub trait CompletionGate: Send + Sync {
    async fn complete(&self, collection_id: &str) -> CheckoutResult<PlacedOrder>;
}

/// Type alias for a shared completion gate
pub type BoxedCompletionGate = Arc<dyn CompletionGate>;

/// In-memory completion gate over a session store. The placed-order map and
/// its lock are the collapse-to-one-order mechanism.
pub struct MemoryCompletionGate {
    store: BoxedSessionStore,
    placed: Mutex<HashMap<String, PlacedOrder>>,
}

impl MemoryCompletionGate {
    pub fn new(store: BoxedSessionStore) -> Self {
        Self {
            store,
            placed: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a placed order by its id
    pub async fn find_order(&self, order_id: &str) -> Option<PlacedOrder> {
        self.placed
            .lock()
            .await
            .values()
            .find(|o| o.id == order_id)
            .cloned()
    }

    /// Look up the placed order for a collection, if completion already ran
    pub async fn order_for_collection(&self, collection_id: &str) -> Option<PlacedOrder> {
        self.placed.lock().await.get(collection_id).cloned()
    }
}

#[async_trait]
impl CompletionGate for MemoryCompletionGate {
    async fn complete(&self, collection_id: &str) -> CheckoutResult<PlacedOrder> {
        // The lock is held across the store read so two racing callers
        // cannot both observe "not placed yet".
        let mut placed = self.placed.lock().await;

        if let Some(existing) = placed.get(collection_id) {
            info!(
                collection_id,
                order_id = %existing.id,
                "duplicate completion collapsed into existing order"
            );
            return Ok(existing.clone());
        }

        let collection = self.store.collection(collection_id).await?;
        let payment_status = if collection.is_satisfied() {
            OrderPaymentStatus::Captured
        } else {
            OrderPaymentStatus::PartiallyCaptured
        };

        let order = PlacedOrder::new(collection_id, payment_status);
        info!(
            collection_id,
            order_id = %order.id,
            payment_status = ?order.payment_status,
            "order placed"
        );
        placed.insert(collection_id.to_string(), order.clone());
        Ok(order)
    }
}
