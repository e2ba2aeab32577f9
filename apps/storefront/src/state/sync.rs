//! # Sync State
//!
//! Bridges the cart sync processor back into the storefront.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CartSyncProcessor ──► CartSyncEmitter                                  │
//! │                          │                                              │
//! │                          ├── emit_status   ──► debug log                │
//! │                          └── emit_warning  ──► CartEvent::SyncWarning   │
//! │                                                (cart subscribers)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tokio::sync::broadcast;
use tracing::{debug, warn};

use dokan_sync::{SyncEventEmitter, SyncStatus, SyncWarning};

use crate::state::cart::{CartEvent, CartStore};

/// Forwards processor warnings to cart observers.
#[derive(Clone)]
pub struct CartSyncEmitter {
    events: broadcast::Sender<CartEvent>,
}

impl CartSyncEmitter {
    pub fn new(cart: &CartStore) -> Self {
        Self {
            events: cart.event_sender(),
        }
    }
}

impl SyncEventEmitter for CartSyncEmitter {
    fn emit_status(&self, status: &SyncStatus) {
        debug!(
            pending = status.pending,
            last_error = ?status.last_error,
            "Cart sync status"
        );
    }

    fn emit_warning(&self, warning: &SyncWarning) {
        warn!(%warning, "Cart sync warning");
        // No subscribers is fine.
        let _ = self.events.send(CartEvent::SyncWarning {
            warning: warning.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::{test_db, FakeBackend};
    use dokan_sync::SyncError;

    #[tokio::test]
    async fn test_warning_reaches_cart_subscribers() {
        let cart = CartStore::new(test_db().await, FakeBackend::new());
        let emitter = CartSyncEmitter::new(&cart);
        let mut events = cart.subscribe();

        let warning = SyncWarning::new("cart", &SyncError::Timeout);
        emitter.emit_warning(&warning);

        assert_eq!(
            events.recv().await.unwrap(),
            CartEvent::SyncWarning { warning }
        );
    }
}
