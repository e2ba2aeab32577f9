//! # Cart State
//!
//! The one piece of mutable shared state in the storefront.
//!
//! ## Thread Safety
//! The cart is wrapped in `Arc<Mutex<T>>` because:
//! 1. Several commands or tasks may mutate the cart at once
//! 2. Every mutation must read and write the same snapshot
//!
//! Each mutation is one closure run under the lock, so concurrent
//! `add_item` calls never lose an increment. Nothing awaits while the lock
//! is held.
//!
//! ## Mutation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Mutation Flow                                   │
//! │                                                                         │
//! │  add_item() ──────► lock ─► CartItems::add ─► unlock                    │
//! │                                                    │                    │
//! │                      ┌─────────────────────────────┼──────────────┐     │
//! │                      ▼                             ▼              ▼     │
//! │              persist (slot)             broadcast CartEvent   outbox    │
//! │              latest snapshot                                  (signed   │
//! │              under persist lock                                in only) │
//! │                                                                   │     │
//! │                                                  CartSyncProcessor◄┘    │
//! │                                                  (nudged, async)        │
//! │                                                                         │
//! │  NOTE: persistence and sync failures are logged and broadcast.          │
//! │        The local mutation is never rolled back.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use dokan_core::validation::validate_size_selection;
use dokan_core::{
    CartItems, CartMutation, CatalogIndex, LineItem, LineSelection, Money, PricingEngine,
    PricingResult, SizeKey, UnavailableLine,
};
use dokan_db::{slots, Database, DbResult};
use dokan_sync::{BackendApi, CartSyncHandle, SyncError, SyncWarning};

use crate::error::{ApiError, ApiResult};

/// Capacity of the event channel. Slow subscribers skip old events.
const EVENT_CAPACITY: usize = 64;

/// Notifications for cart observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CartEvent {
    /// Local contents changed; `count` is the new unit total.
    Changed { count: i64 },
    Cleared,
    /// Local contents were replaced by the server's view.
    Refreshed { count: i64 },
    /// A sync step failed. Local state is unaffected.
    SyncWarning { warning: SyncWarning },
}

/// Outcome of [`CartStore::refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CartRefresh {
    /// No session token; the local cart was left alone.
    SignedOut,
    Replaced { count: i64 },
}

/// Priced view of the cart.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub items: Vec<LineItem>,
    pub unavailable: Vec<UnavailableLine>,
    pub count: i64,
    pub totals: PricingResult,
}

/// Cart state shared by every command and task.
///
/// Cheap to clone; clones share the same cart.
#[derive(Clone)]
pub struct CartStore {
    items: Arc<Mutex<CartItems>>,
    /// Serializes slot writes so the last write carries the latest state.
    persist_lock: Arc<tokio::sync::Mutex<()>>,
    db: Database,
    api: Arc<dyn BackendApi>,
    sync: Option<CartSyncHandle>,
    /// When false, mutations stay local and nothing is queued.
    remote_sync: bool,
    events: broadcast::Sender<CartEvent>,
}

impl CartStore {
    /// Creates an empty store. Call [`CartStore::hydrate`] to load the
    /// persisted cart.
    pub fn new(db: Database, api: Arc<dyn BackendApi>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        CartStore {
            items: Arc::new(Mutex::new(CartItems::new())),
            persist_lock: Arc::new(tokio::sync::Mutex::new(())),
            db,
            api,
            sync: None,
            remote_sync: true,
            events,
        }
    }

    /// Nudges this processor after queueing remote mutations.
    pub fn with_sync(mut self, handle: CartSyncHandle) -> Self {
        self.sync = Some(handle);
        self
    }

    pub fn with_remote_sync(mut self, enabled: bool) -> Self {
        self.remote_sync = enabled;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<CartEvent> {
        self.events.clone()
    }

    fn lock(&self) -> MutexGuard<'_, CartItems> {
        // CartItems has no invariant a panicking closure could break halfway.
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Executes a function with read access to the cart.
    pub fn with_items<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&CartItems) -> R,
    {
        f(&*self.lock())
    }

    /// Executes a function with write access to the cart, atomically.
    fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut CartItems) -> R,
    {
        f(&mut *self.lock())
    }

    pub fn snapshot(&self) -> CartItems {
        self.with_items(CartItems::clone)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Adds `delta` units of a product, returning the new quantity.
    ///
    /// The product must be in `catalog`. Sized products need one of their
    /// sizes; one-size products always land under the no-size key.
    pub async fn add_item(
        &self,
        catalog: &CatalogIndex,
        product_id: &str,
        size: SizeKey,
        delta: i64,
    ) -> ApiResult<i64> {
        let product = catalog
            .get(product_id)
            .ok_or_else(|| ApiError::not_found("Product", product_id))?;
        let size = validate_size_selection(product, &size)?;

        let quantity = self.update(|cart| cart.add(product_id, size.clone(), delta));
        debug!(product_id, size = %size, delta, quantity, "Cart item added");

        let mutation = if delta == 1 {
            CartMutation::add(product_id, size, 1)
        } else {
            CartMutation::set(product_id, size, quantity)
        };
        self.after_mutation(vec![mutation]).await;
        Ok(quantity)
    }

    /// Sets the quantity of one line. Zero or less removes it.
    ///
    /// A positive quantity follows the same size rules as [`add_item`]. A
    /// removal is accepted for products that left the catalog.
    ///
    /// Returns the resulting quantity.
    ///
    /// [`add_item`]: CartStore::add_item
    pub async fn update_quantity(
        &self,
        catalog: &CatalogIndex,
        product_id: &str,
        size: SizeKey,
        quantity: i64,
    ) -> ApiResult<i64> {
        let size = if quantity > 0 {
            let product = catalog
                .get(product_id)
                .ok_or_else(|| ApiError::not_found("Product", product_id))?;
            validate_size_selection(product, &size)?
        } else {
            match catalog.get(product_id) {
                Some(product) if !product.requires_size() => SizeKey::none(),
                _ => size,
            }
        };

        let changed = self.update(|cart| cart.set_quantity(product_id, size.clone(), quantity));
        let quantity = quantity.max(0);
        if !changed {
            return Ok(quantity);
        }
        debug!(product_id, size = %size, quantity, "Cart quantity updated");

        self.after_mutation(vec![CartMutation::set(product_id, size, quantity)])
            .await;
        Ok(quantity)
    }

    /// Moves a line from one size to another in a single transition,
    /// merging into whatever `to` already holds. `to` must be one of the
    /// product's sizes.
    ///
    /// Returns the moved quantity; 0 means nothing happened.
    pub async fn move_quantity(
        &self,
        catalog: &CatalogIndex,
        product_id: &str,
        from: &SizeKey,
        to: SizeKey,
    ) -> ApiResult<i64> {
        let product = catalog
            .get(product_id)
            .ok_or_else(|| ApiError::not_found("Product", product_id))?;
        let to = validate_size_selection(product, &to)?;

        let (moved, merged) = self.update(|cart| {
            let moved = cart.move_quantity(product_id, from, to.clone());
            (moved, cart.quantity(product_id, &to))
        });
        if moved == 0 {
            return Ok(0);
        }
        debug!(product_id, from = %from, to = %to, moved, "Cart size changed");

        self.after_mutation(vec![
            CartMutation::set(product_id, from.clone(), 0),
            CartMutation::set(product_id, to, merged),
        ])
        .await;
        Ok(moved)
    }

    /// Empties the cart, locally and (when signed in) remotely.
    pub async fn clear(&self) {
        let lines = self.update(|cart| {
            let lines = cart.lines();
            cart.clear();
            lines
        });
        if lines.is_empty() {
            return;
        }
        info!(lines = lines.len(), "Cart cleared");

        let mutations = lines
            .into_iter()
            .map(|line| CartMutation::set(line.product_id, line.size, 0))
            .collect();
        self.after_mutation(mutations).await;
    }

    /// Empties the local cart only. Used after an order was placed (the
    /// backend clears its own copy) and on logout.
    pub async fn clear_local(&self) {
        self.update(CartItems::clear);
        self.persist_logged().await;
        let _ = self.events.send(CartEvent::Cleared);
    }

    async fn after_mutation(&self, mutations: Vec<CartMutation>) {
        self.persist_logged().await;

        let count = self.count();
        let event = if count == 0 {
            CartEvent::Cleared
        } else {
            CartEvent::Changed { count }
        };
        let _ = self.events.send(event);

        self.queue_remote(mutations).await;
    }

    /// Writes mutations to the outbox when a session exists.
    async fn queue_remote(&self, mutations: Vec<CartMutation>) {
        if !self.remote_sync {
            return;
        }
        match self.db.slots().get(slots::TOKEN).await {
            Ok(Some(_)) => {}
            Ok(None) => return,
            Err(e) => {
                error!(error = %e, "Failed to read session token, cart change not queued");
                return;
            }
        }

        let outbox = self.db.cart_outbox();
        for mutation in &mutations {
            if let Err(e) = outbox.queue(mutation).await {
                error!(error = %e, item_id = %mutation.item_id, "Failed to queue cart mutation");
                self.warn(SyncWarning::new("cart", &SyncError::from(e)));
            }
        }

        if let Some(sync) = &self.sync {
            sync.nudge();
        }
    }

    fn warn(&self, warning: SyncWarning) {
        warn!(%warning, "Cart sync warning");
        let _ = self.events.send(CartEvent::SyncWarning { warning });
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Total number of units.
    pub fn count(&self) -> i64 {
        self.with_items(CartItems::count)
    }

    pub fn is_empty(&self) -> bool {
        self.with_items(CartItems::is_empty)
    }

    /// Ordered snapshot as selections.
    pub fn lines(&self) -> Vec<LineSelection> {
        self.with_items(CartItems::lines)
    }

    /// Splits the snapshot into priced lines and lines whose product left
    /// the catalog.
    pub fn availability(&self, catalog: &CatalogIndex) -> (Vec<LineItem>, Vec<UnavailableLine>) {
        catalog.join(self.lines())
    }

    /// Subtotal of the cart. Missing products contribute nothing.
    pub fn amount(&self, engine: &PricingEngine, catalog: &CatalogIndex) -> Money {
        let (items, _) = self.availability(catalog);
        engine.aggregate(&items).subtotal
    }

    /// Priced view with the given delivery fee.
    pub fn summary(
        &self,
        engine: &PricingEngine,
        catalog: &CatalogIndex,
        delivery_fee: Money,
    ) -> CartSummary {
        let (items, unavailable) = self.availability(catalog);
        let totals = engine.totals(&items, delivery_fee);
        CartSummary {
            count: items
                .iter()
                .fold(0, |total: i64, item| total.saturating_add(item.quantity)),
            items,
            unavailable,
            totals,
        }
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Loads the persisted cart, replacing the in-memory one.
    ///
    /// A missing, unreadable or malformed slot yields an empty cart.
    pub async fn hydrate(&self) -> i64 {
        let cart = match self.db.slots().get(slots::CART_ITEMS).await {
            Ok(Some(raw)) => match serde_json::from_str::<Value>(&raw) {
                Ok(value) => CartItems::from_value(&value),
                Err(e) => {
                    warn!(error = %e, "Persisted cart is not JSON, starting empty");
                    CartItems::new()
                }
            },
            Ok(None) => CartItems::new(),
            Err(e) => {
                error!(error = %e, "Failed to read persisted cart, starting empty");
                CartItems::new()
            }
        };

        let count = cart.count();
        self.update(|items| *items = cart);
        info!(count, "Cart hydrated");
        count
    }

    /// Writes the current cart to its slot.
    ///
    /// The snapshot is taken after the persist lock is acquired, so a write
    /// that waited never overwrites a newer one with older state.
    pub async fn persist(&self) -> DbResult<()> {
        let _guard = self.persist_lock.lock().await;
        let snapshot = self.snapshot();
        self.db.slots().put_json(slots::CART_ITEMS, &snapshot).await
    }

    async fn persist_logged(&self) {
        if let Err(e) = self.persist().await {
            error!(error = %e, "Failed to persist cart");
        }
    }

    // =========================================================================
    // Remote
    // =========================================================================

    /// Replaces the local cart with the server's view when signed in.
    ///
    /// On failure the local cart is kept and the warning is returned (and
    /// broadcast).
    pub async fn refresh(&self) -> Result<CartRefresh, SyncWarning> {
        let token = match self.db.slots().get(slots::TOKEN).await {
            Ok(Some(token)) => token,
            Ok(None) => return Ok(CartRefresh::SignedOut),
            Err(e) => {
                let warning = SyncWarning::new("cart", &SyncError::from(e));
                self.warn(warning.clone());
                return Err(warning);
            }
        };

        match self.api.fetch_remote_cart(&token).await {
            Ok(remote) => {
                let count = remote.count();
                self.update(|items| *items = remote);
                self.persist_logged().await;
                info!(count, "Cart refreshed from server");
                let _ = self.events.send(CartEvent::Refreshed { count });
                Ok(CartRefresh::Replaced { count })
            }
            Err(e) => {
                let warning = SyncWarning::new("cart", &e);
                self.warn(warning.clone());
                Err(warning)
            }
        }
    }
}
