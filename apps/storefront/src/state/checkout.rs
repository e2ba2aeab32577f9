//! # Checkout State
//!
//! Turns a cart or a buy-now list into a priced draft, and the draft into an
//! order.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Checkout Flow                                        │
//! │                                                                         │
//! │  CheckoutSource::Cart          CheckoutSource::BuyNow(items)            │
//! │  (cart snapshot)               (`checkoutItems` slot)                   │
//! │          │                              │                               │
//! │          └──────────────┬───────────────┘                               │
//! │                         ▼                                               │
//! │  assemble() ── catalog join ── delivery zone ── totals ──► CheckoutDraft│
//! │                         │                                               │
//! │                         ▼                                               │
//! │  submit() ── validate ── guard ── POST /api/order/place                 │
//! │                         │                  │                            │
//! │                  (error: nothing sent)     ├── ok:   store issued token │
//! │                                            │         clear the source   │
//! │                                            └── fail: draft untouched    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Payment is cash on delivery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use dokan_core::checkout::{merge_selections, sanitize_selections};
use dokan_core::validation::validate_size_selection;
use dokan_core::{
    Address, CatalogIndex, CheckoutDraft, DeliveryQuote, DeliveryRules, DestinationInput,
    LineItem, LineSelection, Money, PricingEngine, PricingResult, UnavailableLine,
    ValidationError,
};
use dokan_db::{slots, Database};
use dokan_sync::BackendApi;

use crate::error::{ApiError, ApiResult, CheckoutError};
use crate::state::cart::CartStore;
use crate::state::session::Session;

/// Where the draft's lines come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutSource {
    Cart,
    /// A direct purchase that bypasses the cart.
    BuyNow(Vec<LineSelection>),
}

/// What the customer sees after an order went through.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
    pub order_id: String,
    pub grand_total: Money,
    /// The order came back with a session token, now stored.
    pub signed_in: bool,
    /// `Some(false)` when the account was created by this order.
    pub password_set: Option<bool>,
    pub message: Option<String>,
}

/// Releases the submission flag when dropped.
struct SubmitGuard<'a>(&'a AtomicBool);

impl<'a> SubmitGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SubmitGuard(flag))
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct CheckoutAssembler {
    db: Database,
    api: Arc<dyn BackendApi>,
    cart: CartStore,
    session: Session,
    engine: PricingEngine,
    rules: DeliveryRules,
    submitting: AtomicBool,
}

impl CheckoutAssembler {
    pub fn new(
        db: Database,
        api: Arc<dyn BackendApi>,
        cart: CartStore,
        session: Session,
        engine: PricingEngine,
        rules: DeliveryRules,
    ) -> Self {
        CheckoutAssembler {
            db,
            api,
            cart,
            session,
            engine,
            rules,
            submitting: AtomicBool::new(false),
        }
    }

    pub fn engine(&self) -> &PricingEngine {
        &self.engine
    }

    pub fn rules(&self) -> &DeliveryRules {
        &self.rules
    }

    // =========================================================================
    // Buy-now list
    // =========================================================================

    /// Persists a buy-now list and returns it as a source.
    ///
    /// Every line follows the cart's size rules against `catalog`: sized
    /// products need one of their sizes, one-size products drop whatever
    /// label was given. Repeated lines are merged. Nothing is stored when a
    /// line is rejected.
    pub async fn start_buy_now(
        &self,
        catalog: &CatalogIndex,
        items: Vec<LineSelection>,
    ) -> ApiResult<CheckoutSource> {
        let mut checked = Vec::with_capacity(items.len());
        for item in items {
            let product_id = item.product_id.trim();
            if product_id.is_empty() {
                continue;
            }
            let product = catalog
                .get(product_id)
                .ok_or_else(|| ApiError::not_found("Product", product_id))?;
            let size = validate_size_selection(product, &item.size)?;
            checked.push(LineSelection::new(product_id, size, item.quantity.max(1)));
        }
        let items = merge_selections(checked);
        if items.is_empty() {
            return Err(ValidationError::Required {
                field: "items".to_string(),
            }
            .into());
        }

        self.db.slots().put_json(slots::CHECKOUT_ITEMS, &items).await?;
        info!(lines = items.len(), "Buy-now list stored");
        Ok(CheckoutSource::BuyNow(items))
    }

    /// The persisted buy-now list, sanitized. Unreadable data reads as empty.
    pub async fn buy_now_items(&self) -> Vec<LineSelection> {
        match self.db.slots().get(slots::CHECKOUT_ITEMS).await {
            Ok(Some(raw)) => serde_json::from_str::<Value>(&raw)
                .map(|value| sanitize_selections(&value))
                .unwrap_or_else(|e| {
                    warn!(error = %e, "Buy-now list is not JSON, ignoring");
                    Vec::new()
                }),
            Ok(None) => Vec::new(),
            Err(e) => {
                error!(error = %e, "Failed to read buy-now list");
                Vec::new()
            }
        }
    }

    /// The pending buy-now list if there is one, else the cart.
    pub async fn resume(&self) -> CheckoutSource {
        let items = self.buy_now_items().await;
        if items.is_empty() {
            CheckoutSource::Cart
        } else {
            CheckoutSource::BuyNow(items)
        }
    }

    // =========================================================================
    // Draft
    // =========================================================================

    fn selections(&self, source: &CheckoutSource) -> Vec<LineSelection> {
        match source {
            CheckoutSource::Cart => self.cart.lines(),
            CheckoutSource::BuyNow(items) => items.clone(),
        }
    }

    /// Joins the source against the catalog. Missing products come back
    /// separately and are not priced.
    pub fn build_line_items(
        &self,
        source: &CheckoutSource,
        catalog: &CatalogIndex,
    ) -> (Vec<LineItem>, Vec<UnavailableLine>) {
        catalog.join(self.selections(source))
    }

    pub fn resolve_delivery_fee(&self, input: &DestinationInput) -> DeliveryQuote {
        self.rules.quote(input)
    }

    pub fn compute_totals(&self, items: &[LineItem], delivery_fee: Money) -> PricingResult {
        self.engine.totals(items, delivery_fee)
    }

    /// Builds a priced draft. `zone` is the customer's explicit delivery
    /// choice; the address is used for inference otherwise.
    pub fn assemble(
        &self,
        source: &CheckoutSource,
        catalog: &CatalogIndex,
        address: Address,
        zone: Option<String>,
    ) -> CheckoutDraft {
        let draft = CheckoutDraft::assemble(
            &self.engine,
            &self.rules,
            catalog,
            self.selections(source),
            address,
            zone,
        );
        for line in &draft.unavailable {
            warn!(product_id = %line.product_id, "Product no longer available, left out of checkout");
        }
        draft
    }

    // =========================================================================
    // Submission
    // =========================================================================

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    /// Places the order.
    ///
    /// ## Outcomes
    /// - invalid draft: `Validation`, nothing sent
    /// - another submit in flight: `AlreadySubmitting`
    /// - backend refuses or is unreachable: `Submission`, source untouched
    /// - success: an issued token is stored and the source is cleared
    pub async fn submit(
        &self,
        source: &CheckoutSource,
        draft: &CheckoutDraft,
    ) -> Result<OrderConfirmation, CheckoutError> {
        draft.validate()?;
        let _guard = SubmitGuard::acquire(&self.submitting).ok_or(CheckoutError::AlreadySubmitting)?;

        let customer_name = self.session.customer_name().await;
        let payload = draft.payload(customer_name.as_deref())?;

        info!(
            lines = payload.items.len(),
            area = %payload.delivery_override.area,
            total = %draft.totals.grand_total,
            "Placing order"
        );
        let receipt = self.api.place_order(&payload).await.map_err(|e| {
            warn!(error = %e, "Order placement failed");
            e
        })?;
        info!(order_id = %receipt.order_id, "Order placed");

        let signed_in = match receipt.token.as_deref() {
            Some(token) => match self.session.store_token(token).await {
                Ok(()) => true,
                Err(e) => {
                    error!(error = %e, "Failed to store issued session token");
                    false
                }
            },
            None => false,
        };

        self.clear_source(source).await;

        Ok(OrderConfirmation {
            order_id: receipt.order_id,
            grand_total: draft.totals.grand_total,
            signed_in,
            password_set: receipt.password_set,
            message: receipt.message,
        })
    }

    async fn clear_source(&self, source: &CheckoutSource) {
        match source {
            CheckoutSource::Cart => {
                // The backend empties its copy of the cart when the order lands.
                if let Err(e) = self.db.cart_outbox().discard_pending().await {
                    error!(error = %e, "Failed to drop stale cart changes");
                }
                self.cart.clear_local().await;
            }
            CheckoutSource::BuyNow(_) => {
                if let Err(e) = self.db.slots().remove(slots::CHECKOUT_ITEMS).await {
                    error!(error = %e, "Failed to remove buy-now list");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::{catalog, dhaka_address, sign_in, test_db, FakeBackend};
    use crate::error::ErrorCode;
    use dokan_core::SizeKey;
    use dokan_sync::SyncError;
    use tokio::sync::Notify;

    struct Fixture {
        checkout: Arc<CheckoutAssembler>,
        cart: CartStore,
        api: Arc<FakeBackend>,
        db: Database,
    }

    async fn fixture() -> Fixture {
        let db = test_db().await;
        let api = FakeBackend::new();
        let cart = CartStore::new(db.clone(), api.clone());
        let session = Session::new(db.clone(), api.clone(), cart.clone());
        let checkout = CheckoutAssembler::new(
            db.clone(),
            api.clone(),
            cart.clone(),
            session,
            PricingEngine::default(),
            DeliveryRules::default(),
        );
        Fixture {
            checkout: Arc::new(checkout),
            cart,
            api,
            db,
        }
    }

    async fn fill_cart(cart: &CartStore) {
        let catalog = catalog();
        cart.add_item(&catalog, "tee", SizeKey::from("XXL"), 2).await.unwrap();
        cart.add_item(&catalog, "cap", SizeKey::none(), 1).await.unwrap();
    }

    #[tokio::test]
    async fn test_draft_prices_and_quotes_delivery() {
        let f = fixture().await;
        fill_cart(&f.cart).await;

        let draft = f
            .checkout
            .assemble(&CheckoutSource::Cart, &catalog(), dhaka_address(), None);

        // 2 × (500 + 50 oversize) + 300, delivered inside Dhaka for 80
        assert_eq!(draft.totals.subtotal, Money::from_major(1400));
        assert_eq!(draft.delivery.area, "inside");
        assert_eq!(draft.totals.grand_total, Money::from_major(1480));
    }

    #[tokio::test]
    async fn test_explicit_zone_wins() {
        let f = fixture().await;
        fill_cart(&f.cart).await;

        let draft = f.checkout.assemble(
            &CheckoutSource::Cart,
            &catalog(),
            dhaka_address(),
            Some("gazipur".to_string()),
        );
        assert_eq!(draft.delivery.fee, Money::from_major(120));
    }

    #[tokio::test]
    async fn test_submit_success_clears_cart() {
        let f = fixture().await;
        fill_cart(&f.cart).await;
        let draft = f
            .checkout
            .assemble(&CheckoutSource::Cart, &catalog(), dhaka_address(), None);

        let confirmation = f.checkout.submit(&CheckoutSource::Cart, &draft).await.unwrap();

        assert_eq!(confirmation.order_id, "order-1");
        assert_eq!(confirmation.grand_total, Money::from_major(1480));
        assert!(f.cart.is_empty());

        let placed = f.api.placed.lock().unwrap();
        assert_eq!(placed[0].items.len(), 2);
        assert_eq!(placed[0].name, "Rahim");
        assert_eq!(placed[0].delivery_override.area, "inside");
    }

    #[tokio::test]
    async fn test_submit_failure_preserves_cart() {
        let f = fixture().await;
        fill_cart(&f.cart).await;
        let draft = f
            .checkout
            .assemble(&CheckoutSource::Cart, &catalog(), dhaka_address(), None);
        f.api.fail_with(|| SyncError::rejected("Out of stock"));

        let err = f.checkout.submit(&CheckoutSource::Cart, &draft).await.unwrap_err();

        assert!(matches!(err, CheckoutError::Submission(_)));
        assert_eq!(f.cart.count(), 3);
        assert!(!f.checkout.is_submitting());
    }

    #[tokio::test]
    async fn test_invalid_draft_is_not_sent() {
        let f = fixture().await;
        fill_cart(&f.cart).await;
        let mut address = dhaka_address();
        address.phone = "12345".to_string();
        let draft = f
            .checkout
            .assemble(&CheckoutSource::Cart, &catalog(), address, None);

        let err = f.checkout.submit(&CheckoutSource::Cart, &draft).await.unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::Validation(ValidationError::InvalidFormat { .. })
        ));
        assert!(f.api.placed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_source_is_rejected() {
        let f = fixture().await;
        let draft = f
            .checkout
            .assemble(&CheckoutSource::Cart, &catalog(), dhaka_address(), None);

        let err = f.checkout.submit(&CheckoutSource::Cart, &draft).await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Validation(ValidationError::Required { ref field }) if field == "items"
        ));
    }

    #[tokio::test]
    async fn test_buy_now_leaves_cart_alone() {
        let f = fixture().await;
        fill_cart(&f.cart).await;
        let source = f
            .checkout
            .start_buy_now(
                &catalog(),
                vec![LineSelection::new("panjabi", SizeKey::from("M"), 0)],
            )
            .await
            .unwrap();
        assert_eq!(f.checkout.resume().await, source);

        let draft = f
            .checkout
            .assemble(&source, &catalog(), dhaka_address(), None);
        // quantity floored at 1, 10% off 1000
        assert_eq!(draft.totals.subtotal, Money::from_major(900));

        f.checkout.submit(&source, &draft).await.unwrap();

        assert_eq!(f.cart.count(), 3);
        assert!(f.checkout.buy_now_items().await.is_empty());
        assert_eq!(f.checkout.resume().await, CheckoutSource::Cart);
    }

    #[tokio::test]
    async fn test_buy_now_follows_size_rules() {
        let f = fixture().await;
        let catalog = catalog();

        let err = f
            .checkout
            .start_buy_now(&catalog, vec![LineSelection::new("panjabi", SizeKey::none(), 1)])
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = f
            .checkout
            .start_buy_now(&catalog, vec![LineSelection::new("tee", SizeKey::from("ZZZ"), 1)])
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = f
            .checkout
            .start_buy_now(&catalog, vec![LineSelection::new("ghost", SizeKey::none(), 1)])
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert!(f.checkout.buy_now_items().await.is_empty());
    }

    #[tokio::test]
    async fn test_buy_now_merges_repeated_lines() {
        let f = fixture().await;

        let source = f
            .checkout
            .start_buy_now(
                &catalog(),
                vec![
                    LineSelection::new("tee", SizeKey::from("M"), 1),
                    LineSelection::new("cap", SizeKey::from("L"), 1),
                    LineSelection::new("tee", SizeKey::from("M"), 2),
                ],
            )
            .await
            .unwrap();

        assert_eq!(
            source,
            CheckoutSource::BuyNow(vec![
                LineSelection::new("tee", SizeKey::from("M"), 3),
                LineSelection::new("cap", SizeKey::none(), 1),
            ])
        );
    }

    #[tokio::test]
    async fn test_stored_line_without_size_is_not_sent() {
        let f = fixture().await;
        f.db.slots()
            .put(slots::CHECKOUT_ITEMS, r#"[{"_id": "panjabi", "quantity": 1}]"#)
            .await
            .unwrap();
        let source = f.checkout.resume().await;
        let draft = f.checkout.assemble(&source, &catalog(), dhaka_address(), None);

        let err = f.checkout.submit(&source, &draft).await.unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::Validation(ValidationError::Required { ref field }) if field == "size"
        ));
        assert!(f.api.placed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_buy_now_slot_is_sanitized() {
        let f = fixture().await;
        f.db.slots()
            .put(
                slots::CHECKOUT_ITEMS,
                r#"[{"_id": "cap", "quantity": -3}, {"size": "M"}, "junk"]"#,
            )
            .await
            .unwrap();

        let items = f.checkout.buy_now_items().await;

        assert_eq!(items, vec![LineSelection::new("cap", SizeKey::none(), 1)]);
    }

    #[tokio::test]
    async fn test_issued_token_signs_in_guest() {
        let f = fixture().await;
        fill_cart(&f.cart).await;
        *f.api.issued_token.lock().unwrap() = Some("tok-guest".to_string());
        let draft = f
            .checkout
            .assemble(&CheckoutSource::Cart, &catalog(), dhaka_address(), None);

        let confirmation = f.checkout.submit(&CheckoutSource::Cart, &draft).await.unwrap();

        assert!(confirmation.signed_in);
        assert_eq!(
            f.db.slots().get(slots::TOKEN).await.unwrap().as_deref(),
            Some("tok-guest")
        );
    }

    #[tokio::test]
    async fn test_profile_name_is_used_when_signed_in() {
        let f = fixture().await;
        sign_in(&f.db).await;
        f.api.profile.lock().unwrap().name = "Karim".to_string();
        fill_cart(&f.cart).await;
        let draft = f
            .checkout
            .assemble(&CheckoutSource::Cart, &catalog(), dhaka_address(), None);

        f.checkout.submit(&CheckoutSource::Cart, &draft).await.unwrap();

        assert_eq!(f.api.placed.lock().unwrap()[0].name, "Karim");
        // pending remote cart changes are stale once the order lands
        assert_eq!(f.db.cart_outbox().count_pending().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_second_submit_while_pending_is_rejected() {
        let f = fixture().await;
        fill_cart(&f.cart).await;
        let gate = Arc::new(Notify::new());
        *f.api.order_gate.lock().unwrap() = Some(gate.clone());
        let draft = f
            .checkout
            .assemble(&CheckoutSource::Cart, &catalog(), dhaka_address(), None);

        let first = {
            let checkout = f.checkout.clone();
            let draft = draft.clone();
            tokio::spawn(async move { checkout.submit(&CheckoutSource::Cart, &draft).await })
        };
        f.api.order_started.notified().await;

        let second = f.checkout.submit(&CheckoutSource::Cart, &draft).await;
        assert!(matches!(second, Err(CheckoutError::AlreadySubmitting)));

        gate.notify_one();
        first.await.unwrap().unwrap();
        assert!(!f.checkout.is_submitting());
        assert_eq!(f.api.placed.lock().unwrap().len(), 1);
    }
}
