//! # Checkout Draft
//!
//! Pure assembly of an order: selections joined against the catalog, one
//! delivery quote, totals, validation, and the order-placement payload.
//!
//! ## Draft Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  selections (cart snapshot or buy-now list)                             │
//! │        │  CatalogIndex::join                                            │
//! │        ▼                                                                │
//! │  line items ──┐   unavailable lines (warning only)                      │
//! │               │                                                         │
//! │  address ─────┼──► DeliveryRules::quote ──► PricingEngine::totals       │
//! │               │                                                         │
//! │               ▼                                                         │
//! │         CheckoutDraft ──validate()──► PlaceOrderPayload                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The app layer owns I/O (loading the source, submitting, clearing the cart
//! afterwards). Nothing here mutates a cart.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::catalog::CatalogIndex;
use crate::delivery::{DeliveryQuote, DeliveryRules, DestinationInput};
use crate::error::ValidationError;
use crate::pricing::PricingEngine;
use crate::types::lenient::{quantity_from_value, string_from_value};
use crate::types::{Address, LineItem, LineSelection, PricingResult, SizeKey, UnavailableLine};
use crate::validation::{validate_line_size, validate_shipping_address, ValidationResult};

// =============================================================================
// Wire Payload
// =============================================================================

/// One line of `POST /api/order/place`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderItemPayload {
    #[serde(rename = "_id")]
    pub id: String,
    pub size: String,
    pub quantity: i64,
}

/// Body of `POST /api/order/place` (cash on delivery).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderPayload {
    pub phone: String,
    pub name: String,
    pub items: Vec<OrderItemPayload>,
    pub address: Address,
    pub delivery_override: DeliveryQuote,
}

// =============================================================================
// Draft
// =============================================================================

/// A priced, not-yet-submitted order.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutDraft {
    pub items: Vec<LineItem>,
    /// Selections whose product left the catalog. Not priced, not sent.
    pub unavailable: Vec<UnavailableLine>,
    pub address: Address,
    pub delivery: DeliveryQuote,
    pub totals: PricingResult,
}

impl CheckoutDraft {
    /// Joins, quotes and prices in one pass.
    ///
    /// `zone` is the explicit delivery choice, if the customer made one; the
    /// address district and line are used for inference otherwise.
    pub fn assemble<I>(
        engine: &PricingEngine,
        rules: &DeliveryRules,
        catalog: &CatalogIndex,
        selections: I,
        address: Address,
        zone: Option<String>,
    ) -> Self
    where
        I: IntoIterator<Item = LineSelection>,
    {
        let (items, unavailable) = catalog.join(selections);
        let delivery = rules.quote(&DestinationInput {
            zone,
            district: address.district.clone(),
            address_line: address.address_line1.clone(),
        });
        let totals = engine.totals(&items, delivery.fee);
        Self {
            items,
            unavailable,
            address,
            delivery,
            totals,
        }
    }

    /// Reports the first problem that blocks submission.
    ///
    /// Address fields are checked first, in form order, then the phone
    /// pattern, then that at least one line survived the catalog join, then
    /// that every line carries a size its product offers.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_shipping_address(&self.address)?;
        if self.items.iter().all(|item| item.quantity <= 0) {
            return Err(ValidationError::Required {
                field: "items".to_string(),
            });
        }
        for item in self.items.iter().filter(|item| item.quantity > 0) {
            validate_line_size(&item.product, &item.size)?;
        }
        Ok(())
    }

    /// Validates and builds the order-placement body.
    ///
    /// The order is placed under `customer_name` when the signed-in profile
    /// has one, otherwise under the recipient's name.
    pub fn payload(&self, customer_name: Option<&str>) -> ValidationResult<PlaceOrderPayload> {
        self.validate()?;

        let name = customer_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(self.address.recipient_name.trim())
            .to_string();

        let items = self
            .items
            .iter()
            .filter(|item| item.quantity > 0)
            .map(|item| OrderItemPayload {
                id: item.product.id.clone(),
                size: item.size.as_str().to_string(),
                quantity: item.quantity,
            })
            .collect();

        Ok(PlaceOrderPayload {
            phone: self.address.phone.trim().to_string(),
            name,
            items,
            address: self.address.clone(),
            delivery_override: self.delivery.clone(),
        })
    }
}

// =============================================================================
// Buy-Now Items
// =============================================================================

/// Folds repeated `(product, size)` selections into one, keeping the order
/// of first appearance.
pub fn merge_selections<I>(selections: I) -> Vec<LineSelection>
where
    I: IntoIterator<Item = LineSelection>,
{
    let mut merged: Vec<LineSelection> = Vec::new();
    for selection in selections {
        match merged
            .iter_mut()
            .find(|m| m.product_id == selection.product_id && m.size == selection.size)
        {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(selection.quantity)
            }
            None => merged.push(selection),
        }
    }
    merged
}

/// Reads a persisted buy-now list leniently.
///
/// Accepts `productId`, `_id` or `id` for the product; drops entries without
/// one; floors quantity at 1; merges repeated lines. Anything that is not an
/// array yields nothing.
pub fn sanitize_selections(value: &Value) -> Vec<LineSelection> {
    let Value::Array(entries) = value else {
        return Vec::new();
    };
    let selections = entries
        .iter()
        .filter_map(|entry| {
            let obj = entry.as_object()?;
            let product_id = ["productId", "_id", "id"]
                .iter()
                .filter_map(|k| obj.get(*k))
                .map(string_from_value)
                .map(|s| s.trim().to_string())
                .find(|s| !s.is_empty())?;
            let size = obj
                .get("size")
                .map(string_from_value)
                .map(SizeKey::new)
                .unwrap_or_default();
            let quantity = obj.get("quantity").map(quantity_from_value).unwrap_or(1).max(1);
            Some(LineSelection::new(product_id, size, quantity))
        });
    merge_selections(selections)
}
