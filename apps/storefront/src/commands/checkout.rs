//! # Checkout Commands
//!
//! Previews a checkout draft and, with `--place`, submits it.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  dokan checkout cart    --phone ... --district ...           (preview)  │
//! │  dokan checkout cart    --phone ... --district ... --place   (order)    │
//! │  dokan checkout buy-now --item tee:XXL:2 ...                            │
//! │  dokan checkout buy-now ...           (resumes the stored buy-now list) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Address fields left out on the command line are filled from the saved
//! profile address when signed in.

use serde::Serialize;
use tracing::{debug, info};

use dokan_core::{
    Address, DeliveryQuote, LineSelection, PricingResult, SizeKey, UnavailableLine,
};

use super::cart::{render_totals, PricedLine};
use super::Render;
use crate::error::{ApiError, ApiResult};
use crate::state::{CheckoutSource, ConfigState, OrderConfirmation};
use crate::Storefront;

/// Address fields as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct AddressInput {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub district: Option<String>,
    pub postal_code: Option<String>,
}

impl AddressInput {
    fn is_complete(&self) -> bool {
        self.name.is_some()
            && self.phone.is_some()
            && self.address.is_some()
            && self.district.is_some()
    }

    /// Overlays the given fields on `base`.
    fn over(self, base: Address) -> Address {
        Address {
            recipient_name: self.name.unwrap_or(base.recipient_name),
            phone: self.phone.unwrap_or(base.phone),
            address_line1: self.address.unwrap_or(base.address_line1),
            district: self.district.unwrap_or(base.district),
            postal_code: self.postal_code.unwrap_or(base.postal_code),
        }
    }
}

/// Parses `id[:size[:quantity]]`.
///
/// An empty size means one-size; a missing quantity means 1.
pub fn parse_item(raw: &str) -> ApiResult<LineSelection> {
    let mut parts = raw.splitn(3, ':');
    let product_id = parts.next().unwrap_or_default().trim();
    if product_id.is_empty() {
        return Err(ApiError::validation(format!("Missing product id in '{}'", raw)));
    }
    let size = parts.next().map(str::trim).filter(|s| !s.is_empty());
    let quantity = match parts.next() {
        Some(qty) => qty
            .trim()
            .parse::<i64>()
            .map_err(|_| ApiError::validation(format!("Invalid quantity in '{}'", raw)))?,
        None => 1,
    };
    Ok(LineSelection::new(product_id, SizeKey::from(size), quantity.max(1)))
}

/// A priced, unsubmitted checkout.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftView {
    pub source: &'static str,
    pub lines: Vec<PricedLine>,
    pub unavailable: Vec<UnavailableLine>,
    pub address: Address,
    pub delivery: DeliveryQuote,
    pub totals: PricingResult,
    /// First problem that would block placing the order.
    pub problem: Option<String>,
}

impl Render for DraftView {
    fn render(&self, config: &ConfigState) -> String {
        let mut out = format!("CHECKOUT ({})\n", self.source);
        for line in &self.lines {
            out.push_str(&line.render(config));
            out.push('\n');
        }
        for line in &self.unavailable {
            out.push_str(&format!("{:<28} left out, no longer available\n", line.product_id));
        }
        out.push_str(&format!(
            "Deliver to: {}, {}, {} ({})\n",
            self.address.recipient_name,
            self.address.address_line1,
            self.address.district,
            self.delivery.label
        ));
        out.push_str(&render_totals(&self.totals, config));
        match &self.problem {
            Some(problem) => out.push_str(&format!("\nCannot place order yet: {}", problem)),
            None => out.push_str("\nPayment: cash on delivery. Re-run with --place to order."),
        }
        out
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedView {
    #[serde(flatten)]
    pub confirmation: OrderConfirmation,
}

impl Render for PlacedView {
    fn render(&self, config: &ConfigState) -> String {
        let c = &self.confirmation;
        let mut out = format!(
            "Order {} placed. Pay {} on delivery.",
            c.order_id,
            config.format_currency(c.grand_total)
        );
        if c.signed_in && c.password_set == Some(false) {
            out.push_str("\nAn account was created for this phone. Set a password to sign in later.");
        }
        if let Some(message) = &c.message {
            out.push_str(&format!("\n{}", message));
        }
        out
    }
}

/// Result of a checkout command.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CheckoutOutcome {
    Draft(DraftView),
    Placed(PlacedView),
}

impl Render for CheckoutOutcome {
    fn render(&self, config: &ConfigState) -> String {
        match self {
            CheckoutOutcome::Draft(draft) => draft.render(config),
            CheckoutOutcome::Placed(placed) => placed.render(config),
        }
    }
}

async fn resolve_address(store: &Storefront, input: AddressInput) -> Address {
    if input.is_complete() || !store.session.is_signed_in().await.unwrap_or(false) {
        return input.over(Address::default());
    }
    match store.session.profile().await {
        Ok(profile) => input.over(profile.address),
        Err(e) => {
            debug!(error = %e, "Saved address unavailable");
            input.over(Address::default())
        }
    }
}

async fn run(
    store: &Storefront,
    source: CheckoutSource,
    input: AddressInput,
    zone: Option<String>,
    place: bool,
) -> ApiResult<CheckoutOutcome> {
    store.catalog.ensure_loaded().await;
    let address = resolve_address(store, input).await;
    let draft = store
        .checkout
        .assemble(&source, &store.catalog.index(), address, zone);

    if place {
        let confirmation = store.checkout.submit(&source, &draft).await?;
        info!(order_id = %confirmation.order_id, "Checkout complete");
        return Ok(CheckoutOutcome::Placed(PlacedView { confirmation }));
    }

    let engine = store.checkout.engine();
    Ok(CheckoutOutcome::Draft(DraftView {
        source: match source {
            CheckoutSource::Cart => "cart",
            CheckoutSource::BuyNow(_) => "buy now",
        },
        lines: draft
            .items
            .iter()
            .map(|item| PricedLine::new(engine, item))
            .collect(),
        problem: draft.validate().err().map(|e| e.to_string()),
        unavailable: draft.unavailable,
        address: draft.address,
        delivery: draft.delivery,
        totals: draft.totals,
    }))
}

/// Checks out the cart.
pub async fn cart(
    store: &Storefront,
    input: AddressInput,
    zone: Option<String>,
    place: bool,
) -> ApiResult<CheckoutOutcome> {
    debug!(place, "checkout cart command");
    run(store, CheckoutSource::Cart, input, zone, place).await
}

/// Checks out a direct purchase without touching the cart.
///
/// `items` replaces the stored buy-now list; when empty, the stored list is
/// resumed.
pub async fn buy_now(
    store: &Storefront,
    items: &[String],
    input: AddressInput,
    zone: Option<String>,
    place: bool,
) -> ApiResult<CheckoutOutcome> {
    debug!(items = items.len(), place, "checkout buy-now command");
    let source = if items.is_empty() {
        let stored = store.checkout.buy_now_items().await;
        if stored.is_empty() {
            return Err(ApiError::validation("No buy-now items; pass --item"));
        }
        CheckoutSource::BuyNow(stored)
    } else {
        let selections = items
            .iter()
            .map(|raw| parse_item(raw))
            .collect::<ApiResult<Vec<_>>>()?;
        store.catalog.ensure_loaded().await;
        store
            .checkout
            .start_buy_now(&store.catalog.index(), selections)
            .await?
    };
    run(store, source, input, zone, place).await
}
