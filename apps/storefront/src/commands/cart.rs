//! # Cart Commands
//!
//! Cart manipulation and the priced cart page.
//!
//! ## Cart Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Lifecycle                                       │
//! │                                                                         │
//! │  ┌──────────┐     ┌──────────┐     ┌──────────┐     ┌──────────┐        │
//! │  │  Empty   │────►│ In Cart  │────►│ Checkout │────►│  Order   │        │
//! │  │  Cart    │     │          │     │  Draft   │     │  Placed  │        │
//! │  └──────────┘     └──────────┘     └──────────┘     └──────────┘        │
//! │                        │                                  │             │
//! │                   cart add                         (cart emptied)       │
//! │                   cart update                                           │
//! │                   cart move                                             │
//! │                        │                                                │
//! │                        ▼                                                │
//! │                   cart clear ──────────────────────►                    │
//! │                                                      (back to empty)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use tracing::debug;

use dokan_core::{
    LineItem, Money, PricingEngine, PricingResult, SizeKey, UnavailableLine,
};
use dokan_sync::SyncWarning;

use super::Render;
use crate::error::ApiResult;
use crate::state::{CartRefresh, ConfigState};
use crate::Storefront;

/// A cart or checkout line with its price breakdown.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedLine {
    pub product_id: String,
    pub name: String,
    pub size: SizeKey,
    pub quantity: i64,
    pub unit_price: Money,
    pub surcharge: Money,
    pub savings: Money,
    pub line_total: Money,
}

impl PricedLine {
    pub fn new(engine: &PricingEngine, item: &LineItem) -> Self {
        let breakdown = engine.line_breakdown(&item.product, &item.size, item.quantity);
        PricedLine {
            product_id: item.product.id.clone(),
            name: item.product.name.clone(),
            size: item.size.clone(),
            quantity: item.quantity,
            unit_price: breakdown.unit_price,
            surcharge: breakdown.surcharge,
            savings: breakdown.savings,
            line_total: breakdown.line_total,
        }
    }

    pub fn render(&self, config: &ConfigState) -> String {
        let size = self.size.label().unwrap_or("-");
        let mut line = format!(
            "{:<28} {:<6} x{:<3} {:>12}",
            self.name,
            size,
            self.quantity,
            config.format_currency(self.line_total)
        );
        if !self.surcharge.is_zero() {
            line.push_str(&format!("  (+{} each)", config.format_currency(self.surcharge)));
        }
        line
    }
}

/// Renders the totals block shared by the cart and checkout views.
pub fn render_totals(totals: &PricingResult, config: &ConfigState) -> String {
    let mut out = format!("Subtotal: {}\n", config.format_currency(totals.subtotal));
    if !totals.total_savings.is_zero() {
        out.push_str(&format!("You save: {}\n", config.format_currency(totals.total_savings)));
    }
    if !totals.total_surcharge.is_zero() {
        out.push_str(&format!(
            "Size surcharge: {}\n",
            config.format_currency(totals.total_surcharge)
        ));
    }
    out.push_str(&format!("Delivery: {}\n", config.format_currency(totals.delivery_fee)));
    out.push_str(&format!("Total: {}", config.format_currency(totals.grand_total)));
    out
}

/// Cart page response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub lines: Vec<PricedLine>,
    /// Lines whose product left the catalog. Kept, but not priced.
    pub unavailable: Vec<UnavailableLine>,
    pub count: i64,
    pub totals: PricingResult,
    pub warning: Option<SyncWarning>,
}

impl Render for CartView {
    fn render(&self, config: &ConfigState) -> String {
        let mut out = String::new();
        if let Some(warning) = &self.warning {
            out.push_str(&format!("warning: {}\n", warning));
        }
        if self.count == 0 {
            out.push_str("Your cart is empty.");
            return out;
        }
        out.push_str(&format!("CART ({} items)\n", self.count));
        for line in &self.lines {
            out.push_str(&line.render(config));
            out.push('\n');
        }
        for line in &self.unavailable {
            out.push_str(&format!(
                "{:<28} {:<6} x{:<3} no longer available\n",
                line.product_id,
                line.size.label().unwrap_or("-"),
                line.quantity
            ));
        }
        out.push_str(&render_totals(&self.totals, config));
        out
    }
}

async fn view(store: &Storefront, warning: Option<SyncWarning>) -> CartView {
    let catalog_warning = store.catalog.ensure_loaded().await;
    let engine = store.checkout.engine();
    let summary = store.cart.summary(
        engine,
        &store.catalog.index(),
        store.config.cart_delivery_fee,
    );
    CartView {
        lines: summary
            .items
            .iter()
            .map(|item| PricedLine::new(engine, item))
            .collect(),
        unavailable: summary.unavailable,
        count: summary.count,
        totals: summary.totals,
        warning: warning.or(catalog_warning),
    }
}

/// Gets the current cart, priced against the catalog.
pub async fn show(store: &Storefront) -> ApiResult<CartView> {
    debug!("cart show command");
    Ok(view(store, None).await)
}

/// Adds units of a product.
///
/// `size` is required for sized products and ignored for one-size ones.
pub async fn add(
    store: &Storefront,
    product_id: &str,
    size: Option<&str>,
    quantity: i64,
) -> ApiResult<CartView> {
    debug!(product_id, ?size, quantity, "cart add command");
    let warning = store.catalog.ensure_loaded().await;
    store
        .cart
        .add_item(&store.catalog.index(), product_id, SizeKey::from(size), quantity)
        .await?;
    Ok(view(store, warning).await)
}

/// Sets the quantity of one line; zero removes it.
pub async fn update(
    store: &Storefront,
    product_id: &str,
    size: Option<&str>,
    quantity: i64,
) -> ApiResult<CartView> {
    debug!(product_id, ?size, quantity, "cart update command");
    let warning = store.catalog.ensure_loaded().await;
    store
        .cart
        .update_quantity(&store.catalog.index(), product_id, SizeKey::from(size), quantity)
        .await?;
    Ok(view(store, warning).await)
}

/// Moves a line to another size, merging with any existing line there.
pub async fn move_size(
    store: &Storefront,
    product_id: &str,
    from: Option<&str>,
    to: Option<&str>,
) -> ApiResult<CartView> {
    debug!(product_id, ?from, ?to, "cart move command");
    let warning = store.catalog.ensure_loaded().await;
    store
        .cart
        .move_quantity(
            &store.catalog.index(),
            product_id,
            &SizeKey::from(from),
            SizeKey::from(to),
        )
        .await?;
    Ok(view(store, warning).await)
}

pub async fn clear(store: &Storefront) -> ApiResult<CartView> {
    debug!("cart clear command");
    store.cart.clear().await;
    Ok(view(store, None).await)
}

/// Replaces the local cart with the server's copy when signed in.
pub async fn refresh(store: &Storefront) -> ApiResult<CartView> {
    debug!("cart refresh command");
    let warning = match store.cart.refresh().await {
        Ok(CartRefresh::Replaced { count }) => {
            debug!(count, "Cart replaced from server");
            None
        }
        Ok(CartRefresh::SignedOut) => None,
        Err(warning) => Some(warning),
    };
    Ok(view(store, warning).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::test_support::storefront;

    #[tokio::test]
    async fn test_add_prices_oversize_line() {
        let (store, _) = storefront().await;

        let view = add(&store, "tee", Some("XXL"), 2).await.unwrap();

        assert_eq!(view.count, 2);
        assert_eq!(view.lines[0].surcharge, Money::from_major(50));
        assert_eq!(view.totals.grand_total, Money::from_major(1100));
        assert!(view.render(&store.config).contains("CART (2 items)"));
        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_add_unknown_product_is_not_found() {
        let (store, _) = storefront().await;
        let err = add(&store, "ghost", None, 1).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_move_then_clear() {
        let (store, _) = storefront().await;
        add(&store, "tee", Some("M"), 1).await.unwrap();
        add(&store, "tee", Some("L"), 2).await.unwrap();

        let view = move_size(&store, "tee", Some("M"), Some("L")).await.unwrap();
        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.lines[0].quantity, 3);

        let view = clear(&store).await.unwrap();
        assert_eq!(view.render(&store.config), "Your cart is empty.");
        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_update_and_move_reject_bad_sizes() {
        let (store, _) = storefront().await;
        add(&store, "tee", Some("M"), 1).await.unwrap();

        let err = update(&store, "panjabi", None, 3).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = move_size(&store, "tee", Some("M"), Some("ZZZ")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let view = show(&store).await.unwrap();
        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.lines[0].quantity, 1);
        store.shutdown().await;
    }
}
