//! # Catalog Commands
//!
//! Product listing with prices as the cart will charge them.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use dokan_core::{Money, PricingEngine, Product, SizeKey};
use dokan_sync::SyncWarning;

use super::Render;
use crate::error::{ApiError, ApiResult};
use crate::state::ConfigState;
use crate::Storefront;

/// One product as listed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRow {
    pub id: String,
    pub name: String,
    pub price: Money,
    /// Price after discount, before any size surcharge.
    pub effective_price: Money,
    pub discount: Decimal,
    pub sizes: Vec<String>,
    pub bestseller: bool,
}

impl ProductRow {
    fn new(engine: &PricingEngine, product: &Product) -> Self {
        ProductRow {
            id: product.id.clone(),
            name: product.name.clone(),
            price: product.price,
            effective_price: engine.effective_unit_price(product),
            discount: product.discount,
            sizes: product.sizes.clone(),
            bestseller: product.bestseller,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogView {
    pub products: Vec<ProductRow>,
    /// The backend could not be reached; the list may be stale.
    pub warning: Option<SyncWarning>,
}

impl Render for CatalogView {
    fn render(&self, config: &ConfigState) -> String {
        let mut out = String::new();
        if let Some(warning) = &self.warning {
            out.push_str(&format!("warning: {}\n", warning));
        }
        if self.products.is_empty() {
            out.push_str("No products.");
            return out;
        }
        for row in &self.products {
            let price = if row.effective_price == row.price {
                config.format_currency(row.price)
            } else {
                format!(
                    "{} (was {})",
                    config.format_currency(row.effective_price),
                    config.format_currency(row.price)
                )
            };
            let sizes = if row.sizes.is_empty() {
                "one size".to_string()
            } else {
                row.sizes.join("/")
            };
            out.push_str(&format!("{:<26} {:<28} {:<18} {}\n", row.id, row.name, price, sizes));
        }
        out.trim_end().to_string()
    }
}

/// Surcharge and final unit price for one size.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SizePrice {
    pub size: String,
    pub surcharge: Money,
    pub unit_price: Money,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    #[serde(flatten)]
    pub row: ProductRow,
    pub description: String,
    pub category: String,
    pub sub_category: String,
    pub size_prices: Vec<SizePrice>,
}

impl Render for ProductView {
    fn render(&self, config: &ConfigState) -> String {
        let mut out = format!("{} ({})\n", self.row.name, self.row.id);
        if !self.category.is_empty() {
            out.push_str(&format!("{} / {}\n", self.category, self.sub_category));
        }
        if self.row.discount > Decimal::ZERO {
            out.push_str(&format!(
                "Price: {}, {}% off {}\n",
                config.format_currency(self.row.effective_price),
                self.row.discount.normalize(),
                config.format_currency(self.row.price)
            ));
        } else {
            out.push_str(&format!("Price: {}\n", config.format_currency(self.row.price)));
        }
        for size in &self.size_prices {
            if size.surcharge.is_zero() {
                out.push_str(&format!("  {:<6} {}\n", size.size, config.format_currency(size.unit_price)));
            } else {
                out.push_str(&format!(
                    "  {:<6} {} (+{} surcharge)\n",
                    size.size,
                    config.format_currency(size.unit_price),
                    config.format_currency(size.surcharge)
                ));
            }
        }
        if !self.description.is_empty() {
            out.push_str(&format!("\n{}", self.description));
        }
        out.trim_end().to_string()
    }
}

/// Lists the catalog. `refresh` fetches from the backend first; otherwise
/// the local snapshot is used when there is one.
pub async fn list(store: &Storefront, refresh: bool) -> ApiResult<CatalogView> {
    debug!(refresh, "catalog list command");
    let warning = if refresh {
        store.catalog.refresh_or_fallback().await
    } else {
        store.catalog.ensure_loaded().await
    };

    let engine = store.checkout.engine();
    let index = store.catalog.index();
    Ok(CatalogView {
        products: index
            .products()
            .iter()
            .map(|product| ProductRow::new(engine, product))
            .collect(),
        warning,
    })
}

/// One product with per-size prices.
pub async fn show(store: &Storefront, product_id: &str) -> ApiResult<ProductView> {
    debug!(product_id, "catalog show command");
    store.catalog.ensure_loaded().await;

    let index = store.catalog.index();
    let product = index
        .get(product_id)
        .ok_or_else(|| ApiError::not_found("Product", product_id))?;
    let engine = store.checkout.engine();
    let unit = engine.effective_unit_price(product);

    let size_prices = product
        .sizes
        .iter()
        .map(|label| {
            let surcharge = engine.size_surcharge(&SizeKey::from(label.as_str()));
            SizePrice {
                size: label.clone(),
                surcharge,
                unit_price: unit + surcharge,
            }
        })
        .collect();

    Ok(ProductView {
        row: ProductRow::new(engine, product),
        description: product.description.clone(),
        category: product.category.clone(),
        sub_category: product.sub_category.clone(),
        size_prices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::storefront;

    #[tokio::test]
    async fn test_list_prices_discounts() {
        let (store, _) = storefront().await;

        let view = list(&store, true).await.unwrap();

        assert!(view.warning.is_none());
        let panjabi = view.products.iter().find(|p| p.id == "panjabi").unwrap();
        assert_eq!(panjabi.effective_price, Money::from_major(900));
        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_show_lists_size_surcharges() {
        let (store, _) = storefront().await;

        let view = show(&store, "tee").await.unwrap();

        let xxl = view.size_prices.iter().find(|s| s.size == "XXL").unwrap();
        assert_eq!(xxl.unit_price, Money::from_major(550));
        assert!(view.render(&store.config).contains("surcharge"));

        assert!(show(&store, "ghost").await.is_err());
        store.shutdown().await;
    }
}
