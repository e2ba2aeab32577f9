//! # Account Commands
//!
//! Sign-in, profile and order history.

use serde::Serialize;
use tracing::debug;

use dokan_core::{Address, OrderSummary, UserProfile};

use super::checkout::AddressInput;
use super::{Done, Render};
use crate::error::ApiResult;
use crate::state::{ConfigState, SignIn};
use crate::Storefront;

impl Render for SignIn {
    fn render(&self, _config: &ConfigState) -> String {
        let mut out = "Signed in.".to_string();
        if let Some(count) = self.cart_count {
            out.push_str(&format!(" Cart has {} items from your account.", count));
        }
        if let Some(warning) = &self.warning {
            out.push_str(&format!("\nwarning: {}", warning));
        }
        out
    }
}

impl Render for UserProfile {
    fn render(&self, _config: &ConfigState) -> String {
        let mut out = format!("{}\n{}", self.name, self.phone);
        let a = &self.address;
        if !a.address_line1.is_empty() {
            out.push_str(&format!(
                "\nDeliver to: {}, {}, {} {}",
                a.recipient_name, a.address_line1, a.district, a.postal_code
            ));
        }
        out
    }
}

fn render_order(order: &OrderSummary, config: &ConfigState) -> String {
    let date = order
        .date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string());
    let mut out = format!(
        "{:<26} {:<10} {:<18} {}",
        order.id,
        date,
        order.status,
        config.format_currency(order.amount)
    );
    for item in &order.items {
        let size = if item.size.is_empty() { "-" } else { &item.size };
        out.push_str(&format!("\n    {} {} x{}", item.name, size, item.quantity));
    }
    out
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdersView {
    pub orders: Vec<OrderSummary>,
}

impl Render for OrdersView {
    fn render(&self, config: &ConfigState) -> String {
        if self.orders.is_empty() {
            return "No orders yet.".to_string();
        }
        self.orders
            .iter()
            .map(|order| render_order(order, config))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackView {
    pub order: OrderSummary,
    pub open: bool,
}

impl Render for TrackView {
    fn render(&self, config: &ConfigState) -> String {
        render_order(&self.order, config)
    }
}

pub async fn login(store: &Storefront, phone: &str, password: &str) -> ApiResult<SignIn> {
    debug!("account login command");
    store.session.login(phone, password).await
}

pub async fn register(
    store: &Storefront,
    name: &str,
    phone: &str,
    password: &str,
) -> ApiResult<SignIn> {
    debug!("account register command");
    store.session.register(name, phone, password).await
}

pub async fn use_token(store: &Storefront, token: &str) -> ApiResult<SignIn> {
    debug!("account use-token command");
    store.session.use_token(token).await
}

pub async fn logout(store: &Storefront) -> ApiResult<Done> {
    debug!("account logout command");
    store.session.logout().await?;
    Ok(Done::new("Signed out."))
}

pub async fn profile(store: &Storefront) -> ApiResult<UserProfile> {
    debug!("account profile command");
    store.session.profile().await
}

/// Saves the default delivery address. Fields left out keep their saved
/// values.
pub async fn save_address(store: &Storefront, input: AddressInput) -> ApiResult<Done> {
    debug!("account save-address command");
    let current = store.session.profile().await?.address;
    let address = Address {
        recipient_name: input.name.unwrap_or(current.recipient_name),
        phone: input.phone.unwrap_or(current.phone),
        address_line1: input.address.unwrap_or(current.address_line1),
        district: input.district.unwrap_or(current.district),
        postal_code: input.postal_code.unwrap_or(current.postal_code),
    };
    store.session.save_address(&address).await?;
    Ok(Done::new("Address saved."))
}

pub async fn orders(store: &Storefront) -> ApiResult<OrdersView> {
    debug!("account orders command");
    Ok(OrdersView {
        orders: store.session.orders().await?,
    })
}

pub async fn track(store: &Storefront, order_id: &str) -> ApiResult<TrackView> {
    debug!(order_id, "account track command");
    let order = store.session.track(order_id).await?;
    Ok(TrackView {
        open: order.status.is_open(),
        order,
    })
}
