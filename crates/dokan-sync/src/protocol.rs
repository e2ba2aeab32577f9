//! # Backend Wire Protocol
//!
//! Request and response shapes of the shop backend's JSON API.
//!
//! ## Response Envelope
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every response is one flat JSON object:                                │
//! │                                                                         │
//! │  { "success": true,  "products": [...] }          accepted              │
//! │  { "success": false, "message": "Out of stock" }  rejected              │
//! │  { "success": false, "message": "...",                                  │
//! │    "code": "PASSWORD_NOT_SET" }                   rejected, with code   │
//! │                                                                         │
//! │  HTTP 5xx               → SyncError::Status    (retryable)              │
//! │  HTTP 4xx / success off → SyncError::Rejected  (final)                  │
//! │  success on             → body fields parsed into the reply type        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use dokan_core::{CartItems, OrderSummary, Product, SizeKey, UserProfile};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Endpoints
// =============================================================================

pub mod endpoints {
    pub const PRODUCT_LIST: &str = "api/product/list";
    pub const CART_GET: &str = "api/cart/get";
    pub const CART_ADD: &str = "api/cart/add";
    pub const CART_UPDATE: &str = "api/cart/update";
    pub const ORDER_PLACE: &str = "api/order/place";
    pub const USER_ORDERS: &str = "api/order/userorders";
    pub const ORDER_TRACK: &str = "api/order/track/";
    pub const USER_PROFILE: &str = "api/user/profile";
    pub const USER_ADDRESS: &str = "api/user/address";
    pub const USER_LOGIN: &str = "api/user/login";
    pub const USER_REGISTER: &str = "api/user/register";
}

/// Header carrying the session token.
pub const TOKEN_HEADER: &str = "token";

// =============================================================================
// Envelope
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct ReplyHeader {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// Turns an HTTP status plus JSON body into the typed reply or an error.
pub fn unwrap_reply<T: DeserializeOwned>(status: u16, body: Value) -> SyncResult<T> {
    let header: ReplyHeader = serde_json::from_value(body.clone()).unwrap_or_default();

    if status >= 500 {
        return Err(SyncError::Status {
            status,
            message: header
                .message
                .unwrap_or_else(|| "server error".to_string()),
        });
    }

    if !(200..300).contains(&status) || !header.success {
        let message = header
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("request rejected (HTTP {status})"));
        return Err(SyncError::Rejected {
            message,
            code: header.code,
        });
    }

    Ok(serde_json::from_value(body)?)
}

/// Reply with no fields beyond the envelope.
#[derive(Debug, Default, Deserialize)]
pub struct Ack {}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ProductListReply {
    #[serde(default)]
    pub products: Vec<Value>,
}

impl ProductListReply {
    /// Parses each product on its own, so one malformed record does not hide
    /// the rest of the catalog.
    pub fn into_products(self) -> Vec<Product> {
        self.products
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<Product>(raw) {
                Ok(product) if !product.id.is_empty() => Some(product),
                Ok(_) => {
                    warn!("Skipping catalog entry without an id");
                    None
                }
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable catalog entry");
                    None
                }
            })
            .collect()
    }
}

// =============================================================================
// Remote Cart
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct CartReply {
    #[serde(default, rename = "cartData")]
    pub cart_data: Value,
}

impl CartReply {
    pub fn into_cart(self) -> CartItems {
        CartItems::from_value(&self.cart_data)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartAddRequest<'a> {
    pub item_id: &'a str,
    pub size: &'a SizeKey,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartUpdateRequest<'a> {
    pub item_id: &'a str,
    pub size: &'a SizeKey,
    pub quantity: i64,
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaceOrderReply {
    #[serde(default)]
    order_id: Option<Value>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    password_set: Option<bool>,
    #[serde(default)]
    message: Option<String>,
}

/// What the backend hands back for a placed order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReceipt {
    pub order_id: String,
    /// Session token for the (possibly just created) account.
    pub token: Option<String>,
    /// `Some(false)` when the account was created by this order and still
    /// needs a password.
    pub password_set: Option<bool>,
    pub message: Option<String>,
}

impl<'de> Deserialize<'de> for OrderReceipt {
    fn deserialize<D: serde::Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let reply = PlaceOrderReply::deserialize(de)?;
        let order_id = match reply.order_id {
            Some(Value::String(id)) => id,
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        Ok(OrderReceipt {
            order_id,
            token: reply.token.filter(|t| !t.is_empty()),
            password_set: reply.password_set,
            message: reply.message,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct OrdersReply {
    #[serde(default)]
    pub orders: Vec<OrderSummary>,
}

#[derive(Debug, Deserialize)]
pub struct TrackReply {
    pub order: OrderSummary,
}

// =============================================================================
// Account
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ProfileReply {
    #[serde(default)]
    pub user: UserProfile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenReply {
    #[serde(default)]
    pub token: String,
}

impl TokenReply {
    pub fn into_token(self) -> SyncResult<String> {
        if self.token.is_empty() {
            Err(SyncError::DeserializationFailed(
                "response carried no token".to_string(),
            ))
        } else {
            Ok(self.token)
        }
    }
}
