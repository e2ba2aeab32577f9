//! # Session State
//!
//! The customer's sign-in and everything gated on it.
//!
//! ## Token Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  login / register / use_token ──► `token` slot ──► cart.refresh()       │
//! │  guest order with issued token ──► `token` slot                         │
//! │                                                                         │
//! │  token present:  remote cart sync · profile · address · order history   │
//! │                                                                         │
//! │  logout ──► outbox discarded ──► token removed ──► cart + buy-now gone  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The token is opaque. It lives only in the local slot and is sent as the
//! `token` header.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use dokan_core::validation::{
    normalize_phone, validate_password, validate_phone, validate_profile_address,
};
use dokan_core::{Address, OrderSummary, UserProfile, ValidationError};
use dokan_db::{slots, Database};
use dokan_sync::{BackendApi, Credentials, Registration, SyncWarning};

use crate::error::{ApiError, ApiResult};
use crate::state::cart::{CartRefresh, CartStore};

/// Result of a successful sign-in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignIn {
    /// Units in the server cart that replaced the local one.
    pub cart_count: Option<i64>,
    /// The server cart could not be fetched; the local cart was kept.
    pub warning: Option<SyncWarning>,
}

#[derive(Clone)]
pub struct Session {
    db: Database,
    api: Arc<dyn BackendApi>,
    cart: CartStore,
}

impl Session {
    pub fn new(db: Database, api: Arc<dyn BackendApi>, cart: CartStore) -> Self {
        Session { db, api, cart }
    }

    /// The stored session token, if any.
    pub async fn token(&self) -> ApiResult<Option<String>> {
        Ok(self.db.slots().get(slots::TOKEN).await?)
    }

    pub async fn is_signed_in(&self) -> ApiResult<bool> {
        Ok(self.token().await?.is_some())
    }

    async fn require_token(&self) -> ApiResult<String> {
        self.token().await?.ok_or_else(ApiError::not_authenticated)
    }

    /// Stores a token without touching the cart.
    pub async fn store_token(&self, token: &str) -> ApiResult<()> {
        self.db.slots().put(slots::TOKEN, token.trim()).await?;
        Ok(())
    }

    // =========================================================================
    // Sign-in
    // =========================================================================

    /// Signs in with phone and password.
    ///
    /// The phone is normalized to `+8801XXXXXXXXX` before it is checked and
    /// sent.
    pub async fn login(&self, phone: &str, password: &str) -> ApiResult<SignIn> {
        let phone = normalize_phone(phone);
        validate_phone(&phone)?;
        validate_password(password)?;

        let credentials = Credentials {
            phone,
            password: password.to_string(),
        };
        let token = self.api.login(&credentials).await?;
        info!(phone = %credentials.phone, "Signed in");
        self.begin(&token).await
    }

    /// Creates an account and signs in to it.
    pub async fn register(&self, name: &str, phone: &str, password: &str) -> ApiResult<SignIn> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::Required {
                field: "name".to_string(),
            }
            .into());
        }
        let phone = normalize_phone(phone);
        validate_phone(&phone)?;
        validate_password(password)?;

        let registration = Registration {
            name: name.to_string(),
            phone,
            password: password.to_string(),
        };
        let token = self.api.register(&registration).await?;
        info!(phone = %registration.phone, "Account registered");
        self.begin(&token).await
    }

    /// Adopts a token obtained elsewhere (a payment redirect, another device).
    pub async fn use_token(&self, token: &str) -> ApiResult<SignIn> {
        if token.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "token".to_string(),
            }
            .into());
        }
        self.begin(token).await
    }

    async fn begin(&self, token: &str) -> ApiResult<SignIn> {
        self.store_token(token).await?;
        match self.cart.refresh().await {
            Ok(CartRefresh::Replaced { count }) => Ok(SignIn {
                cart_count: Some(count),
                warning: None,
            }),
            Ok(CartRefresh::SignedOut) => Ok(SignIn {
                cart_count: None,
                warning: None,
            }),
            Err(warning) => Ok(SignIn {
                cart_count: None,
                warning: Some(warning),
            }),
        }
    }

    /// Signs out and forgets everything tied to the session.
    ///
    /// Unsent cart changes are dropped; they belong to the old account.
    pub async fn logout(&self) -> ApiResult<()> {
        let discarded = self.db.cart_outbox().discard_pending().await?;
        self.db.slots().remove(slots::TOKEN).await?;
        self.db.slots().remove(slots::CHECKOUT_ITEMS).await?;
        self.cart.clear_local().await;
        info!(discarded, "Signed out");
        Ok(())
    }

    // =========================================================================
    // Account
    // =========================================================================

    pub async fn profile(&self) -> ApiResult<UserProfile> {
        let token = self.require_token().await?;
        Ok(self.api.fetch_profile(&token).await?)
    }

    /// The profile name, or `None` when signed out or unreachable.
    pub async fn customer_name(&self) -> Option<String> {
        let token = self.token().await.ok().flatten()?;
        match self.api.fetch_profile(&token).await {
            Ok(profile) if !profile.name.trim().is_empty() => Some(profile.name),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "Profile unavailable, using recipient name");
                None
            }
        }
    }

    /// Saves the default delivery address on the account.
    pub async fn save_address(&self, address: &Address) -> ApiResult<()> {
        let token = self.require_token().await?;
        validate_profile_address(address)?;
        self.api.save_address(&token, address).await?;
        info!("Address saved");
        Ok(())
    }

    /// Order history, newest first as the backend sends it.
    pub async fn orders(&self) -> ApiResult<Vec<OrderSummary>> {
        let token = self.require_token().await?;
        let orders = self.api.user_orders(&token).await?;
        debug!(count = orders.len(), "Order history loaded");
        Ok(orders)
    }

    /// Current status of one order. Works signed out for guest orders.
    pub async fn track(&self, order_id: &str) -> ApiResult<OrderSummary> {
        let order_id = order_id.trim();
        if order_id.is_empty() {
            return Err(ValidationError::Required {
                field: "orderId".to_string(),
            }
            .into());
        }
        let token = self.token().await?;
        let order = self.api.track_order(token.as_deref(), order_id).await?;
        if order.id.is_empty() {
            warn!(order_id, "Tracking reply carried no order id");
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::state::testing::{catalog, dhaka_address, sign_in, test_db, FakeBackend};
    use dokan_core::{CartItems, SizeKey};
    use dokan_sync::SyncError;

    async fn session() -> (Session, Arc<FakeBackend>, Database) {
        let db = test_db().await;
        let api = FakeBackend::new();
        let cart = CartStore::new(db.clone(), api.clone());
        (Session::new(db.clone(), api.clone(), cart), api, db)
    }

    #[tokio::test]
    async fn test_login_normalizes_phone_and_stores_token() {
        let (session, api, _) = session().await;

        session.login("017-1234 5678", "secret123").await.unwrap();

        assert_eq!(api.logins.lock().unwrap()[0].phone, "+8801712345678");
        assert_eq!(session.token().await.unwrap().as_deref(), Some("tok-login"));
    }

    #[tokio::test]
    async fn test_login_validation_never_reaches_backend() {
        let (session, api, _) = session().await;

        let err = session.login("01212345678", "secret123").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = session.login("01712345678", "short").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        assert!(api.logins.lock().unwrap().is_empty());
        assert!(!session.is_signed_in().await.unwrap());
    }

    #[tokio::test]
    async fn test_login_replaces_cart_with_server_view() {
        let (session, api, _) = session().await;
        let mut remote = CartItems::new();
        remote.add("tee", SizeKey::from("M"), 2);
        *api.remote_cart.lock().unwrap() = remote;

        let signed_in = session.login("01712345678", "secret123").await.unwrap();

        assert_eq!(signed_in.cart_count, Some(2));
        assert_eq!(session.cart.count(), 2);
    }

    #[tokio::test]
    async fn test_register_requires_name() {
        let (session, _, _) = session().await;
        let err = session.register("  ", "01712345678", "secret123").await.unwrap_err();
        assert_eq!(err.message, "name is required");
    }

    #[tokio::test]
    async fn test_password_not_set_surfaces_code() {
        let (session, api, _) = session().await;
        api.fail_with(|| SyncError::Rejected {
            message: "Set a password for this account".into(),
            code: Some(dokan_sync::PASSWORD_NOT_SET.into()),
        });

        let err = session.login("01712345678", "secret123").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PasswordNotSet);
    }

    #[tokio::test]
    async fn test_logout_forgets_session_state() {
        let (session, _, db) = session().await;
        sign_in(&db).await;
        session
            .cart
            .add_item(&catalog(), "cap", SizeKey::none(), 1)
            .await
            .unwrap();
        db.slots().put(slots::CHECKOUT_ITEMS, "[]").await.unwrap();

        session.logout().await.unwrap();

        assert!(!session.is_signed_in().await.unwrap());
        assert!(session.cart.is_empty());
        assert_eq!(db.cart_outbox().count_pending().await.unwrap(), 0);
        assert_eq!(db.slots().get(slots::CHECKOUT_ITEMS).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_account_calls_need_token() {
        let (session, _, _) = session().await;
        assert_eq!(
            session.profile().await.unwrap_err().code,
            ErrorCode::NotAuthenticated
        );
        assert_eq!(
            session.orders().await.unwrap_err().code,
            ErrorCode::NotAuthenticated
        );
        assert_eq!(
            session.save_address(&dhaka_address()).await.unwrap_err().code,
            ErrorCode::NotAuthenticated
        );
    }

    #[tokio::test]
    async fn test_save_address_requires_postal_code() {
        let (session, api, db) = session().await;
        sign_in(&db).await;
        let mut address = dhaka_address();
        address.postal_code.clear();

        let err = session.save_address(&address).await.unwrap_err();

        assert_eq!(err.message, "postalCode is required");
        assert!(api.saved_addresses.lock().unwrap().is_empty());

        session.save_address(&dhaka_address()).await.unwrap();
        assert_eq!(api.saved_addresses.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_track_works_signed_out() {
        let (session, _, _) = session().await;
        let order = session.track(" order-9 ").await.unwrap();
        assert_eq!(order.id, "order-9");

        assert!(session.track("").await.is_err());
    }

    #[tokio::test]
    async fn test_orders_lists_history() {
        let (session, _, db) = session().await;
        sign_in(&db).await;
        let orders = session.orders().await.unwrap();
        assert_eq!(orders.len(), 2);
        assert!(orders[0].status.is_open());
    }
}
