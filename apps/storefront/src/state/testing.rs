//! In-memory backend and fixtures shared by the state tests.

use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::Notify;

use dokan_core::{
    Address, CartItems, CartMutation, CatalogIndex, Money, OrderStatus, OrderSummary,
    PlaceOrderPayload, Product, UserProfile,
};
use dokan_db::{slots, Database, DbConfig};
use dokan_sync::{BackendApi, Credentials, OrderReceipt, Registration, SyncError, SyncResult};

pub const TOKEN: &str = "tok-1";

pub async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

pub async fn sign_in(db: &Database) {
    db.slots().put(slots::TOKEN, TOKEN).await.unwrap();
}

/// Tee (M, L, XXL), a one-size Cap, and a discounted Panjabi.
pub fn products() -> Vec<Product> {
    vec![
        Product::new("tee", "Tee", Money::from_major(500)).with_sizes(["M", "L", "XXL"]),
        Product::new("cap", "Cap", Money::from_major(300)),
        Product::new("panjabi", "Panjabi", Money::from_major(1000))
            .with_sizes(["M", "L"])
            .with_discount(10.into()),
    ]
}

pub fn catalog() -> CatalogIndex {
    CatalogIndex::new(products())
}

pub fn dhaka_address() -> Address {
    Address {
        recipient_name: "Rahim".to_string(),
        phone: "01712345678".to_string(),
        address_line1: "House 1, Road 2, Dhanmondi".to_string(),
        district: "Dhaka".to_string(),
        postal_code: "1205".to_string(),
    }
}

/// Backend double. Every call succeeds unless a failure is set.
#[derive(Default)]
pub struct FakeBackend {
    pub catalog: Mutex<Vec<Product>>,
    pub remote_cart: Mutex<CartItems>,
    pub profile: Mutex<UserProfile>,
    pub applied: Mutex<Vec<CartMutation>>,
    pub placed: Mutex<Vec<PlaceOrderPayload>>,
    pub saved_addresses: Mutex<Vec<Address>>,
    pub logins: Mutex<Vec<Credentials>>,
    /// Token handed out by `place_order`, if any.
    pub issued_token: Mutex<Option<String>>,
    failure: Mutex<Option<fn() -> SyncError>>,
    /// When set, `place_order` waits for a notification before answering.
    pub order_gate: Mutex<Option<Arc<Notify>>>,
    pub order_started: Notify,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeBackend {
            catalog: Mutex::new(products()),
            ..Default::default()
        })
    }

    pub fn fail_with(&self, f: fn() -> SyncError) {
        *self.failure.lock().unwrap() = Some(f);
    }

    fn check(&self) -> SyncResult<()> {
        match *self.failure.lock().unwrap() {
            Some(f) => Err(f()),
            None => Ok(()),
        }
    }

    fn order(id: &str) -> OrderSummary {
        OrderSummary {
            id: id.to_string(),
            status: OrderStatus::Shipped,
            amount: Money::from_major(580),
            ..Default::default()
        }
    }
}

impl BackendApi for FakeBackend {
    fn fetch_catalog(&self) -> BoxFuture<'_, SyncResult<Vec<Product>>> {
        let result = self.check().map(|_| self.catalog.lock().unwrap().clone());
        async move { result }.boxed()
    }

    fn fetch_remote_cart<'a>(&'a self, _token: &'a str) -> BoxFuture<'a, SyncResult<CartItems>> {
        let result = self.check().map(|_| self.remote_cart.lock().unwrap().clone());
        async move { result }.boxed()
    }

    fn apply_cart_mutation<'a>(
        &'a self,
        _token: &'a str,
        mutation: &'a CartMutation,
    ) -> BoxFuture<'a, SyncResult<()>> {
        let result = self.check().map(|_| {
            self.applied.lock().unwrap().push(mutation.clone());
        });
        async move { result }.boxed()
    }

    fn place_order<'a>(
        &'a self,
        payload: &'a PlaceOrderPayload,
    ) -> BoxFuture<'a, SyncResult<OrderReceipt>> {
        async move {
            self.order_started.notify_one();
            let gate = self.order_gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            self.check()?;
            self.placed.lock().unwrap().push(payload.clone());
            Ok(OrderReceipt {
                order_id: format!("order-{}", self.placed.lock().unwrap().len()),
                token: self.issued_token.lock().unwrap().clone(),
                password_set: Some(true),
                message: None,
            })
        }
        .boxed()
    }

    fn fetch_profile<'a>(&'a self, _token: &'a str) -> BoxFuture<'a, SyncResult<UserProfile>> {
        let result = self.check().map(|_| self.profile.lock().unwrap().clone());
        async move { result }.boxed()
    }

    fn save_address<'a>(
        &'a self,
        _token: &'a str,
        address: &'a Address,
    ) -> BoxFuture<'a, SyncResult<()>> {
        let result = self.check().map(|_| {
            self.saved_addresses.lock().unwrap().push(address.clone());
        });
        async move { result }.boxed()
    }

    fn user_orders<'a>(&'a self, _token: &'a str) -> BoxFuture<'a, SyncResult<Vec<OrderSummary>>> {
        let result = self
            .check()
            .map(|_| vec![Self::order("order-1"), Self::order("order-2")]);
        async move { result }.boxed()
    }

    fn track_order<'a>(
        &'a self,
        _token: Option<&'a str>,
        order_id: &'a str,
    ) -> BoxFuture<'a, SyncResult<OrderSummary>> {
        let result = self.check().map(|_| Self::order(order_id));
        async move { result }.boxed()
    }

    fn login<'a>(&'a self, credentials: &'a Credentials) -> BoxFuture<'a, SyncResult<String>> {
        let result = self.check().map(|_| {
            self.logins.lock().unwrap().push(credentials.clone());
            "tok-login".to_string()
        });
        async move { result }.boxed()
    }

    fn register<'a>(&'a self, _registration: &'a Registration) -> BoxFuture<'a, SyncResult<String>> {
        let result = self.check().map(|_| "tok-new".to_string());
        async move { result }.boxed()
    }
}
