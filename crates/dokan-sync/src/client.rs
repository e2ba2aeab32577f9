//! # Backend Client
//!
//! The shop backend as a set of collaborators behind one object-safe trait.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CatalogState ──► fetch_catalog                                        │
//! │  CartStore    ──► fetch_remote_cart                                    │
//! │  Processor    ──► apply_cart_mutation   (cart_outbox replay)           │
//! │  Checkout     ──► place_order                                          │
//! │  Session      ──► login / register / fetch_profile / save_address      │
//! │                   user_orders / track_order                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Arc<dyn BackendApi>                                                   │
//! │       ├──► HttpBackend   (reqwest, production)                         │
//! │       └──► test doubles  (in-memory)                                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use dokan_core::{
    Address, CartItems, CartMutation, MutationKind, OrderSummary, PlaceOrderPayload, Product,
    UserProfile,
};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{
    endpoints, unwrap_reply, Ack, CartAddRequest, CartReply, CartUpdateRequest, Credentials,
    OrderReceipt, OrdersReply, ProductListReply, ProfileReply, Registration, TokenReply,
    TrackReply, TOKEN_HEADER,
};

// =============================================================================
// Backend Trait
// =============================================================================

/// Every backend call the storefront makes.
///
/// Methods return boxed futures so the trait stays object-safe and state
/// objects can share one `Arc<dyn BackendApi>`.
pub trait BackendApi: Send + Sync {
    fn fetch_catalog(&self) -> BoxFuture<'_, SyncResult<Vec<Product>>>;

    fn fetch_remote_cart<'a>(&'a self, token: &'a str) -> BoxFuture<'a, SyncResult<CartItems>>;

    fn apply_cart_mutation<'a>(
        &'a self,
        token: &'a str,
        mutation: &'a CartMutation,
    ) -> BoxFuture<'a, SyncResult<()>>;

    fn place_order<'a>(
        &'a self,
        payload: &'a PlaceOrderPayload,
    ) -> BoxFuture<'a, SyncResult<OrderReceipt>>;

    fn fetch_profile<'a>(&'a self, token: &'a str) -> BoxFuture<'a, SyncResult<UserProfile>>;

    fn save_address<'a>(
        &'a self,
        token: &'a str,
        address: &'a Address,
    ) -> BoxFuture<'a, SyncResult<()>>;

    fn user_orders<'a>(&'a self, token: &'a str) -> BoxFuture<'a, SyncResult<Vec<OrderSummary>>>;

    fn track_order<'a>(
        &'a self,
        token: Option<&'a str>,
        order_id: &'a str,
    ) -> BoxFuture<'a, SyncResult<OrderSummary>>;

    /// Returns the session token.
    fn login<'a>(&'a self, credentials: &'a Credentials) -> BoxFuture<'a, SyncResult<String>>;

    /// Returns the session token of the new account.
    fn register<'a>(&'a self, registration: &'a Registration)
        -> BoxFuture<'a, SyncResult<String>>;
}

// =============================================================================
// HTTP Implementation
// =============================================================================

/// `BackendApi` over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(HttpBackend {
            client,
            base_url: config.backend_url()?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> SyncResult<RequestBuilder> {
        let url = self.base_url.join(path)?;
        debug!(method = %method, url = %url, authenticated = token.is_some(), "Backend request");

        let mut builder = self.client.request(method, url);
        if let Some(token) = token {
            builder = builder.header(TOKEN_HEADER, token);
        }
        Ok(builder)
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> SyncResult<T> {
        let response = builder.send().await?;
        let status = response.status();

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => Value::Null,
        };

        unwrap_reply(status.as_u16(), body)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, token: Option<&str>) -> SyncResult<T> {
        let builder = self.request(Method::GET, path, token)?;
        self.send(builder).await
    }

    async fn post<B, T>(&self, path: &str, token: Option<&str>, body: &B) -> SyncResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.request(Method::POST, path, token)?.json(body);
        self.send(builder).await
    }
}

impl BackendApi for HttpBackend {
    fn fetch_catalog(&self) -> BoxFuture<'_, SyncResult<Vec<Product>>> {
        async move {
            let reply: ProductListReply = self.get(endpoints::PRODUCT_LIST, None).await?;
            let products = reply.into_products();
            debug!(count = products.len(), "Catalog fetched");
            Ok(products)
        }
        .boxed()
    }

    fn fetch_remote_cart<'a>(&'a self, token: &'a str) -> BoxFuture<'a, SyncResult<CartItems>> {
        async move {
            let reply: CartReply = self
                .post(endpoints::CART_GET, Some(token), &serde_json::json!({}))
                .await?;
            Ok(reply.into_cart())
        }
        .boxed()
    }

    fn apply_cart_mutation<'a>(
        &'a self,
        token: &'a str,
        mutation: &'a CartMutation,
    ) -> BoxFuture<'a, SyncResult<()>> {
        async move {
            match mutation.kind {
                // The remote add endpoint increments by exactly one unit.
                MutationKind::Add => {
                    if mutation.quantity < 1 {
                        warn!(item_id = %mutation.item_id, quantity = mutation.quantity, "Ignoring non-positive remote add");
                    }
                    let body = CartAddRequest {
                        item_id: &mutation.item_id,
                        size: &mutation.size,
                    };
                    for _ in 0..mutation.quantity.max(0) {
                        let _: Ack = self.post(endpoints::CART_ADD, Some(token), &body).await?;
                    }
                }
                MutationKind::Set => {
                    let body = CartUpdateRequest {
                        item_id: &mutation.item_id,
                        size: &mutation.size,
                        quantity: mutation.quantity,
                    };
                    let _: Ack = self.post(endpoints::CART_UPDATE, Some(token), &body).await?;
                }
            }
            Ok(())
        }
        .boxed()
    }

    fn place_order<'a>(
        &'a self,
        payload: &'a PlaceOrderPayload,
    ) -> BoxFuture<'a, SyncResult<OrderReceipt>> {
        async move {
            let receipt: OrderReceipt = self.post(endpoints::ORDER_PLACE, None, payload).await?;
            if receipt.order_id.is_empty() {
                warn!("Order accepted without an order id");
            }
            Ok(receipt)
        }
        .boxed()
    }

    fn fetch_profile<'a>(&'a self, token: &'a str) -> BoxFuture<'a, SyncResult<UserProfile>> {
        async move {
            let reply: ProfileReply = self.get(endpoints::USER_PROFILE, Some(token)).await?;
            Ok(reply.user)
        }
        .boxed()
    }

    fn save_address<'a>(
        &'a self,
        token: &'a str,
        address: &'a Address,
    ) -> BoxFuture<'a, SyncResult<()>> {
        async move {
            let _: Ack = self.post(endpoints::USER_ADDRESS, Some(token), address).await?;
            Ok(())
        }
        .boxed()
    }

    fn user_orders<'a>(&'a self, token: &'a str) -> BoxFuture<'a, SyncResult<Vec<OrderSummary>>> {
        async move {
            let reply: OrdersReply = self
                .post(endpoints::USER_ORDERS, Some(token), &serde_json::json!({}))
                .await?;
            Ok(reply.orders)
        }
        .boxed()
    }

    fn track_order<'a>(
        &'a self,
        token: Option<&'a str>,
        order_id: &'a str,
    ) -> BoxFuture<'a, SyncResult<OrderSummary>> {
        async move {
            let mut url = self.base_url.join(endpoints::ORDER_TRACK)?;
            url.path_segments_mut()
                .map_err(|_| SyncError::InvalidUrl(self.base_url.to_string()))?
                .pop_if_empty()
                .push(order_id);

            debug!(url = %url, "Backend request");
            let mut builder = self.client.get(url);
            if let Some(token) = token {
                builder = builder.header(TOKEN_HEADER, token);
            }
            let reply: TrackReply = self.send(builder).await?;
            Ok(reply.order)
        }
        .boxed()
    }

    fn login<'a>(&'a self, credentials: &'a Credentials) -> BoxFuture<'a, SyncResult<String>> {
        async move {
            let reply: TokenReply = self.post(endpoints::USER_LOGIN, None, credentials).await?;
            reply.into_token()
        }
        .boxed()
    }

    fn register<'a>(
        &'a self,
        registration: &'a Registration,
    ) -> BoxFuture<'a, SyncResult<String>> {
        async move {
            let reply: TokenReply = self
                .post(endpoints::USER_REGISTER, None, registration)
                .await?;
            reply.into_token()
        }
        .boxed()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use dokan_core::{CheckoutDraft, SizeKey};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> HttpBackend {
        let mut config = SyncConfig::default();
        config.backend.url = server.uri();
        config.backend.timeout_secs = 2;
        HttpBackend::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_catalog() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/product/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "products": [
                    {"_id": "p1", "name": "Panjabi", "price": 1200, "discount": "10", "sizes": ["M", "XXL"]},
                    {"_id": "p2", "name": "Cap", "price": null}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let products = backend(&server).fetch_catalog().await.unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].sizes, vec!["M", "XXL"]);
        assert!(products[1].price.is_zero());
    }

    #[tokio::test]
    async fn test_cart_mutations_send_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/cart/add"))
            .and(header("token", "tok"))
            .and(body_json(json!({"itemId": "p1", "size": "M"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/cart/update"))
            .and(header("token", "tok"))
            .and(body_json(json!({"itemId": "p2", "size": "", "quantity": 0})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;

        let api = backend(&server);
        api.apply_cart_mutation("tok", &CartMutation::add("p1", SizeKey::from("M"), 2))
            .await
            .unwrap();
        api.apply_cart_mutation("tok", &CartMutation::set("p2", SizeKey::none(), 0))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_fetch_remote_cart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/cart/get"))
            .and(header("token", "tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "cartData": {"p1": {"M": 3}}
            })))
            .mount(&server)
            .await;

        let cart = backend(&server).fetch_remote_cart("tok").await.unwrap();
        assert_eq!(cart.quantity("p1", &SizeKey::from("M")), 3);
    }

    #[tokio::test]
    async fn test_place_order_contract() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/order/place"))
            .and(body_json(json!({
                "phone": "01712345678",
                "name": "Rahim",
                "items": [{"_id": "p1", "size": "M", "quantity": 2}],
                "address": {
                    "recipientName": "Rahim",
                    "phone": "01712345678",
                    "addressLine1": "House 1, Road 2",
                    "district": "Dhaka",
                    "postalCode": ""
                },
                "deliveryOverride": {"area": "inside", "fee": 80, "label": "Inside Dhaka City"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "orderId": "o-1",
                "token": "new-token",
                "passwordSet": false
            })))
            .expect(1)
            .mount(&server)
            .await;

        let catalog = dokan_core::CatalogIndex::new(vec![Product::new(
            "p1",
            "Tee",
            dokan_core::Money::from_major(500),
        )
        .with_sizes(["M"])]);
        let address = Address {
            recipient_name: "Rahim".into(),
            phone: "01712345678".into(),
            address_line1: "House 1, Road 2".into(),
            district: "Dhaka".into(),
            postal_code: String::new(),
        };
        let draft = CheckoutDraft::assemble(
            &dokan_core::PricingEngine::default(),
            &dokan_core::DeliveryRules::default(),
            &catalog,
            vec![dokan_core::LineSelection::new("p1", SizeKey::from("M"), 2)],
            address,
            None,
        );
        let payload = draft.payload(None).unwrap();

        let receipt = backend(&server).place_order(&payload).await.unwrap();
        assert_eq!(receipt.order_id, "o-1");
        assert_eq!(receipt.token.as_deref(), Some("new-token"));
        assert_eq!(receipt.password_set, Some(false));
    }

    #[tokio::test]
    async fn test_rejected_order_surfaces_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/order/place"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "success": false,
                "message": "Product p9 is no longer available"
            })))
            .mount(&server)
            .await;

        let payload = PlaceOrderPayload {
            phone: "01712345678".into(),
            name: "Rahim".into(),
            items: Vec::new(),
            address: Address::default(),
            delivery_override: dokan_core::DeliveryRules::default()
                .quote(&dokan_core::DestinationInput::default()),
        };

        let err = backend(&server).place_order(&payload).await.unwrap_err();
        assert_eq!(err.to_string(), "Product p9 is no longer available");
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let err = backend(&server).fetch_catalog().await.unwrap_err();
        assert!(matches!(err, SyncError::Status { status: 502, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_login_password_not_set() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/user/login"))
            .and(body_json(json!({"phone": "+8801712345678", "password": "secret123"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "code": "PASSWORD_NOT_SET",
                "message": "Please set a password"
            })))
            .mount(&server)
            .await;

        let credentials = Credentials {
            phone: "+8801712345678".into(),
            password: "secret123".into(),
        };
        let err = backend(&server).login(&credentials).await.unwrap_err();
        assert!(err.is_password_not_set());
    }

    #[tokio::test]
    async fn test_track_order_and_history() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/order/track/o-1"))
            .and(header("token", "tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "order": {"_id": "o-1", "status": "Out for delivery", "amount": 630, "date": 1714000000000_i64}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/order/userorders"))
            .and(header("token", "tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "orders": [{"_id": "o-1", "status": "delivered", "amount": "630"}]
            })))
            .mount(&server)
            .await;

        let api = backend(&server);
        let order = api.track_order(Some("tok"), "o-1").await.unwrap();
        assert_eq!(order.status, dokan_core::OrderStatus::OutForDelivery);
        assert!(order.date.is_some());

        let orders = api.user_orders("tok").await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, dokan_core::OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn test_profile_and_address() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/user/profile"))
            .and(header("token", "tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "user": {"name": "Rahim", "phone": "+8801712345678", "address": {"district": "Dhaka"}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/user/address"))
            .and(header("token", "tok"))
            .and(body_json(json!({
                "recipientName": "Rahim",
                "phone": "01712345678",
                "addressLine1": "House 1",
                "district": "Dhaka",
                "postalCode": "1207"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;

        let api = backend(&server);
        let profile = api.fetch_profile("tok").await.unwrap();
        assert_eq!(profile.name, "Rahim");
        assert_eq!(profile.address.district, "Dhaka");

        let address = Address {
            recipient_name: "Rahim".into(),
            phone: "01712345678".into(),
            address_line1: "House 1".into(),
            district: "Dhaka".into(),
            postal_code: "1207".into(),
        };
        api.save_address("tok", &address).await.unwrap();
    }
}
