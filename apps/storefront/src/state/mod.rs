//! # State Module
//!
//! Storefront state, one type per concern. Each command borrows only what it
//! needs.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    State Architecture                                   │
//! │                                                                         │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐  ┌─────────────┐ │
//! │  │ ConfigState  │  │ CatalogState │  │  CartStore   │  │   Session   │ │
//! │  │              │  │              │  │              │  │             │ │
//! │  │ pricing      │  │ RwLock<Arc<  │  │ Arc<Mutex<   │  │ token slot  │ │
//! │  │ delivery     │  │ CatalogIndex │  │  CartItems   │  │ profile     │ │
//! │  │ currency     │  │ >>           │  │ >>           │  │ orders      │ │
//! │  └──────────────┘  └──────────────┘  └──────────────┘  └─────────────┘ │
//! │          │                 │                 │                │        │
//! │          └─────────────────┴────────┬────────┴────────────────┘        │
//! │                                     ▼                                  │
//! │                          ┌────────────────────┐                        │
//! │                          │ CheckoutAssembler  │                        │
//! │                          └────────────────────┘                        │
//! │                                                                         │
//! │  THREAD SAFETY:                                                         │
//! │  • CartStore: mutations are closures under one lock                     │
//! │  • CatalogState: readers hold an Arc snapshot                           │
//! │  • ConfigState: read-only after startup                                 │
//! │  • CheckoutAssembler: one submission at a time                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod cart;
mod catalog;
mod checkout;
mod config;
mod session;
mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use cart::{CartEvent, CartRefresh, CartStore, CartSummary};
pub use catalog::CatalogState;
pub use checkout::{CheckoutAssembler, CheckoutSource, OrderConfirmation};
pub use config::{ConfigState, DeliveryTable};
pub use session::{Session, SignIn};
pub use sync::CartSyncEmitter;
