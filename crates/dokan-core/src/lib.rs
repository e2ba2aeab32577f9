//! # dokan-core: Pure Storefront Logic for Dokan
//!
//! This crate is the **heart** of the storefront. It contains the pricing,
//! cart and delivery rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Dokan Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    storefront app (`dokan` CLI)                 │   │
//! │  │    CartStore ──► CheckoutAssembler ──► Session / Catalog        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ dokan-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  pricing  │  │   cart    │  │ delivery  │  │ checkout  │  │   │
//! │  │   │  Engine   │  │ CartItems │  │  Rules    │  │  Draft    │  │   │
//! │  │   │  Policy   │  │           │  │  Quote    │  │  Payload  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          dokan-db (local slots)  /  dokan-sync (backend)        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, LineSelection, Address, OrderSummary)
//! - [`money`] - Decimal money, rounded only for display
//! - [`pricing`] - Discount, oversize surcharge, totals
//! - [`catalog`] - Memoized product index
//! - [`cart`] - The `productId → size → quantity` state machine
//! - [`delivery`] - Zone table and destination resolution
//! - [`checkout`] - Draft assembly and order payload
//! - [`validation`] - Size, address, phone and password checks
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use dokan_core::{CartItems, CatalogIndex, Money, PricingEngine, Product, SizeKey};
//!
//! let catalog = CatalogIndex::new(vec![
//!     Product::new("p1", "Tee", Money::from_major(500)).with_sizes(["L", "XXL"]),
//! ]);
//!
//! let mut cart = CartItems::new();
//! cart.add("p1", SizeKey::from("XXL"), 1);
//!
//! let (lines, _unavailable) = catalog.join(cart.lines());
//! let totals = PricingEngine::default().totals(&lines, Money::from_major(80));
//! assert_eq!(totals.grand_total, Money::from_major(630));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod delivery;
pub mod error;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::CartItems;
pub use catalog::CatalogIndex;
pub use checkout::{CheckoutDraft, PlaceOrderPayload};
pub use delivery::{DeliveryQuote, DeliveryRules, DeliveryZone, DestinationInput};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use pricing::{PricingEngine, PricingPolicy};
pub use types::*;
