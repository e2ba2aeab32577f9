//! # dokan-db: Local Storage for the Dokan Storefront
//!
//! Durable client-side state for the storefront. SQLite stands in for the
//! browser's local storage: the cart, the auth token and the buy-now list
//! survive restarts, and cart mutations made while signed in are queued
//! for the remote cart.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Dokan Storefront Data Flow                       │
//! │                                                                         │
//! │  dokan cart add p1 --size M                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     dokan-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │    │ SlotRepository │    │ 001_local_   │  │   │
//! │  │   │ SqlitePool    │◄───│ CartOutbox-    │    │   storage    │  │   │
//! │  │   │               │    │   Repository   │    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ~/.local/share/dokan/dokan.db (platform data dir)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dokan_db::{slots, Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("dokan.db")).await?;
//! db.slots().put(slots::TOKEN, "abc").await?;
//! let pending = db.cart_outbox().count_pending().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::outbox::{CartOutboxEntry, CartOutboxRepository};
pub use repository::slot::{slots, SlotRepository};
