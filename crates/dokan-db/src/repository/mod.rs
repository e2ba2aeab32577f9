//! # Repository Module
//!
//! Repositories over the local storefront database.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CartStore / Session / CheckoutAssembler                               │
//! │       │                                                                 │
//! │       │  db.slots().put_json(slots::CART_ITEMS, &cart)                 │
//! │       ▼                                                                 │
//! │  SlotRepository            key/value slots (local storage)             │
//! │  CartOutboxRepository      mutations waiting for the remote cart       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod outbox;
pub mod slot;
