//! # dokan-sync: Backend Client and Cart Sync for the Dokan Storefront
//!
//! Every network call the storefront makes goes through this crate. Local
//! state stays authoritative: the backend is a read-through catalog, a
//! best-effort write-through remote cart, and the order/account service.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Layer Architecture                          │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │              State objects (dokan-storefront)                    │  │
//! │  │  CatalogState · CartStore · CheckoutAssembler · Session          │  │
//! │  └───────────────┬───────────────────────────────┬──────────────────┘  │
//! │                  │ direct calls                  │ queue + nudge       │
//! │                  ▼                               ▼                      │
//! │  ┌────────────────────────┐      ┌────────────────────────────────┐    │
//! │  │  Arc<dyn BackendApi>   │◄─────│  CartSyncProcessor             │    │
//! │  │                        │      │                                │    │
//! │  │  HttpBackend (reqwest) │      │  Reads cart_outbox (dokan-db)  │    │
//! │  │  JSON envelopes        │      │  Interval + nudge + flush      │    │
//! │  │  token header          │      │  Exponential backoff           │    │
//! │  └────────────────────────┘      │  SyncStatus on a watch channel │    │
//! │                                  └────────────────────────────────┘    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`client`] - `BackendApi` trait and its HTTP implementation
//! - [`config`] - Backend URL and sync queue settings
//! - [`error`] - Sync error types
//! - [`outbox`] - Cart sync processor
//! - [`protocol`] - Wire request/response types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dokan_sync::{CartSyncProcessor, HttpBackend, SyncConfig};
//!
//! let config = Arc::new(SyncConfig::load_or_default(None));
//! let api: Arc<dyn BackendApi> = Arc::new(HttpBackend::new(&config)?);
//!
//! let handle = CartSyncProcessor::new(db.clone(), api.clone(), config).spawn();
//! handle.nudge();
//! println!("pending: {}", handle.status().pending);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod client;
pub mod config;
pub mod error;
pub mod outbox;
pub mod protocol;

// =============================================================================
// Re-exports
// =============================================================================

pub use client::{BackendApi, HttpBackend};
pub use config::{BackendSettings, SyncConfig, SyncSettings};
pub use error::{SyncError, SyncResult, PASSWORD_NOT_SET};
pub use outbox::{
    CartSyncHandle, CartSyncProcessor, FlushReport, NoOpEmitter, SyncEventEmitter, SyncStatus,
    SyncWarning,
};
pub use protocol::{Credentials, OrderReceipt, Registration};
