//! # Commands Module
//!
//! Handlers behind the `dokan` subcommands.
//!
//! ## Command Organization
//! ```text
//! commands/
//! ├── mod.rs       ◄─── You are here (output helpers)
//! ├── catalog.rs   ◄─── Product listing
//! ├── cart.rs      ◄─── Cart manipulation
//! ├── checkout.rs  ◄─── Drafts and order placement
//! ├── account.rs   ◄─── Sign-in, profile, orders
//! ├── config.rs    ◄─── Effective configuration
//! └── sync.rs      ◄─── Sync status and control
//! ```
//!
//! ## How Commands Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  main.rs (clap) ──► commands::cart::add(&store, ...)                    │
//! │                           │                                             │
//! │                           ▼                                             │
//! │                     ApiResult<CartView>                                 │
//! │                           │                                             │
//! │              ┌────────────┴────────────┐                                │
//! │              ▼                         ▼                                │
//! │      --json: serde_json          text: Render::render                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Handlers take the [`Storefront`](crate::Storefront) they need and return
//! serializable views; printing is left to the caller.

pub mod account;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod sync;

use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::state::ConfigState;

/// Human-readable form of a command result.
pub trait Render {
    fn render(&self, config: &ConfigState) -> String;
}

/// Prints a result as pretty JSON or as text.
pub fn print<T>(value: &T, config: &ConfigState, json: bool) -> ApiResult<()>
where
    T: Serialize + Render,
{
    if json {
        let out = serde_json::to_string_pretty(value)
            .map_err(|e| ApiError::internal(format!("Failed to encode output: {}", e)))?;
        println!("{}", out);
    } else {
        println!("{}", value.render(config));
    }
    Ok(())
}

/// Plain acknowledgement for commands with nothing else to show.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Done {
    pub ok: bool,
    pub message: String,
}

impl Done {
    pub fn new(message: impl Into<String>) -> Self {
        Done {
            ok: true,
            message: message.into(),
        }
    }
}

impl Render for Done {
    fn render(&self, _config: &ConfigState) -> String {
        self.message.clone()
    }
}
