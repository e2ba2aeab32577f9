//! # Config Commands
//!
//! Shows the configuration the storefront is running with.

use serde::Serialize;
use tracing::debug;

use super::Render;
use crate::state::ConfigState;
use crate::Storefront;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigView {
    #[serde(flatten)]
    pub config: ConfigState,
    pub backend_url: String,
    pub sync_enabled: bool,
}

impl Render for ConfigView {
    fn render(&self, config: &ConfigState) -> String {
        let c = &self.config;
        let mut out = format!(
            "Store: {} ({})\nBackend: {}\nCart sync: {}\nOversize surcharge: {} on sizes starting with {}\nCart page delivery fee: {}\nDelivery zones:",
            c.store_name,
            c.currency_code,
            self.backend_url,
            if self.sync_enabled { "enabled" } else { "disabled" },
            config.format_currency(c.pricing.oversize_surcharge),
            c.pricing.oversize_prefix,
            config.format_currency(c.cart_delivery_fee),
        );
        for zone in &c.delivery.zones {
            let fallback = if zone.key == c.delivery.fallback { " (default)" } else { "" };
            out.push_str(&format!(
                "\n  {:<10} {:<20} {}{}",
                zone.key,
                zone.label,
                config.format_currency(zone.fee),
                fallback
            ));
        }
        out
    }
}

/// Gets the effective configuration, after file and environment overrides.
pub fn show(store: &Storefront) -> ConfigView {
    debug!("config show command");
    ConfigView {
        config: store.config.clone(),
        backend_url: store.sync_config.backend.url.clone(),
        sync_enabled: store.sync_config.is_sync_enabled(),
    }
}
