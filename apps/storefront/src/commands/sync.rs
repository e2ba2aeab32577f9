//! # Sync Commands
//!
//! Status and control of the cart sync queue.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Commands                                    │
//! │                                                                         │
//! │  sync status   - Pending cart changes, last error, backend URL          │
//! │  sync flush    - Replays pending cart changes now                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use tracing::debug;

use dokan_sync::{FlushReport, SyncStatus};

use super::Render;
use crate::error::ApiResult;
use crate::state::ConfigState;
use crate::Storefront;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusView {
    #[serde(flatten)]
    pub status: SyncStatus,
    pub backend_url: String,
    pub signed_in: bool,
}

impl Render for SyncStatusView {
    fn render(&self, _config: &ConfigState) -> String {
        let mut out = format!(
            "Sync: {}\nBackend: {}\nSigned in: {}\nPending cart changes: {}",
            if self.status.enabled { "enabled" } else { "disabled" },
            self.backend_url,
            if self.signed_in { "yes" } else { "no" },
            self.status.pending
        );
        if let Some(at) = self.status.last_synced_at {
            out.push_str(&format!("\nLast synced: {}", at.format("%Y-%m-%d %H:%M:%S UTC")));
        }
        if let Some(error) = &self.status.last_error {
            out.push_str(&format!("\nLast error: {}", error));
        }
        out
    }
}

impl Render for FlushReport {
    fn render(&self, _config: &ConfigState) -> String {
        let mut out = format!("Synced {} cart changes.", self.synced);
        if self.failed > 0 {
            out.push_str(&format!(" {} failed and will be retried.", self.failed));
        }
        if self.exhausted > 0 {
            out.push_str(&format!(" {} gave up after repeated failures.", self.exhausted));
        }
        out
    }
}

/// Gets the current sync status.
pub async fn status(store: &Storefront) -> ApiResult<SyncStatusView> {
    debug!("sync status command");
    Ok(SyncStatusView {
        status: store.sync_status().await?,
        backend_url: store.sync_config.backend.url.clone(),
        signed_in: store.session.is_signed_in().await?,
    })
}

/// Replays pending cart changes now, ignoring any backoff.
pub async fn flush(store: &Storefront) -> ApiResult<FlushReport> {
    debug!("sync flush command");
    store.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::storefront;

    #[tokio::test]
    async fn test_status_reports_backend_and_session() {
        let (store, _) = storefront().await;

        let view = status(&store).await.unwrap();

        assert!(view.status.enabled);
        assert!(!view.signed_in);
        assert_eq!(view.status.pending, 0);
        assert!(view.render(&store.config).contains("http://localhost:4000"));
        store.shutdown().await;
    }
}
