//! # Catalog State
//!
//! Holds the memoized [`CatalogIndex`] every pricing and checkout call reads.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  refresh()  GET /api/product/list ──► CatalogIndex ──► `catalog` slot   │
//! │                  │ (fails)                                              │
//! │                  └──► previous index kept, SyncWarning returned         │
//! │                                                                         │
//! │  hydrate()  `catalog` slot ──► CatalogIndex   (offline pricing)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Readers take an `Arc<CatalogIndex>` snapshot, so a refresh never changes
//! the catalog under a calculation that is already running.

use std::sync::{Arc, PoisonError, RwLock};

use dokan_core::{CatalogIndex, Product};
use dokan_db::{slots, Database};
use dokan_sync::{BackendApi, SyncError, SyncWarning};
use tracing::{error, info, warn};

pub struct CatalogState {
    db: Database,
    api: Arc<dyn BackendApi>,
    index: RwLock<Arc<CatalogIndex>>,
}

impl CatalogState {
    pub fn new(db: Database, api: Arc<dyn BackendApi>) -> Self {
        CatalogState {
            db,
            api,
            index: RwLock::new(Arc::new(CatalogIndex::default())),
        }
    }

    /// Current catalog snapshot.
    pub fn index(&self) -> Arc<CatalogIndex> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, index: CatalogIndex) {
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(index);
    }

    /// Loads the last fetched catalog from local storage.
    ///
    /// Returns the number of products loaded. An unreadable snapshot leaves
    /// the index as it was.
    pub async fn hydrate(&self) -> usize {
        match self.db.slots().get_json::<Vec<Product>>(slots::CATALOG).await {
            Ok(Some(products)) => {
                let index = CatalogIndex::new(products);
                let count = index.len();
                self.replace(index);
                info!(count, "Catalog hydrated from local snapshot");
                count
            }
            Ok(None) => 0,
            Err(e) => {
                warn!(error = %e, "Catalog snapshot unreadable, ignoring");
                0
            }
        }
    }

    /// Fetches the catalog and rebuilds the index.
    pub async fn refresh(&self) -> Result<usize, SyncWarning> {
        let products = match self.api.fetch_catalog().await {
            Ok(products) => products,
            Err(e) => {
                let warning = SyncWarning::new("catalog", &e);
                warn!(%warning, "Catalog refresh failed, keeping previous catalog");
                return Err(warning);
            }
        };

        if let Err(e) = self.db.slots().put_json(slots::CATALOG, &products).await {
            error!(error = %e, "Failed to store catalog snapshot");
        }

        let index = CatalogIndex::new(products);
        let count = index.len();
        self.replace(index);
        info!(count, "Catalog refreshed");
        Ok(count)
    }

    /// Makes sure some catalog is loaded: the local snapshot first, the
    /// backend only when there is none.
    pub async fn ensure_loaded(&self) -> Option<SyncWarning> {
        if !self.index().is_empty() || self.hydrate().await > 0 {
            return None;
        }
        self.refresh().await.err()
    }

    /// Like [`CatalogState::refresh`], but an empty result with no local
    /// snapshot is reported as a warning too.
    pub async fn refresh_or_fallback(&self) -> Option<SyncWarning> {
        match self.refresh().await {
            Ok(_) => None,
            Err(warning) => {
                if self.index().is_empty() {
                    self.hydrate().await;
                }
                if self.index().is_empty() {
                    Some(SyncWarning::new(
                        "catalog",
                        &SyncError::rejected(format!("no catalog available: {}", warning.message)),
                    ))
                } else {
                    Some(warning)
                }
            }
        }
    }
}
