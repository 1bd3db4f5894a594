//! Read-only access to stored hook records.

use std::sync::Arc;

use sendhooks_core::error::CoreError;
use sendhooks_core::hook::HookRecord;
use sendhooks_db::HookStore;

/// Query facade over a [`HookStore`] used by the HTTP handlers.
///
/// Store failures are reported as [`CoreError::Internal`]; the cause is kept
/// in the message for logging and never reaches a response body.
#[derive(Clone)]
pub struct HookQueryService {
    store: Arc<dyn HookStore>,
}

impl HookQueryService {
    pub fn new(store: Arc<dyn HookStore>) -> Self {
        Self { store }
    }

    /// Every stored record, oldest first.
    pub async fn list(&self) -> Result<Vec<HookRecord>, CoreError> {
        self.store
            .find_all()
            .await
            .map_err(|e| CoreError::Internal(format!("listing hooks: {e}")))
    }

    /// The record with `id`, or [`CoreError::NotFound`].
    pub async fn get(&self, id: &str) -> Result<HookRecord, CoreError> {
        self.store
            .find_by_id(id)
            .await
            .map_err(|e| CoreError::Internal(format!("fetching hook {id}: {e}")))?
            .ok_or_else(|| CoreError::NotFound {
                entity: "Hook",
                id: id.to_string(),
            })
    }

    /// Whether the backing store answers.
    pub async fn store_healthy(&self) -> bool {
        match self.store.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Hook store health check failed");
                false
            }
        }
    }
}
