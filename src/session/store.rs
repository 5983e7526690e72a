use anyhow::Result;
use async_trait::async_trait;

use crate::models::CompletionEvent;

/// Receives exactly one event per completed session. No partial progress.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn record_completion(&self, event: &CompletionEvent) -> Result<()>;
}
