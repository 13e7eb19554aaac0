use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Notified after a successful fill so the profile layer can stamp
/// `lastUsed`. Receives the page address with its fragment removed.
#[async_trait]
pub trait LastUsedHook: Send + Sync {
    async fn mark_used(&self, address: &str, at: DateTime<Utc>);
}
