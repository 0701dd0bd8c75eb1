use async_trait::async_trait;

use crate::Result;

/// Best-effort text delivery to a destination (e.g. a Telegram chat id).
///
/// Implementations should bound their own latency. Callers log and drop
/// any error; delivery outcome never feeds back into alert state.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, destination: &str, message: &str) -> Result<()>;
}
