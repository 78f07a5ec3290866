use std::sync::Arc;

use coach_core::store::Store;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub signing_secret: Arc<str>,
    pub replay_window_secs: i64,
}

impl AppState {
    /// Refuses an empty signing secret: an unverified receiver must never start.
    pub fn new(
        store: Store,
        signing_secret: impl Into<String>,
        replay_window_secs: i64,
    ) -> anyhow::Result<Self> {
        let secret = signing_secret.into();
        if secret.trim().is_empty() {
            anyhow::bail!("signing secret is empty");
        }
        if replay_window_secs <= 0 {
            anyhow::bail!("replay window must be positive, got {replay_window_secs}");
        }
        Ok(Self {
            store: Arc::new(store),
            signing_secret: Arc::from(secret),
            replay_window_secs,
        })
    }
}
