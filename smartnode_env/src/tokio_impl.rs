//! Production implementation of NodeContext using Tokio.

use crate::NodeContext;
use async_trait::async_trait;
use rand::RngCore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Production context backed by Tokio and OS entropy.
///
/// Time comes from the tokio clock (so it honours a paused test runtime),
/// randomness from the thread-local generator.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,
}

impl TokioContext {
    /// Creates a new TokioContext.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn with_rng<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&mut dyn RngCore) -> T,
    {
        let mut rng = rand::thread_rng();
        f(&mut rng)
    }

    fn seed(&self) -> u64 {
        // Production is not seeded
        0
    }
}
