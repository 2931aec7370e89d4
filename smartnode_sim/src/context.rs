//! Simulation context implementing NodeContext for deterministic runs.

use async_trait::async_trait;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use smartnode_env::NodeContext;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Simulation context backed by the tokio clock and a seeded RNG.
///
/// Under a paused runtime the clock only moves when every task is waiting
/// on a timer, so with one seed a run replays identically:
/// - `now`/`sleep` follow the (virtual) tokio clock
/// - all jitter and sensor samples come from one ChaCha8 stream
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Deterministic RNG shared by every role
    rng: Arc<Mutex<ChaCha8Rng>>,

    /// Virtual time zero
    start: Instant,
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
            start: Instant::now(),
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            rng: Arc::clone(&self.rng),
            start: self.start,
        }
    }
}

#[async_trait]
impl NodeContext for SimContext {
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
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *rng)
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}
