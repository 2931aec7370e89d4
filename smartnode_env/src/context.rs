//! Core environment context trait for smartnode loops.

use async_trait::async_trait;
use rand::RngCore;
use std::time::Duration;

/// The interface for time and randomness.
///
/// This trait abstracts the "real world" so that role loops can run in
/// both production (tokio clock, OS entropy) and simulation (paused clock,
/// seeded RNG) environments.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, `thread_rng`
/// - **Simulation**: `SimContext` - wraps `tokio::time`, `ChaCha8Rng(seed)`
///
/// # Determinism
///
/// Jitter delays and sampled sensor values both go through
/// [`with_rng`](Self::with_rng), so a seeded context reproduces a run.
#[async_trait]
pub trait NodeContext: Send + Sync + 'static {
    /// Returns the monotonic time since context creation.
    fn now(&self) -> Duration;

    /// Suspends execution for the given duration.
    async fn sleep(&self, duration: Duration);

    /// Runs `f` with the context's random number generator.
    ///
    /// The generator must not be held across an await point.
    fn with_rng<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&mut dyn RngCore) -> T;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}
