//! In-memory value session with fault injection.

use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use smartnode_env::{
    Lifecycle, LifecycleController, NodeId, RetrievalPolicy, SessionError, Tag, Value,
    ValueSession,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// One stored publication.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stamped {
    pub value: Value,

    /// Session time of the publication
    pub at: Duration,
}

/// A value session held entirely in process memory.
///
/// - `publish` stores `(value, timestamp)` after the injected latency,
///   trying up to the network policy's `tries_per_fetch` times when the
///   injected failure rate drops an attempt
/// - `fetch` polls up to `tries_per_fetch` times, `ttl / tries` apart, and
///   returns the latest value whose age is within both the network TTL and
///   the fetch's tolerable staleness
/// - every call after the lifecycle has ended fails with
///   [`SessionError::Closed`]
///
/// Handles from [`attach`](Self::attach) share the store, faults and
/// lifecycle but carry their own node identity.
pub struct MemorySession {
    local_id: NodeId,
    shared: Arc<Shared>,
}

struct Shared {
    net_policy: RetrievalPolicy,
    store: Mutex<HashMap<Tag, Vec<Stamped>>>,
    faults: SessionController,
    lifecycle: LifecycleController,
    rng: Mutex<ChaCha8Rng>,
    start: Instant,
    late_calls: Mutex<u64>,
}

impl MemorySession {
    /// Creates a session with the default network policy.
    pub fn new(local_id: NodeId, seed: u64) -> Self {
        Self::with_network_policy(local_id, seed, RetrievalPolicy::default())
    }

    /// Creates a session whose stored values expire after `net_policy.ttl`.
    pub fn with_network_policy(local_id: NodeId, seed: u64, net_policy: RetrievalPolicy) -> Self {
        // Decorrelate fault rolls from the context's stream.
        let rng = ChaCha8Rng::seed_from_u64(seed.wrapping_mul(0x9e3779b97f4a7c15));
        Self {
            local_id,
            shared: Arc::new(Shared {
                net_policy,
                store: Mutex::new(HashMap::new()),
                faults: SessionController::new(),
                lifecycle: LifecycleController::new(),
                rng: Mutex::new(rng),
                start: Instant::now(),
                late_calls: Mutex::new(0),
            }),
        }
    }

    /// Another handle on the same session for a different node.
    pub fn attach(&self, local_id: NodeId) -> Self {
        Self {
            local_id,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Fault injection handle.
    pub fn faults(&self) -> SessionController {
        self.shared.faults.clone()
    }

    /// Ends the session (normally or cancelled).
    pub fn controller(&self) -> &LifecycleController {
        &self.shared.lifecycle
    }

    pub fn network_policy(&self) -> &RetrievalPolicy {
        &self.shared.net_policy
    }

    /// Every successful publication of `tag`, oldest first.
    pub fn history(&self, tag: &Tag) -> Vec<Stamped> {
        lock(&self.shared.store).get(tag).cloned().unwrap_or_default()
    }

    /// Tags published at least once.
    pub fn tags(&self) -> Vec<Tag> {
        let mut tags: Vec<Tag> = lock(&self.shared.store).keys().cloned().collect();
        tags.sort();
        tags
    }

    /// Calls that arrived after the lifecycle ended.
    pub fn late_calls(&self) -> u64 {
        *lock(&self.shared.late_calls)
    }

    fn now(&self) -> Duration {
        self.shared.start.elapsed()
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.shared.lifecycle.is_ended() {
            *lock(&self.shared.late_calls) += 1;
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    fn roll(&self, rate: f64) -> bool {
        rate > 0.0 && lock(&self.shared.rng).gen_bool(rate.clamp(0.0, 1.0))
    }

    fn lookup(&self, tag: &Tag, policy: &RetrievalPolicy) -> Option<Value> {
        let now = self.now();
        let store = lock(&self.shared.store);
        let latest = store.get(tag)?.last()?;
        let age = now.saturating_sub(latest.at);
        if age > self.shared.net_policy.ttl || !policy.accepts_age(age) {
            trace!(%tag, ?age, "Value too old");
            return None;
        }
        Some(latest.value)
    }
}

#[async_trait]
impl ValueSession for MemorySession {
    async fn publish(&self, tag: &Tag, value: Value) -> Result<(), SessionError> {
        self.ensure_open()?;
        let faults = self.shared.faults.snapshot();

        if !faults.latency.is_zero() {
            tokio::time::sleep(faults.latency).await;
        }

        let tries = self.shared.net_policy.tries_per_fetch.max(1);
        for attempt in 1..=tries {
            if self.roll(faults.publish_failure_rate) {
                debug!(%tag, attempt, "Publish attempt dropped");
                continue;
            }
            let stamped = Stamped {
                value,
                at: self.now(),
            };
            lock(&self.shared.store)
                .entry(tag.clone())
                .or_default()
                .push(stamped);
            return Ok(());
        }

        Err(SessionError::transport(format!(
            "publish of {} dropped {} times",
            tag, tries
        )))
    }

    async fn fetch(
        &self,
        tag: &Tag,
        policy: &RetrievalPolicy,
    ) -> Result<Option<Value>, SessionError> {
        self.ensure_open()?;

        let tries = policy.tries_per_fetch.max(1);
        let mut last_error = None;
        let mut reached = false;
        for attempt in 1..=tries {
            if attempt > 1 {
                tokio::time::sleep(policy.attempt_spacing()).await;
                self.ensure_open()?;
            }

            let faults = self.shared.faults.snapshot();
            if !faults.latency.is_zero() {
                tokio::time::sleep(faults.latency).await;
            }
            if faults.blackout {
                last_error = Some(SessionError::unreachable("memory session"));
                continue;
            }
            if self.roll(faults.fetch_failure_rate) {
                last_error = Some(SessionError::transport(format!("fetch of {} dropped", tag)));
                continue;
            }

            reached = true;
            if let Some(value) = self.lookup(tag, policy) {
                return Ok(Some(value));
            }
        }

        match last_error {
            Some(e) if !reached => Err(e),
            _ => Ok(None),
        }
    }

    fn lifecycle(&self) -> Lifecycle {
        self.shared.lifecycle.handle()
    }

    fn local_id(&self) -> &NodeId {
        &self.local_id
    }
}

/// Current fault settings.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FaultState {
    /// Probability (0.0 - 1.0) that a publish attempt is dropped
    pub publish_failure_rate: f64,

    /// Probability (0.0 - 1.0) that a fetch attempt fails
    pub fetch_failure_rate: f64,

    /// Delay added to every publish and fetch attempt
    pub latency: Duration,

    /// When set, every fetch attempt fails as unreachable
    pub blackout: bool,
}

/// Session controller for fault injection.
#[derive(Debug, Clone, Default)]
pub struct SessionController {
    state: Arc<Mutex<FaultState>>,
}

impl SessionController {
    /// Creates a controller with no faults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the publish drop rate.
    pub fn set_publish_failure_rate(&self, rate: f64) {
        lock(&self.state).publish_failure_rate = rate.clamp(0.0, 1.0);
    }

    /// Sets the fetch failure rate.
    pub fn set_fetch_failure_rate(&self, rate: f64) {
        lock(&self.state).fetch_failure_rate = rate.clamp(0.0, 1.0);
    }

    /// Sets the latency added to every operation.
    pub fn set_latency(&self, latency: Duration) {
        lock(&self.state).latency = latency;
    }

    /// Starts or stops a fetch blackout.
    pub fn set_blackout(&self, blackout: bool) {
        lock(&self.state).blackout = blackout;
    }

    /// Clears every fault.
    pub fn heal_all(&self) {
        *lock(&self.state) = FaultState::default();
    }

    pub fn snapshot(&self) -> FaultState {
        *lock(&self.state)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
