//! Shared value session abstraction.

use async_trait::async_trait;
use crate::error::SessionError;
use crate::lifecycle::Lifecycle;
use crate::types::{NodeId, RetrievalPolicy, Tag, Value};

/// The publish/fetch surface of the distribution service a node runs on.
///
/// # Implementations
///
/// - **Production**: a client of the real distribution service
/// - **Simulation**: `MemorySession` in `smartnode_sim`, with fault injection
///
/// # Value Flow
///
/// ```text
/// Producer                   Session                    Consumer
///   |                           |                          |
///   |-- publish(tag, v) ------->|                          |
///   |                           |-- [propagation] -------->|
///   |                           |<------ fetch(tag, policy)|
///   |                           |-- Some(v) | None ------->|
/// ```
///
/// # Concurrency
///
/// One handle is shared (behind an `Arc`) by every loop of a node, so
/// implementations must accept concurrent `publish`/`fetch` calls without
/// external synchronization.
#[async_trait]
pub trait ValueSession: Send + Sync + 'static {
    /// Publishes the latest value of a tag.
    ///
    /// # Returns
    /// * `Ok(())` - Value handed to the session
    /// * `Err(SessionError)` - Transport failure; the caller should log and move on
    ///
    /// # Note
    /// Success does not guarantee that any consumer will observe the value.
    async fn publish(&self, tag: &Tag, value: Value) -> Result<(), SessionError>;

    /// Looks up the latest value of a tag within the given policy.
    ///
    /// # Returns
    /// * `Ok(Some(value))` - A value recent enough for the policy was found
    /// * `Ok(None)` - Nothing found within ttl/tries; this is not an error
    /// * `Err(SessionError)` - Transport failure
    ///
    /// # Blocking
    /// May suspend for up to `policy.ttl` while the session retries.
    async fn fetch(&self, tag: &Tag, policy: &RetrievalPolicy)
        -> Result<Option<Value>, SessionError>;

    /// Returns a handle that completes when the session shuts down.
    fn lifecycle(&self) -> Lifecycle;

    /// Returns the identity this session was opened with.
    fn local_id(&self) -> &NodeId;
}
