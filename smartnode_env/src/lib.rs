//! smartnode Environment Abstraction Layer
//!
//! This crate provides the seam between smartnode's orchestration logic and
//! the world it runs in, so the same producer/consumer loops run against a
//! **Production** session (tokio, real distribution service) or a
//! **Simulation** session (in-memory, seeded randomness, paused clock).
//!
//! # Core Concept: the shared session
//!
//! Every node talks to exactly one [`ValueSession`]:
//! - `publish(tag, value)` writes the latest value of a tag
//! - `fetch(tag, policy)` looks a tag up within a [`RetrievalPolicy`]
//! - `lifecycle()` completes (normally or cancelled) when the session ends
//!
//! Time and randomness come from a [`NodeContext`], so jittered sleeps and
//! sampled sensor values become reproducible from a single seed.
//!
//! # Example
//!
//! ```ignore
//! use smartnode_env::{NodeContext, ValueSession, Tag, Value};
//!
//! async fn sensor<Ctx: NodeContext, S: ValueSession>(ctx: &Ctx, session: &S) {
//!     let tag = Tag::new("temperature");
//!     loop {
//!         tokio::select! {
//!             _ = session.lifecycle().ended() => break,
//!             _ = ctx.sleep(Duration::from_secs(1)) => {
//!                 let _ = session.publish(&tag, Value::Int(21)).await;
//!             }
//!         }
//!     }
//! }
//! ```

mod context;
mod error;
mod lifecycle;
mod session;
mod tokio_impl;
mod types;

pub use context::NodeContext;
pub use error::SessionError;
pub use lifecycle::{Lifecycle, LifecycleController, SessionEnd};
pub use session::ValueSession;
pub use tokio_impl::TokioContext;
pub use types::{NodeId, RetrievalPolicy, Tag, Value};
