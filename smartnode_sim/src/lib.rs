//! smartnode Simulation Harness
//!
//! Runs a node's role table against an in-memory session on a paused tokio
//! clock, so a whole run takes milliseconds of wall time and replays
//! identically for one seed.
//!
//! All sources of non-determinism are controlled:
//! - **Time**: the tokio clock is paused and only jumps to the next timer
//! - **Session**: [`MemorySession`] with injectable drop rates, latency and
//!   blackouts ([`SessionController`])
//! - **Randomness**: jitter, sensor values and fault rolls all derive from
//!   one 64-bit seed
//!
//! # Usage
//!
//! ```ignore
//! use smartnode_core::NodeProfile;
//! use smartnode_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42, NodeProfile::Safety)
//!     .with_duration(30.0)
//!     .run(ScenarioId::FlakyPublish)?;
//! assert!(result.passed);
//! ```

mod context;
mod runner;
mod session;
pub mod scenarios;

pub use context::SimContext;
pub use runner::{ScenarioResult, ScenarioRunner, SimError};
pub use session::{FaultState, MemorySession, SessionController, Stamped};
