//! smartnode Core - Node Orchestration for Smart-Environment Devices
//!
//! A node runs a table of roles against one shared value session:
//! 1. **Producers** (simulated sensors): sample a value domain on a jittered
//!    period and publish it under a tag
//! 2. **Consumers** (simulated actuators): fetch input tags, fold them into
//!    a retained output through a decision rule, publish the output
//! 3. **Supervisor**: starts every role, stops them all when the session
//!    lifecycle ends and reports how each one finished
//!
//! Role tables are plain data; see [`NodeProfile`] for the built-in ones.

pub mod config;
pub mod consumer;
pub mod domain;
pub mod error;
pub mod period;
pub mod producer;
pub mod profiles;
pub mod report;
pub mod role;
pub mod rule;
pub mod supervisor;

#[cfg(test)]
mod testing;

// Re-export key types for convenience
pub use config::NodeConfig;
pub use consumer::ConsumerLoop;
pub use domain::ValueDomain;
pub use error::{ConfigError, NodeError};
pub use period::JitterPeriod;
pub use producer::ProducerLoop;
pub use profiles::NodeProfile;
pub use report::{LoopStats, NodeReport, RoleReport};
pub use role::{validate_roles, ConsumerRole, NodeRole, ProducerRole, RoleKind};
pub use rule::DecisionRule;
pub use supervisor::NodeSupervisor;
