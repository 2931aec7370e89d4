//! Error types for node configuration and supervision.
//!
//! - [`ConfigError`]: fatal at startup, raised before any loop runs.
//! - [`NodeError`]: raised by the supervisor itself.
//!
//! Per-iteration session failures never show up here; loops log and count
//! them (see [`LoopStats`](crate::LoopStats)).

use std::time::Duration;
use thiserror::Error;

/// Startup configuration errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The node was started without an identity
    #[error("missing node identity; set {0}")]
    MissingNodeId(String),

    /// A configuration value could not be parsed
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// A retrieval policy is unusable
    #[error("invalid retrieval policy: {0}")]
    InvalidPolicy(String),

    /// A producer domain cannot be sampled
    #[error("invalid value domain: {0}")]
    InvalidDomain(String),

    /// A jitter period has inverted bounds
    #[error("invalid period: min {min:?} > max {max:?}")]
    InvalidPeriod { min: Duration, max: Duration },

    /// A role definition is inconsistent
    #[error("invalid role {role}: {reason}")]
    InvalidRole { role: String, reason: String },

    /// Two roles share a name
    #[error("duplicate role name: {0}")]
    DuplicateRole(String),

    /// The requested profile does not exist
    #[error("unknown profile: {0}")]
    UnknownProfile(String),
}

impl ConfigError {
    /// Creates an invalid-value error.
    pub fn invalid_value(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates an invalid-domain error.
    pub fn invalid_domain(msg: impl Into<String>) -> Self {
        Self::InvalidDomain(msg.into())
    }

    /// Creates an invalid-role error.
    pub fn invalid_role(role: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRole {
            role: role.into(),
            reason: reason.into(),
        }
    }
}

/// Errors produced by the node supervisor.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum NodeError {
    /// The role table or configuration was rejected before start
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Some loops did not stop within the grace period and were aborted
    #[error("shutdown grace {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration
        grace: Duration,
        /// Roles that were still running
        stuck: Vec<String>,
    },
}

impl NodeError {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            NodeError::Config(_) => "node_config",
            NodeError::GraceExceeded { .. } => "node_grace_exceeded",
        }
    }
}
