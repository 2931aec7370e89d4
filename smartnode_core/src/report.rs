//! Loop statistics and node shutdown reports.

use crate::role::RoleKind;
use serde::{Deserialize, Serialize};
use smartnode_env::{NodeId, SessionEnd, Value};

/// Counters kept by one role loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopStats {
    /// Completed iterations (sleep + work)
    pub iterations: u64,

    /// Successful publishes
    pub published: u64,

    /// Publishes that failed with a session error
    pub publish_failures: u64,

    /// Fetches that returned a value
    pub fetched: u64,

    /// Fetches that found nothing within policy
    pub absent: u64,

    /// Fetches that failed with a session error
    pub fetch_failures: u64,

    /// Last value handed to `publish`
    pub last_value: Option<Value>,
}

impl LoopStats {
    /// Adds another loop's counters into this one.
    pub fn merge(&mut self, other: &LoopStats) {
        self.iterations += other.iterations;
        self.published += other.published;
        self.publish_failures += other.publish_failures;
        self.fetched += other.fetched;
        self.absent += other.absent;
        self.fetch_failures += other.fetch_failures;
    }
}

/// How one role ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleReport {
    pub name: String,
    pub kind: RoleKind,
    pub stats: LoopStats,

    /// Panic message if the loop crashed instead of stopping
    pub panic: Option<String>,
}

impl RoleReport {
    /// A loop that stopped on cancellation.
    pub fn stopped(name: impl Into<String>, kind: RoleKind, stats: LoopStats) -> Self {
        Self {
            name: name.into(),
            kind,
            stats,
            panic: None,
        }
    }

    /// A loop that panicked.
    pub fn panicked(name: impl Into<String>, kind: RoleKind, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            stats: LoopStats::default(),
            panic: Some(message.into()),
        }
    }
}

/// Summary returned by the supervisor after shutdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    pub node_id: NodeId,
    pub end: SessionEnd,

    /// Time between start and the end of the join, in seconds
    pub uptime_secs: f64,

    /// One entry per role, in role-table order
    pub roles: Vec<RoleReport>,
}

impl NodeReport {
    /// Sum of all role counters.
    pub fn totals(&self) -> LoopStats {
        let mut total = LoopStats::default();
        for role in &self.roles {
            total.merge(&role.stats);
        }
        total
    }

    /// Returns the report of a role by name.
    pub fn role(&self, name: &str) -> Option<&RoleReport> {
        self.roles.iter().find(|r| r.name == name)
    }

    /// Roles that crashed.
    pub fn panicked(&self) -> impl Iterator<Item = &RoleReport> {
        self.roles.iter().filter(|r| r.panic.is_some())
    }

    /// Pretty JSON rendering for CLIs.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
