//! Declarative role definitions.
//!
//! A node is described by a table of [`NodeRole`] values; the supervisor
//! turns each entry into one running loop. Adding a sensor or actuator is
//! a data change, not a code change.

use crate::domain::ValueDomain;
use crate::error::ConfigError;
use crate::period::JitterPeriod;
use crate::rule::DecisionRule;
use serde::{Deserialize, Serialize};
use smartnode_env::{Tag, Value};
use std::fmt;

/// A simulated sensor: samples `domain` and publishes it under `tag`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducerRole {
    pub name: String,
    pub tag: Tag,
    pub domain: ValueDomain,
    pub period: JitterPeriod,
}

impl ProducerRole {
    /// Creates a producer with the default 1–2 s jitter.
    pub fn new(name: impl Into<String>, tag: impl Into<Tag>, domain: ValueDomain) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
            domain,
            period: JitterPeriod::default(),
        }
    }

    /// Overrides the iteration period.
    pub fn with_period(mut self, period: JitterPeriod) -> Self {
        self.period = period;
        self
    }
}

/// A simulated actuator: fetches `inputs`, applies `rule`, publishes `output`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerRole {
    pub name: String,
    pub inputs: Vec<Tag>,
    pub output: Tag,
    pub rule: DecisionRule,
    /// Output published until the rule first fires
    pub initial: Value,
    pub period: JitterPeriod,
}

impl ConsumerRole {
    /// Creates a consumer starting from output `0` with the default jitter.
    pub fn new<T: Into<Tag>>(
        name: impl Into<String>,
        inputs: impl IntoIterator<Item = T>,
        output: impl Into<Tag>,
        rule: DecisionRule,
    ) -> Self {
        Self {
            name: name.into(),
            inputs: inputs.into_iter().map(Into::into).collect(),
            output: output.into(),
            rule,
            initial: Value::Int(0),
            period: JitterPeriod::default(),
        }
    }

    /// Overrides the initial output.
    pub fn with_initial(mut self, initial: impl Into<Value>) -> Self {
        self.initial = initial.into();
        self
    }

    /// Overrides the iteration period.
    pub fn with_period(mut self, period: JitterPeriod) -> Self {
        self.period = period;
        self
    }
}

/// Discriminant of [`NodeRole`], for reports and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    Producer,
    Consumer,
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleKind::Producer => f.write_str("producer"),
            RoleKind::Consumer => f.write_str("consumer"),
        }
    }
}

/// One entry of a node's role table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum NodeRole {
    Producer(ProducerRole),
    Consumer(ConsumerRole),
}

impl NodeRole {
    /// Returns the role name.
    pub fn name(&self) -> &str {
        match self {
            NodeRole::Producer(p) => &p.name,
            NodeRole::Consumer(c) => &c.name,
        }
    }

    /// Returns the role kind.
    pub fn kind(&self) -> RoleKind {
        match self {
            NodeRole::Producer(_) => RoleKind::Producer,
            NodeRole::Consumer(_) => RoleKind::Consumer,
        }
    }

    /// Checks the role can run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name().is_empty() {
            return Err(ConfigError::invalid_role("<unnamed>", "role name is empty"));
        }

        match self {
            NodeRole::Producer(p) => {
                p.domain.validate()?;
                p.period.validate()
            }
            NodeRole::Consumer(c) => {
                if c.inputs.is_empty() {
                    return Err(ConfigError::invalid_role(&c.name, "no input tags"));
                }
                if c.rule.arity() != c.inputs.len() {
                    return Err(ConfigError::invalid_role(
                        &c.name,
                        format!(
                            "rule expects {} inputs, {} configured",
                            c.rule.arity(),
                            c.inputs.len()
                        ),
                    ));
                }
                c.period.validate()
            }
        }
    }
}

impl From<ProducerRole> for NodeRole {
    fn from(role: ProducerRole) -> Self {
        NodeRole::Producer(role)
    }
}

impl From<ConsumerRole> for NodeRole {
    fn from(role: ConsumerRole) -> Self {
        NodeRole::Consumer(role)
    }
}

/// Validates a whole role table: every role, and unique names.
pub fn validate_roles(roles: &[NodeRole]) -> Result<(), ConfigError> {
    let mut seen = std::collections::HashSet::new();
    for role in roles {
        role.validate()?;
        if !seen.insert(role.name()) {
            return Err(ConfigError::DuplicateRole(role.name().to_string()));
        }
    }
    Ok(())
}
