//! Common types for the smartnode session abstraction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Operator-assigned identity of a node.
///
/// Unlike tags, node identities are never generated: the surrounding
/// process must supply one before any loop starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a NodeId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of one value slot in the shared session namespace.
///
/// Tags are opaque and case-sensitive: `"Touch"` and `"touch"` are two
/// different slots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    /// Creates a tag.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the tag name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Tag {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Tag {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A value as carried by the session.
///
/// The session is dynamically typed: a tag may hold an integer, a float or
/// a boolean, and a consumer cannot assume which one it will observe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Value {
    /// Numeric view used by comparison rules.
    ///
    /// Integers, floats and booleans compare on the same number line
    /// (`true` is 1, `false` is 0), mirroring how the session hands
    /// values over without any schema.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::Bool(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Int(i) => i as f64,
            Value::Float(f) => f,
        }
    }

    /// Returns true if both values denote the same number.
    ///
    /// `Int(1)`, `Float(1.0)` and `Bool(true)` are all numerically equal.
    pub fn numerically_eq(&self, other: &Value) -> bool {
        self.as_f64() == other.as_f64()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:.3}", x),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

/// Per-fetch retrieval bounds.
///
/// Not a stored entity: every `fetch` call carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalPolicy {
    /// How long the session may search for a value
    pub ttl: Duration,

    /// How many attempts make up one fetch
    pub tries_per_fetch: u32,

    /// Maximum age of an accepted value (zero = any age)
    pub tolerable_staleness: Duration,
}

impl RetrievalPolicy {
    /// Creates a policy.
    pub fn new(ttl: Duration, tries_per_fetch: u32, tolerable_staleness: Duration) -> Self {
        Self {
            ttl,
            tries_per_fetch,
            tolerable_staleness,
        }
    }

    /// Delay between two attempts of one fetch.
    ///
    /// The ttl is spread evenly over the attempts; a policy with zero tries
    /// is treated as a single attempt.
    pub fn attempt_spacing(&self) -> Duration {
        self.ttl / self.tries_per_fetch.max(1)
    }

    /// Returns true if a value of the given age may be handed to a consumer.
    pub fn accepts_age(&self, age: Duration) -> bool {
        self.tolerable_staleness.is_zero() || age <= self.tolerable_staleness
    }
}

impl Default for RetrievalPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(180),
            tries_per_fetch: 3,
            tolerable_staleness: Duration::ZERO,
        }
    }
}
