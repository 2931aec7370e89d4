//! Decision rules for actuator roles.
//!
//! A rule is a pure function of the latest fetched inputs and the previous
//! output. An absent input is a no-update signal: the previous output is
//! kept. Comparisons run on the raw numeric value the session delivered, so
//! an unexpected type or out-of-range reading goes through the same logic
//! instead of failing.

use serde::{Deserialize, Serialize};
use smartnode_env::Value;

/// How an actuator derives its output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionRule {
    /// Output `then` when the input is `>= threshold`, otherwise keep.
    AtLeast { threshold: f64, then: Value },

    /// Output `then` when the input is `> threshold`, otherwise keep.
    Above { threshold: f64, then: Value },

    /// Output the target of the first case whose key equals the input,
    /// otherwise keep.
    Map { cases: Vec<(Value, Value)> },

    /// Output `then` whenever any value is present.
    OnPresent { then: Value },

    /// Output the input capped at `max`.
    ClampMax { max: Value },

    /// One rule per input tag, applied in order; later inputs win.
    Each { rules: Vec<DecisionRule> },
}

impl DecisionRule {
    /// Number of inputs this rule consumes.
    pub fn arity(&self) -> usize {
        match self {
            DecisionRule::Each { rules } => rules.len(),
            _ => 1,
        }
    }

    /// Every output this rule can produce, or `None` when the output
    /// depends on the input value itself.
    pub fn targets(&self) -> Option<Vec<Value>> {
        match self {
            DecisionRule::AtLeast { then, .. }
            | DecisionRule::Above { then, .. }
            | DecisionRule::OnPresent { then } => Some(vec![*then]),
            DecisionRule::Map { cases } => Some(cases.iter().map(|(_, target)| *target).collect()),
            DecisionRule::ClampMax { .. } => None,
            DecisionRule::Each { rules } => {
                let mut all = Vec::new();
                for rule in rules {
                    all.extend(rule.targets()?);
                }
                Some(all)
            }
        }
    }

    /// Computes the next output.
    ///
    /// Single-input rules read `inputs[0]`; missing slots count as absent.
    pub fn apply(&self, inputs: &[Option<Value>], previous: Value) -> Value {
        match self {
            DecisionRule::Each { rules } => rules
                .iter()
                .enumerate()
                .fold(previous, |acc, (i, rule)| {
                    rule.apply(&[inputs.get(i).copied().flatten()], acc)
                }),
            _ => self.step(inputs.first().copied().flatten(), previous),
        }
    }

    fn step(&self, input: Option<Value>, previous: Value) -> Value {
        let Some(input) = input else {
            return previous;
        };

        match self {
            DecisionRule::AtLeast { threshold, then } => {
                if input.as_f64() >= *threshold {
                    *then
                } else {
                    previous
                }
            }
            DecisionRule::Above { threshold, then } => {
                if input.as_f64() > *threshold {
                    *then
                } else {
                    previous
                }
            }
            DecisionRule::Map { cases } => cases
                .iter()
                .find(|(key, _)| key.numerically_eq(&input))
                .map(|(_, target)| *target)
                .unwrap_or(previous),
            DecisionRule::OnPresent { then } => *then,
            DecisionRule::ClampMax { max } => {
                if input.as_f64() > max.as_f64() {
                    *max
                } else {
                    input
                }
            }
            // Nested under another `Each`: every sub-rule sees the same input.
            DecisionRule::Each { rules } => rules
                .iter()
                .fold(previous, |acc, rule| rule.step(Some(input), acc)),
        }
    }
}
