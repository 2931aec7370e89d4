//! Jittered iteration period shared by producer and consumer roles.
//!
//! Every loop sleeps a uniformly drawn delay at the top of each iteration so
//! that many loops sharing one session do not fire in lockstep.

use crate::error::ConfigError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Uniform delay in `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JitterPeriod {
    pub min: Duration,
    pub max: Duration,
}

impl JitterPeriod {
    /// Creates a jittered period.
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// A period without jitter.
    pub fn fixed(period: Duration) -> Self {
        Self {
            min: period,
            max: period,
        }
    }

    /// Checks the bounds are ordered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min > self.max {
            return Err(ConfigError::InvalidPeriod {
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    /// Draws the next delay.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let secs = rng.gen_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        // Rounding near Duration::MAX can overshoot.
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max)
            .clamp(self.min, self.max)
    }
}

impl Default for JitterPeriod {
    /// One to two seconds.
    fn default() -> Self {
        Self {
            min: Duration::from_secs(1),
            max: Duration::from_secs(2),
        }
    }
}
