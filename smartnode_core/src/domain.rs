//! Value domains sampled by producer roles.

use crate::error::ConfigError;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use smartnode_env::Value;

/// The finite set (or bounded range) a simulated sensor draws from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueDomain {
    /// Uniform choice over an enumerated set (boolean/categorical sensors)
    Choice { values: Vec<Value> },

    /// Uniform integer in `[low, high)`
    IntRange { low: i64, high: i64 },

    /// Uniform real in `[low, high]` (continuous sensors)
    FloatRange { low: f64, high: f64 },
}

impl ValueDomain {
    /// Creates a discrete domain.
    pub fn choice<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::Choice {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a half-open integer range domain.
    pub fn int_range(low: i64, high: i64) -> Self {
        Self::IntRange { low, high }
    }

    /// Creates a closed real range domain.
    pub fn float_range(low: f64, high: f64) -> Self {
        Self::FloatRange { low, high }
    }

    /// Checks that the domain can be sampled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            ValueDomain::Choice { values } if values.is_empty() => {
                Err(ConfigError::invalid_domain("choice domain has no values"))
            }
            ValueDomain::IntRange { low, high } if low >= high => Err(
                ConfigError::invalid_domain(format!("empty integer range [{}, {})", low, high)),
            ),
            ValueDomain::FloatRange { low, high }
                if !low.is_finite()
                    || !high.is_finite()
                    || low > high
                    || !(high - low).is_finite() =>
            {
                Err(ConfigError::invalid_domain(format!(
                    "bad real range [{}, {}]",
                    low, high
                )))
            }
            _ => Ok(()),
        }
    }

    /// Draws one value, or `None` if the domain is degenerate.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Value> {
        match self {
            ValueDomain::Choice { values } => values.choose(rng).copied(),
            ValueDomain::IntRange { low, high } => {
                if low >= high {
                    return None;
                }
                Some(Value::Int(rng.gen_range(*low..*high)))
            }
            ValueDomain::FloatRange { low, high } => {
                if !low.is_finite()
                    || !high.is_finite()
                    || low > high
                    || !(high - low).is_finite()
                {
                    return None;
                }
                if low == high {
                    return Some(Value::Float(*low));
                }
                Some(Value::Float(rng.gen_range(*low..=*high)))
            }
        }
    }

    /// Returns true if `value` could have been produced by this domain.
    pub fn contains(&self, value: &Value) -> bool {
        match (self, value) {
            (ValueDomain::Choice { values }, v) => values.contains(v),
            (ValueDomain::IntRange { low, high }, Value::Int(i)) => low <= i && i < high,
            (ValueDomain::FloatRange { low, high }, Value::Float(f)) => low <= f && f <= high,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_choice_only_yields_members() {
        let domain = ValueDomain::choice([0, 1]);
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let mut seen = [false; 2];
        for _ in 0..50 {
            let v = domain.sample(&mut rng).unwrap();
            assert!(domain.contains(&v));
            match v {
                Value::Int(0) => seen[0] = true,
                Value::Int(1) => seen[1] = true,
                other => panic!("unexpected value {:?}", other),
            }
        }
        assert!(seen[0] && seen[1]);
    }

    #[test]
    fn test_int_range_is_half_open() {
        let domain = ValueDomain::int_range(0, 100);
        assert!(domain.contains(&Value::Int(0)));
        assert!(domain.contains(&Value::Int(99)));
        assert!(!domain.contains(&Value::Int(100)));
        assert!(!domain.contains(&Value::Float(5.0)));
    }

    #[test]
    fn test_float_range_degenerate() {
        let domain = ValueDomain::float_range(3.5, 3.5);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let v = domain.sample(&mut rng).unwrap();
        approx::assert_relative_eq!(v.as_f64(), 3.5);
    }

    #[test]
    fn test_validate_rejects_empty_domains() {
        assert!(ValueDomain::Choice { values: vec![] }.validate().is_err());
        assert!(ValueDomain::int_range(5, 5).validate().is_err());
        assert!(ValueDomain::float_range(1.0, f64::NAN).validate().is_err());
        assert!(ValueDomain::float_range(0.0, 100.0).validate().is_ok());
    }

    #[test]
    fn test_degenerate_domains_do_not_panic() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert_eq!(ValueDomain::Choice { values: vec![] }.sample(&mut rng), None);
        assert_eq!(ValueDomain::int_range(10, 0).sample(&mut rng), None);
        assert_eq!(ValueDomain::float_range(2.0, 1.0).sample(&mut rng), None);
    }

    #[test]
    fn test_float_range_wider_than_f64_is_rejected() {
        let domain = ValueDomain::float_range(-1e308, 1e308);
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        assert!(domain.validate().is_err());
        assert_eq!(domain.sample(&mut rng), None);
        assert!(ValueDomain::float_range(0.0, 1e308).validate().is_ok());
    }

    proptest! {
        #[test]
        fn prop_int_samples_stay_in_range(seed in any::<u64>(), low in -1000i64..1000, width in 1i64..1000) {
            let domain = ValueDomain::int_range(low, low + width);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            for _ in 0..20 {
                let v = domain.sample(&mut rng).unwrap();
                prop_assert!(domain.contains(&v));
            }
        }

        #[test]
        fn prop_float_samples_stay_in_range(seed in any::<u64>(), low in -1e6f64..1e6, width in 0f64..1e6) {
            let domain = ValueDomain::float_range(low, low + width);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            for _ in 0..20 {
                let v = domain.sample(&mut rng).unwrap();
                prop_assert!(domain.contains(&v));
            }
        }
    }
}
