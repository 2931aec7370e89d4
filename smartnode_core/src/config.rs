//! Node configuration.
//!
//! Every setting has a `SMARTNODE_*` environment variable. Only the node
//! identity is required; everything else falls back to a default.
//!
//! | Variable                  | Default               |
//! |---------------------------|-----------------------|
//! | `SMARTNODE_ID`            | required              |
//! | `SMARTNODE_PORT`          | random in 33334–65535 |
//! | `SMARTNODE_SERVER_HOST`   | `localhost`           |
//! | `SMARTNODE_SERVER_PORT`   | 33333                 |
//! | `SMARTNODE_NET_TTL/TPF/TTP` | 180 / 3 / 0.0       |
//! | `SMARTNODE_GET_TTL/TPF/TTP` | 180 / 3 / 0.0       |
//! | `SMARTNODE_GRACE`         | 5.0 s                 |
//!
//! The network policy configures the session itself; the get policy is
//! what every consumer fetches with.

use crate::error::ConfigError;
use crate::supervisor::DEFAULT_GRACE;
use rand::Rng;
use smartnode_env::{NodeId, RetrievalPolicy};
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_PREFIX: &str = "SMARTNODE";
pub const DEFAULT_SERVER_HOST: &str = "localhost";
pub const DEFAULT_SERVER_PORT: u16 = 33333;
pub const DEFAULT_TTL_SECS: u64 = 180;
pub const DEFAULT_TRIES: u32 = 3;
pub const DEFAULT_STALENESS_SECS: f64 = 0.0;

/// Ports a node picks from when none is configured.
pub const LOCAL_PORT_RANGE: RangeInclusive<u16> = 33334..=65535;

/// Resolved configuration of one node process.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    pub node_id: NodeId,
    pub port: u16,
    pub server_host: String,
    pub server_port: u16,
    pub net_policy: RetrievalPolicy,
    pub get_policy: RetrievalPolicy,
    pub grace: Duration,
}

impl NodeConfig {
    /// Creates a configuration with defaults and a random local port.
    pub fn new(node_id: impl Into<String>) -> Result<Self, ConfigError> {
        let node_id = node_id.into();
        if node_id.trim().is_empty() {
            return Err(ConfigError::MissingNodeId(env_key("ID")));
        }

        Ok(Self {
            node_id: NodeId::new(node_id),
            port: random_port(&mut rand::thread_rng()),
            server_host: DEFAULT_SERVER_HOST.to_string(),
            server_port: DEFAULT_SERVER_PORT,
            net_policy: RetrievalPolicy::default(),
            get_policy: RetrievalPolicy::default(),
            grace: DEFAULT_GRACE,
        })
    }

    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps a full variable
    /// name (`SMARTNODE_ID`) to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let id = lookup(&env_key("ID")).unwrap_or_default();
        let mut config = Self::new(id)?;

        if let Some(port) = parse_opt(&lookup, "PORT")? {
            config.port = port;
        }
        if let Some(host) = lookup(&env_key("SERVER_HOST")) {
            config.server_host = host;
        }
        config.server_port = parse_or(&lookup, "SERVER_PORT", DEFAULT_SERVER_PORT)?;
        config.net_policy = policy_from_env(&lookup, "NET")?;
        config.get_policy = policy_from_env(&lookup, "GET")?;

        let grace: f64 = parse_or(&lookup, "GRACE", DEFAULT_GRACE.as_secs_f64())?;
        config.grace = Duration::try_from_secs_f64(grace)
            .map_err(|e| ConfigError::invalid_value(env_key("GRACE"), grace.to_string(), e))?;

        config.validate()?;
        Ok(config)
    }

    /// Checks the resolved values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_id.as_str().trim().is_empty() {
            return Err(ConfigError::MissingNodeId(env_key("ID")));
        }
        if self.server_host.is_empty() {
            return Err(ConfigError::invalid_value(
                env_key("SERVER_HOST"),
                "",
                "host is empty",
            ));
        }
        for (name, policy) in [("network", &self.net_policy), ("get", &self.get_policy)] {
            if policy.tries_per_fetch == 0 {
                return Err(ConfigError::InvalidPolicy(format!(
                    "{name} policy needs at least one try per fetch"
                )));
            }
        }
        Ok(())
    }

    /// `host:port` of the session server.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

/// Picks a local port from [`LOCAL_PORT_RANGE`].
pub fn random_port<R: Rng + ?Sized>(rng: &mut R) -> u16 {
    rng.gen_range(LOCAL_PORT_RANGE)
}

/// Builds a retrieval policy from its raw configuration values.
pub fn policy_from_parts(
    ttl_secs: u64,
    tries: u32,
    staleness_secs: f64,
) -> Result<RetrievalPolicy, ConfigError> {
    if tries == 0 {
        return Err(ConfigError::InvalidPolicy(
            "tries per fetch must be at least 1".into(),
        ));
    }
    let staleness = Duration::try_from_secs_f64(staleness_secs).map_err(|e| {
        ConfigError::InvalidPolicy(format!("tolerable staleness {staleness_secs}: {e}"))
    })?;

    Ok(RetrievalPolicy::new(
        Duration::from_secs(ttl_secs),
        tries,
        staleness,
    ))
}

fn env_key(suffix: &str) -> String {
    format!("{ENV_PREFIX}_{suffix}")
}

fn parse_opt<T, F>(lookup: &F, suffix: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let key = env_key(suffix);
    match lookup(&key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::invalid_value(key, raw, e)),
    }
}

fn parse_or<T, F>(lookup: &F, suffix: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(lookup, suffix)?.unwrap_or(default))
}

fn policy_from_env<F>(lookup: &F, group: &str) -> Result<RetrievalPolicy, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    policy_from_parts(
        parse_or(lookup, &format!("{group}_TTL"), DEFAULT_TTL_SECS)?,
        parse_or(lookup, &format!("{group}_TPF"), DEFAULT_TRIES)?,
        parse_or(lookup, &format!("{group}_TTP"), DEFAULT_STALENESS_SECS)?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = NodeConfig::from_lookup(lookup(&[("SMARTNODE_ID", "light-1")])).unwrap();

        assert_eq!(config.node_id.as_str(), "light-1");
        assert!(LOCAL_PORT_RANGE.contains(&config.port));
        assert_eq!(config.server_addr(), "localhost:33333");
        assert_eq!(config.net_policy, RetrievalPolicy::default());
        assert_eq!(config.get_policy.ttl, Duration::from_secs(180));
        assert_eq!(config.get_policy.tries_per_fetch, 3);
        assert_eq!(config.grace, DEFAULT_GRACE);
    }

    #[test]
    fn test_missing_id_is_fatal() {
        let err = NodeConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::MissingNodeId("SMARTNODE_ID".into()));

        let err = NodeConfig::new("   ").unwrap_err();
        assert!(matches!(err, ConfigError::MissingNodeId(_)));
    }

    #[test]
    fn test_overrides() {
        let config = NodeConfig::from_lookup(lookup(&[
            ("SMARTNODE_ID", "display-2"),
            ("SMARTNODE_PORT", "40000"),
            ("SMARTNODE_SERVER_HOST", "10.0.0.7"),
            ("SMARTNODE_SERVER_PORT", "4444"),
            ("SMARTNODE_GET_TTL", "30"),
            ("SMARTNODE_GET_TPF", "5"),
            ("SMARTNODE_GET_TTP", "2.5"),
            ("SMARTNODE_GRACE", "0.25"),
        ]))
        .unwrap();

        assert_eq!(config.port, 40000);
        assert_eq!(config.server_addr(), "10.0.0.7:4444");
        assert_eq!(
            config.get_policy,
            RetrievalPolicy::new(Duration::from_secs(30), 5, Duration::from_millis(2_500))
        );
        assert_eq!(config.net_policy, RetrievalPolicy::default());
        assert_eq!(config.grace, Duration::from_millis(250));
    }

    #[test]
    fn test_zero_tries_is_rejected() {
        let err = NodeConfig::from_lookup(lookup(&[
            ("SMARTNODE_ID", "safety-1"),
            ("SMARTNODE_NET_TPF", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPolicy(_)));
    }

    #[test]
    fn test_unparsable_value_names_variable() {
        let err = NodeConfig::from_lookup(lookup(&[
            ("SMARTNODE_ID", "safety-1"),
            ("SMARTNODE_SERVER_PORT", "seventy"),
        ]))
        .unwrap_err();

        match err {
            ConfigError::InvalidValue { key, value, .. } => {
                assert_eq!(key, "SMARTNODE_SERVER_PORT");
                assert_eq!(value, "seventy");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_negative_staleness_is_rejected() {
        assert!(matches!(
            policy_from_parts(180, 3, -1.0),
            Err(ConfigError::InvalidPolicy(_))
        ));
        assert!(policy_from_parts(180, 3, f64::NAN).is_err());
    }

    #[test]
    fn test_port_out_of_range_is_rejected() {
        let err = NodeConfig::from_lookup(lookup(&[
            ("SMARTNODE_ID", "light-1"),
            ("SMARTNODE_PORT", "70000"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_random_port_in_range() {
        let mut rng = rand::thread_rng();
        for _ in 0..1_000 {
            assert!(LOCAL_PORT_RANGE.contains(&random_port(&mut rng)));
        }
    }
}
