//! smartnode Agent - one smart-environment node process
//!
//! Runs the roles of a built-in profile against the node's value session
//! until the process is signalled (session cancelled) or the optional run
//! time elapses (session completed), then prints the shutdown report.
//!
//! Every option can also be set through its `SMARTNODE_*` variable.

use anyhow::{Context, Result};
use clap::Parser;
use smartnode_core::config::ENV_PREFIX;
use smartnode_core::{ConfigError, NodeConfig, NodeError, NodeProfile, NodeReport, NodeSupervisor};
use smartnode_env::TokioContext;
use smartnode_sim::MemorySession;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod signals;

/// smartnode node process
#[derive(Parser, Debug)]
#[command(name = "smartnode-agent")]
#[command(about = "Run a smartnode profile until the session ends", long_about = None)]
struct Args {
    /// Unique node identity (required)
    #[arg(long, env = "SMARTNODE_ID")]
    id: Option<String>,

    /// Local port (random in 33334-65535 when unset)
    #[arg(long, env = "SMARTNODE_PORT")]
    port: Option<u16>,

    /// Session server host
    #[arg(long, env = "SMARTNODE_SERVER_HOST", default_value = "localhost")]
    server_host: String,

    /// Session server port
    #[arg(long, env = "SMARTNODE_SERVER_PORT", default_value_t = 33333)]
    server_port: u16,

    /// Network time-to-live of published values, in seconds
    #[arg(long, env = "SMARTNODE_NET_TTL", default_value_t = 180)]
    net_ttl: u64,

    /// Network tries per operation
    #[arg(long, env = "SMARTNODE_NET_TPF", default_value_t = 3)]
    net_tpf: u32,

    /// Network tolerable staleness in seconds (0 = any age)
    #[arg(long, env = "SMARTNODE_NET_TTP", default_value_t = 0.0)]
    net_ttp: f64,

    /// Fetch time-to-live in seconds
    #[arg(long, env = "SMARTNODE_GET_TTL", default_value_t = 180)]
    get_ttl: u64,

    /// Fetch tries per call
    #[arg(long, env = "SMARTNODE_GET_TPF", default_value_t = 3)]
    get_tpf: u32,

    /// Fetch tolerable staleness in seconds (0 = any age)
    #[arg(long, env = "SMARTNODE_GET_TTP", default_value_t = 0.0)]
    get_ttp: f64,

    /// Seconds stopped roles get before they are aborted
    #[arg(long, env = "SMARTNODE_GRACE", default_value_t = 5.0)]
    grace: f64,

    /// Role table to run (light, display, safety, server)
    #[arg(short, long, env = "SMARTNODE_PROFILE", default_value = "light")]
    profile: String,

    /// Complete the session after this many seconds instead of waiting for a signal
    #[arg(long)]
    duration: Option<f64>,

    /// Seed for the session's fault rolls (random when unset)
    #[arg(long, env = "SMARTNODE_SEED")]
    seed: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Print the shutdown report as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    /// Resolves the node configuration through the same path as
    /// `NodeConfig::from_env`, with clap supplying the values.
    fn config(&self) -> Result<NodeConfig, ConfigError> {
        NodeConfig::from_lookup(|key| self.lookup(key))
    }

    fn lookup(&self, key: &str) -> Option<String> {
        let suffix = key.strip_prefix(ENV_PREFIX)?.strip_prefix('_')?;
        match suffix {
            "ID" => self.id.clone(),
            "PORT" => self.port.map(|p| p.to_string()),
            "SERVER_HOST" => Some(self.server_host.clone()),
            "SERVER_PORT" => Some(self.server_port.to_string()),
            "NET_TTL" => Some(self.net_ttl.to_string()),
            "NET_TPF" => Some(self.net_tpf.to_string()),
            "NET_TTP" => Some(self.net_ttp.to_string()),
            "GET_TTL" => Some(self.get_ttl.to_string()),
            "GET_TPF" => Some(self.get_tpf.to_string()),
            "GET_TTP" => Some(self.get_ttp.to_string()),
            "GRACE" => Some(self.grace.to_string()),
            _ => None,
        }
    }

    fn run_time(&self) -> Result<Option<Duration>, ConfigError> {
        self.duration
            .map(|secs| {
                Duration::try_from_secs_f64(secs)
                    .map_err(|e| ConfigError::invalid_value("--duration", secs.to_string(), e))
            })
            .transpose()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.config()?;
    let profile: NodeProfile = args.profile.parse()?;
    let run_time = args.run_time()?;
    let seed = args.seed.unwrap_or_else(rand::random);

    info!(
        node = %config.node_id,
        %profile,
        port = config.port,
        server = %config.server_addr(),
        "Starting client"
    );

    let session = Arc::new(MemorySession::with_network_policy(
        config.node_id.clone(),
        seed,
        config.net_policy,
    ));
    let controller = session.controller().clone();
    let supervisor = NodeSupervisor::new(TokioContext::shared(), session, profile.roles())
        .with_policy(config.get_policy)
        .with_grace(config.grace);

    let mut node = tokio::spawn(supervisor.run());

    tokio::select! {
        joined = &mut node => return finish(joined, args.json),
        signal = signals::wait_for_shutdown_signal() => {
            match signal {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => error!(error = %e, "Cannot listen for shutdown signals"),
            }
            controller.cancel();
        }
        _ = run_for(run_time) => {
            info!("Run time elapsed");
            controller.complete();
        }
    }

    finish(node.await, args.json)
}

async fn run_for(run_time: Option<Duration>) {
    match run_time {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

fn finish(joined: Result<Result<NodeReport, NodeError>, JoinError>, json: bool) -> Result<()> {
    let report = joined.context("node task failed")??;

    if json {
        println!("{}", report.to_json_pretty()?);
    } else {
        for role in &report.roles {
            match &role.panic {
                None => info!(
                    role = %role.name,
                    kind = %role.kind,
                    iterations = role.stats.iterations,
                    published = role.stats.published,
                    failures = role.stats.publish_failures + role.stats.fetch_failures,
                    "Role stopped"
                ),
                Some(panic) => warn!(role = %role.name, %panic, "Role crashed"),
            }
        }
        info!(end = ?report.end, uptime_secs = report.uptime_secs, "Client has shutdown");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartnode_env::RetrievalPolicy;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["smartnode-agent", "--id", "light-1"]).unwrap();
        let config = args.config().unwrap();

        assert_eq!(config.node_id.as_str(), "light-1");
        assert!(smartnode_core::config::LOCAL_PORT_RANGE.contains(&config.port));
        assert_eq!(config.server_addr(), "localhost:33333");
        assert_eq!(config.get_policy, RetrievalPolicy::default());
        assert_eq!(args.profile, "light");
        assert_eq!(args.run_time().unwrap(), None);
    }

    #[test]
    fn test_args_missing_id() {
        let args = Args::try_parse_from(["smartnode-agent"]).unwrap();
        assert!(matches!(args.config(), Err(ConfigError::MissingNodeId(_))));
    }

    #[test]
    fn test_args_policies() {
        let args = Args::try_parse_from([
            "smartnode-agent",
            "--id",
            "safety-1",
            "--get-ttl",
            "30",
            "--get-tpf",
            "2",
            "--net-ttp",
            "1.5",
        ])
        .unwrap();
        let config = args.config().unwrap();

        assert_eq!(config.get_policy.ttl, Duration::from_secs(30));
        assert_eq!(config.get_policy.tries_per_fetch, 2);
        assert_eq!(config.net_policy.tolerable_staleness, Duration::from_millis(1_500));
    }

    #[test]
    fn test_args_overrides_reach_config() {
        let args = Args::try_parse_from([
            "smartnode-agent",
            "--id",
            "display-1",
            "--port",
            "40000",
            "--server-host",
            "hub",
            "--grace",
            "2.5",
        ])
        .unwrap();
        let config = args.config().unwrap();

        assert_eq!(config.port, 40000);
        assert_eq!(config.server_addr(), "hub:33333");
        assert_eq!(config.grace, Duration::from_millis(2_500));
    }

    #[test]
    fn test_args_negative_grace_rejected() {
        let args =
            Args::try_parse_from(["smartnode-agent", "--id", "x", "--grace=-1"]).unwrap();
        assert!(matches!(args.config(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_args_zero_tries_rejected() {
        let args =
            Args::try_parse_from(["smartnode-agent", "--id", "x", "--get-tpf", "0"]).unwrap();
        assert!(matches!(args.config(), Err(ConfigError::InvalidPolicy(_))));
    }
}
