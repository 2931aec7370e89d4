//! Scenario runner - runs a node profile under a fault scenario and checks
//! the loop invariants afterwards.

use crate::context::SimContext;
use crate::scenarios::ScenarioId;
use crate::session::MemorySession;

use smartnode_core::{LoopStats, NodeProfile, NodeReport, NodeRole, NodeSupervisor};
use smartnode_env::{NodeContext, NodeId, RetrievalPolicy, SessionEnd, Tag};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that prevent a scenario from running at all.
#[derive(Debug, Error)]
pub enum SimError {
    /// The simulation runtime could not be built
    #[error("failed to build simulation runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Profile whose roles ran
    pub profile: NodeProfile,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Supervisor report, absent if the supervisor itself failed
    pub report: Option<NodeReport>,

    /// Session calls observed after the lifecycle ended
    pub late_calls: u64,
}

impl ScenarioResult {
    /// Sum of all role counters.
    pub fn totals(&self) -> LoopStats {
        self.report
            .as_ref()
            .map(NodeReport::totals)
            .unwrap_or_default()
    }
}

/// Runs fault scenarios against one profile.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Roles to run
    profile: NodeProfile,

    /// Virtual run time
    duration: Duration,

    /// Policy every consumer fetches with
    get_policy: RetrievalPolicy,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, profile: NodeProfile) -> Self {
        Self {
            seed,
            profile,
            duration: Duration::from_secs(10),
            get_policy: RetrievalPolicy::new(Duration::from_secs(3), 3, Duration::ZERO),
        }
    }

    /// Sets the run time in (virtual) seconds.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration = Duration::try_from_secs_f64(secs).unwrap_or_default();
        self
    }

    /// Sets the consumer fetch policy.
    pub fn with_get_policy(mut self, policy: RetrievalPolicy) -> Self {
        self.get_policy = policy;
        self
    }

    /// Runs a scenario on a fresh single-threaded runtime with a paused
    /// clock.
    pub fn run(&self, scenario: ScenarioId) -> Result<ScenarioResult, SimError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()?;
        Ok(runtime.block_on(self.run_async(scenario)))
    }

    /// Runs a scenario on the current runtime.
    ///
    /// Results are only reproducible on a current-thread runtime with a
    /// paused clock.
    pub async fn run_async(&self, scenario: ScenarioId) -> ScenarioResult {
        info!(
            "Starting scenario: {} (profile={}, seed={})",
            scenario.name(),
            self.profile,
            self.seed
        );

        let context = SimContext::shared(self.seed);
        let session = Arc::new(MemorySession::new(
            NodeId::new(format!("sim-{}", self.profile)),
            self.seed,
        ));
        let faults = session.faults();
        faults.set_publish_failure_rate(scenario.publish_failure_rate());
        faults.set_blackout(scenario.starts_blacked_out());

        let roles = self.profile.roles();
        let supervisor = NodeSupervisor::new(context.clone(), session.clone(), roles.clone())
            .with_policy(self.get_policy)
            .with_grace(Duration::from_secs(1));

        let driver = {
            let session = session.clone();
            let duration = self.duration;
            tokio::spawn(async move {
                let half = duration / 2;
                tokio::time::sleep(half).await;
                if scenario.cancels() {
                    info!("Cancelling session at half time");
                    session.controller().cancel();
                    return;
                }
                if scenario.starts_blacked_out() {
                    info!("Blackout over");
                    session.faults().set_blackout(false);
                }
                tokio::time::sleep(duration - half).await;
                session.controller().complete();
            })
        };

        let outcome = supervisor.run().await;
        if let Err(e) = driver.await {
            warn!(error = %e, "Scenario driver failed");
        }

        let final_time_secs = context.now().as_secs_f64();
        let late_calls = session.late_calls();
        let (report, failure) = match outcome {
            Ok(report) => {
                let failure = self
                    .check(scenario, &roles, &session, &report)
                    .err();
                (Some(report), failure)
            }
            Err(e) => (None, Some(format!("supervisor failed: {}", e))),
        };

        if let Some(report) = &report {
            let totals = report.totals();
            debug!(
                "  published={} dropped={} fetched={} absent={} fetch_failures={}",
                totals.published,
                totals.publish_failures,
                totals.fetched,
                totals.absent,
                totals.fetch_failures
            );
        }

        ScenarioResult {
            scenario,
            profile: self.profile,
            seed: self.seed,
            passed: failure.is_none(),
            final_time_secs,
            failure_reason: failure,
            report,
            late_calls,
        }
    }

    fn check(
        &self,
        scenario: ScenarioId,
        roles: &[NodeRole],
        session: &MemorySession,
        report: &NodeReport,
    ) -> Result<(), String> {
        let totals = report.totals();

        if let Some(crashed) = report.panicked().next() {
            return Err(format!(
                "role {} panicked: {}",
                crashed.name,
                crashed.panic.as_deref().unwrap_or("unknown")
            ));
        }
        if session.late_calls() > 0 {
            return Err(format!(
                "{} session calls after the lifecycle ended",
                session.late_calls()
            ));
        }

        let expected_end = if scenario.cancels() {
            SessionEnd::Cancelled
        } else {
            SessionEnd::Completed
        };
        if report.end != expected_end {
            return Err(format!("session ended {:?}, expected {:?}", report.end, expected_end));
        }

        // Every successful publish is stored exactly once.
        let stored: usize = session
            .tags()
            .iter()
            .map(|tag| session.history(tag).len())
            .sum();
        if stored as u64 != totals.published {
            return Err(format!(
                "{} publishes reported but {} stored",
                totals.published, stored
            ));
        }

        for role in report.roles.iter() {
            let stats = role.stats;
            if stats.iterations != stats.published + stats.publish_failures {
                return Err(format!(
                    "{}: {} iterations but {} publish attempts",
                    role.name,
                    stats.iterations,
                    stats.published + stats.publish_failures
                ));
            }
        }

        let mut produced: HashSet<&Tag> = HashSet::new();
        for role in roles {
            match role {
                NodeRole::Producer(p) => {
                    produced.insert(&p.tag);
                    if let Some(bad) = session
                        .history(&p.tag)
                        .iter()
                        .find(|s| !p.domain.contains(&s.value))
                    {
                        return Err(format!("{} published {} outside its domain", p.name, bad.value));
                    }
                }
                NodeRole::Consumer(c) => {
                    let Some(mut allowed) = c.rule.targets() else {
                        continue;
                    };
                    allowed.push(c.initial);
                    if let Some(bad) = session
                        .history(&c.output)
                        .iter()
                        .find(|s| !allowed.contains(&s.value))
                    {
                        return Err(format!("{} published unexpected output {}", c.name, bad.value));
                    }
                }
            }
        }

        if roles.is_empty() {
            return Ok(());
        }
        let has_consumers = roles.iter().any(|r| matches!(r, NodeRole::Consumer(_)));
        let has_local_input = roles.iter().any(|r| match r {
            NodeRole::Consumer(c) => c.inputs.iter().any(|t| produced.contains(t)),
            NodeRole::Producer(_) => false,
        });

        match scenario {
            ScenarioId::Steady => {
                if totals.publish_failures > 0 || totals.fetch_failures > 0 {
                    return Err(format!(
                        "{} publish and {} fetch failures without faults",
                        totals.publish_failures, totals.fetch_failures
                    ));
                }
                if let Some(idle) = report.roles.iter().find(|r| r.stats.iterations == 0) {
                    return Err(format!("{} never completed an iteration", idle.name));
                }
            }
            ScenarioId::FlakyPublish => {
                if totals.publish_failures == 0 {
                    return Err("no publish failed under a 60% drop rate".to_string());
                }
                if totals.published == 0 {
                    return Err("nothing was published".to_string());
                }
            }
            ScenarioId::FetchBlackout => {
                if has_consumers && totals.fetch_failures == 0 {
                    return Err("no fetch failed during the blackout".to_string());
                }
                if has_local_input && totals.fetched == 0 {
                    return Err("no fetch succeeded after the blackout".to_string());
                }
            }
            ScenarioId::CancelMidrun => {
                let half = (self.duration / 2).as_secs_f64();
                if (report.uptime_secs - half).abs() > 0.01 {
                    return Err(format!(
                        "stopped after {:.3}s, expected {:.3}s",
                        report.uptime_secs, half
                    ));
                }
            }
        }

        Ok(())
    }
}
