//! Node supervisor.
//!
//! Starts one loop per role, waits for the session lifecycle to end, then
//! stops every loop and collects a [`NodeReport`].
//!
//! ```text
//!  lifecycle token ──► scope (child) ──┬─► role token ──► ProducerLoop
//!                                      ├─► role token ──► ConsumerLoop
//!                                      └─► ...
//! ```
//!
//! A panicking role is caught inside its own task and reported; the other
//! roles keep running until the session ends.

use crate::consumer::ConsumerLoop;
use crate::error::NodeError;
use crate::producer::ProducerLoop;
use crate::report::{LoopStats, NodeReport, RoleReport};
use crate::role::{validate_roles, NodeRole};
use futures::future::BoxFuture;
use futures::FutureExt;
use smartnode_env::{NodeContext, RetrievalPolicy, ValueSession};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// How long stopped loops get to finish before they are aborted.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// Runs a role table against one session until its lifecycle ends.
pub struct NodeSupervisor<Ctx, S>
where
    Ctx: NodeContext,
    S: ValueSession,
{
    context: Arc<Ctx>,
    session: Arc<S>,
    roles: Vec<NodeRole>,
    policy: RetrievalPolicy,
    grace: Duration,
}

impl<Ctx, S> NodeSupervisor<Ctx, S>
where
    Ctx: NodeContext,
    S: ValueSession,
{
    pub fn new(context: Arc<Ctx>, session: Arc<S>, roles: Vec<NodeRole>) -> Self {
        Self {
            context,
            session,
            roles,
            policy: RetrievalPolicy::default(),
            grace: DEFAULT_GRACE,
        }
    }

    /// Sets the retrieval policy every consumer fetches with.
    pub fn with_policy(mut self, policy: RetrievalPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the shutdown grace period.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn roles(&self) -> &[NodeRole] {
        &self.roles
    }

    /// Runs every role until the session ends.
    ///
    /// Returns `NodeError::Config` without starting anything if the role
    /// table is invalid, and `NodeError::GraceExceeded` if some loops had to
    /// be aborted after the grace period.
    pub async fn run(self) -> Result<NodeReport, NodeError> {
        validate_roles(&self.roles)?;

        let node_id = self.session.local_id().clone();
        let lifecycle = self.session.lifecycle();
        let scope = lifecycle.token().child_token();
        let started = self.context.now();

        info!(node = %node_id, roles = self.roles.len(), "Starting node");

        let mut set = JoinSet::new();
        for (index, role) in self.roles.iter().cloned().enumerate() {
            let name = role.name().to_string();
            let kind = role.kind();
            let token = scope.child_token();

            let work: BoxFuture<'static, LoopStats> = match role {
                NodeRole::Producer(p) => {
                    ProducerLoop::new(p, self.context.clone(), self.session.clone())
                        .run(token)
                        .boxed()
                }
                NodeRole::Consumer(c) => ConsumerLoop::new(
                    c,
                    self.policy,
                    self.context.clone(),
                    self.session.clone(),
                )
                .run(token)
                .boxed(),
            };

            set.spawn(async move {
                let report = match AssertUnwindSafe(work).catch_unwind().await {
                    Ok(stats) => RoleReport::stopped(name, kind, stats),
                    Err(payload) => {
                        let message = panic_message(&*payload);
                        error!(role = %name, %kind, panic = %message, "Role crashed");
                        RoleReport::panicked(name, kind, message)
                    }
                };
                (index, report)
            });
        }

        let end = lifecycle.ended().await;
        info!(node = %node_id, ?end, "Session ended, stopping roles");
        scope.cancel();

        let mut slots: Vec<Option<RoleReport>> = vec![None; self.roles.len()];
        let joined = tokio::time::timeout(self.grace, async {
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((index, report)) => slots[index] = Some(report),
                    Err(e) => warn!(error = %e, "Role task failed to join"),
                }
            }
        })
        .await;

        if joined.is_err() {
            let stuck: Vec<String> = self
                .roles
                .iter()
                .zip(&slots)
                .filter(|(_, slot)| slot.is_none())
                .map(|(role, _)| role.name().to_string())
                .collect();
            warn!(node = %node_id, grace = ?self.grace, ?stuck, "Aborting stuck roles");
            set.shutdown().await;
            return Err(NodeError::GraceExceeded {
                grace: self.grace,
                stuck,
            });
        }

        let roles = self
            .roles
            .iter()
            .zip(slots)
            .map(|(role, slot)| {
                slot.unwrap_or_else(|| {
                    RoleReport::panicked(role.name(), role.kind(), "task aborted")
                })
            })
            .collect();

        let report = NodeReport {
            node_id,
            end,
            uptime_secs: self.context.now().saturating_sub(started).as_secs_f64(),
            roles,
        };
        info!(
            node = %report.node_id,
            uptime_secs = report.uptime_secs,
            crashed = report.panicked().count(),
            "Node stopped"
        );
        Ok(report)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
