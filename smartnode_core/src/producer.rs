//! Producer loop - one simulated sensor.
//!
//! ```text
//!   ┌──────────────┐   sample    ┌───────────┐  publish   ┌─────────┐
//!   │ jitter sleep │ ──────────► │  domain   │ ─────────► │ session │
//!   └──────▲───────┘             └───────────┘            └────┬────┘
//!          └──────────────── next iteration (errors logged) ◄──┘
//! ```
//!
//! The loop only ends when its cancellation token fires. A pending sleep or
//! publish is dropped at that point; nothing is retried.

use crate::report::LoopStats;
use crate::role::ProducerRole;
use smartnode_env::{NodeContext, ValueSession};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Runs one [`ProducerRole`] against a shared session.
pub struct ProducerLoop<Ctx, S>
where
    Ctx: NodeContext,
    S: ValueSession,
{
    role: ProducerRole,
    context: Arc<Ctx>,
    session: Arc<S>,
}

impl<Ctx, S> ProducerLoop<Ctx, S>
where
    Ctx: NodeContext,
    S: ValueSession,
{
    /// Binds a producer role to a context and session.
    pub fn new(role: ProducerRole, context: Arc<Ctx>, session: Arc<S>) -> Self {
        Self {
            role,
            context,
            session,
        }
    }

    /// Runs until `token` is cancelled and returns the loop's counters.
    pub async fn run(self, token: CancellationToken) -> LoopStats {
        let role = &self.role;
        let mut stats = LoopStats::default();
        info!(role = %role.name, tag = %role.tag, "Starting sensor");

        loop {
            let delay = self.context.with_rng(|rng| role.period.sample(rng));
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = self.context.sleep(delay) => {}
            }

            let Some(value) = self.context.with_rng(|rng| role.domain.sample(rng)) else {
                // Unreachable for validated roles; keep the loop alive anyway.
                error!(role = %role.name, "Domain produced no value");
                stats.iterations += 1;
                continue;
            };

            debug!(role = %role.name, tag = %role.tag, %value, "Publishing");
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                outcome = self.session.publish(&role.tag, value) => outcome,
            };

            stats.iterations += 1;
            stats.last_value = Some(value);
            match outcome {
                Ok(()) => stats.published += 1,
                Err(e) => {
                    stats.publish_failures += 1;
                    error!(role = %role.name, tag = %role.tag, error = %e, "Failed to publish");
                }
            }
        }

        info!(
            role = %role.name,
            iterations = stats.iterations,
            failures = stats.publish_failures,
            "Sensor stopped"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ValueDomain;
    use crate::period::JitterPeriod;
    use crate::testing::ScriptedSession;
    use smartnode_env::{TokioContext, Value};
    use std::time::Duration;

    fn touch_sensor() -> ProducerRole {
        ProducerRole::new("TouchSensor", "Touch", ValueDomain::choice([0, 1]))
            .with_period(JitterPeriod::fixed(Duration::from_secs(1)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifty_iterations_stay_in_domain() {
        let session = Arc::new(ScriptedSession::new());
        let token = CancellationToken::new();
        let producer = ProducerLoop::new(touch_sensor(), TokioContext::shared(), session.clone());
        let handle = tokio::spawn(producer.run(token.clone()));

        tokio::time::sleep(Duration::from_millis(50_500)).await;
        token.cancel();
        let stats = handle.await.unwrap();

        let published = session.published("Touch");
        assert_eq!(stats.iterations, 50);
        assert_eq!(stats.published, 50);
        assert_eq!(session.publish_calls(), 50);
        let domain = ValueDomain::choice([0, 1]);
        assert!(published.iter().all(|v| domain.contains(v)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_failure_is_not_fatal() {
        let session = Arc::new(ScriptedSession::new().fail_publish(0).fail_publish(3));
        let token = CancellationToken::new();
        let producer = ProducerLoop::new(touch_sensor(), TokioContext::shared(), session.clone());
        let handle = tokio::spawn(producer.run(token.clone()));

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        token.cancel();
        let stats = handle.await.unwrap();

        assert_eq!(stats.iterations, 10);
        assert_eq!(stats.publish_failures, 2);
        assert_eq!(stats.published, 8);
        assert_eq!(session.published("Touch").len(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_abandons_sleep() {
        let role = touch_sensor().with_period(JitterPeriod::fixed(Duration::from_secs(3600)));
        let session = Arc::new(ScriptedSession::new());
        let token = CancellationToken::new();
        let producer = ProducerLoop::new(role, TokioContext::shared(), session.clone());
        let handle = tokio::spawn(producer.run(token.clone()));

        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();

        let stats = tokio::time::timeout(Duration::from_millis(10), handle)
            .await
            .expect("producer should stop promptly")
            .unwrap();
        assert_eq!(stats.iterations, 0);
        assert_eq!(session.publish_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_publish_after_cancel() {
        let session = Arc::new(ScriptedSession::new());
        let token = CancellationToken::new();
        let producer = ProducerLoop::new(touch_sensor(), TokioContext::shared(), session.clone());
        let handle = tokio::spawn(producer.run(token.clone()));

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        token.cancel();
        let calls_at_cancel = session.publish_calls();
        handle.await.unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(calls_at_cancel, 5);
        assert_eq!(session.publish_calls(), calls_at_cancel);
    }

    #[tokio::test(start_paused = true)]
    async fn test_float_sensor_publishes_floats() {
        let role = ProducerRole::new("AmbianceSensor", "Ambiance", ValueDomain::float_range(0.0, 100.0))
            .with_period(JitterPeriod::fixed(Duration::from_secs(1)));
        let session = Arc::new(ScriptedSession::new());
        let token = CancellationToken::new();
        let handle = tokio::spawn(
            ProducerLoop::new(role, TokioContext::shared(), session.clone()).run(token.clone()),
        );

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        token.cancel();
        let stats = handle.await.unwrap();

        let published = session.published("Ambiance");
        assert_eq!(published.len(), 3);
        assert!(published.iter().all(|v| matches!(v, Value::Float(f) if (0.0..=100.0).contains(f))));
        assert_eq!(stats.last_value, published.last().copied());
    }
}
