//! Consumer loop - one simulated actuator.
//!
//! Each iteration sleeps, fetches every input tag with the retrieval
//! policy, folds the fetched readings into the retained output through the
//! role's [`DecisionRule`](crate::DecisionRule) and publishes the result.
//!
//! An absent reading and a failed fetch are treated alike: the rule sees
//! `None` for that input and the previous output is carried forward.

use crate::report::LoopStats;
use crate::role::ConsumerRole;
use smartnode_env::{NodeContext, RetrievalPolicy, Value, ValueSession};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Runs one [`ConsumerRole`] against a shared session.
pub struct ConsumerLoop<Ctx, S>
where
    Ctx: NodeContext,
    S: ValueSession,
{
    role: ConsumerRole,
    policy: RetrievalPolicy,
    context: Arc<Ctx>,
    session: Arc<S>,
}

impl<Ctx, S> ConsumerLoop<Ctx, S>
where
    Ctx: NodeContext,
    S: ValueSession,
{
    /// Binds a consumer role to a context, session and fetch policy.
    pub fn new(
        role: ConsumerRole,
        policy: RetrievalPolicy,
        context: Arc<Ctx>,
        session: Arc<S>,
    ) -> Self {
        Self {
            role,
            policy,
            context,
            session,
        }
    }

    /// Runs until `token` is cancelled and returns the loop's counters.
    pub async fn run(self, token: CancellationToken) -> LoopStats {
        let role = &self.role;
        let mut stats = LoopStats::default();
        let mut output = role.initial;
        let mut readings: Vec<Option<Value>> = Vec::with_capacity(role.inputs.len());
        info!(role = %role.name, output = %role.output, "Starting actuator");

        'run: loop {
            let delay = self.context.with_rng(|rng| role.period.sample(rng));
            tokio::select! {
                biased;
                _ = token.cancelled() => break 'run,
                _ = self.context.sleep(delay) => {}
            }

            readings.clear();
            for tag in &role.inputs {
                let fetched = tokio::select! {
                    biased;
                    _ = token.cancelled() => break 'run,
                    fetched = self.session.fetch(tag, &self.policy) => fetched,
                };

                let reading = match fetched {
                    Ok(Some(value)) => {
                        stats.fetched += 1;
                        Some(value)
                    }
                    Ok(None) => {
                        stats.absent += 1;
                        debug!(role = %role.name, %tag, "No value within policy");
                        None
                    }
                    Err(e) => {
                        stats.fetch_failures += 1;
                        warn!(role = %role.name, %tag, error = %e, "Failed to fetch");
                        None
                    }
                };
                readings.push(reading);
            }

            let next = role.rule.apply(&readings, output);
            if next != output {
                info!(
                    role = %role.name,
                    output = %role.output,
                    from = %output,
                    to = %next,
                    "Adjusting actuator"
                );
            }
            output = next;

            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => break 'run,
                outcome = self.session.publish(&role.output, output) => outcome,
            };

            stats.iterations += 1;
            stats.last_value = Some(output);
            match outcome {
                Ok(()) => stats.published += 1,
                Err(e) => {
                    stats.publish_failures += 1;
                    error!(role = %role.name, tag = %role.output, error = %e, "Failed to set value");
                }
            }
        }

        info!(
            role = %role.name,
            iterations = stats.iterations,
            absent = stats.absent,
            failures = stats.publish_failures + stats.fetch_failures,
            "Actuator stopped"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::JitterPeriod;
    use crate::rule::DecisionRule;
    use crate::testing::ScriptedSession;
    use smartnode_env::{SessionError, TokioContext};
    use std::time::Duration;

    fn brightness_actuator() -> ConsumerRole {
        ConsumerRole::new(
            "BrightnessActuator",
            ["intensity"],
            "brightness",
            DecisionRule::AtLeast {
                threshold: 100.0,
                then: Value::Int(100),
            },
        )
        .with_period(JitterPeriod::fixed(Duration::from_secs(1)))
    }

    fn spawn_consumer(
        role: ConsumerRole,
        session: &Arc<ScriptedSession>,
    ) -> (CancellationToken, tokio::task::JoinHandle<LoopStats>) {
        let token = CancellationToken::new();
        let consumer = ConsumerLoop::new(
            role,
            RetrievalPolicy::default(),
            TokioContext::shared(),
            session.clone(),
        );
        let handle = tokio::spawn(consumer.run(token.clone()));
        (token, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_intensity_sequence() {
        let session = Arc::new(ScriptedSession::new().script_fetch(
            "intensity",
            vec![
                Ok(None),
                Ok(Some(Value::Int(120))),
                Ok(None),
                Ok(Some(Value::Int(40))),
            ],
        ));
        let (token, handle) = spawn_consumer(brightness_actuator(), &session);

        tokio::time::sleep(Duration::from_millis(4_500)).await;
        token.cancel();
        let stats = handle.await.unwrap();

        assert_eq!(
            session.published("brightness"),
            vec![Value::Int(0), Value::Int(100), Value::Int(100), Value::Int(100)]
        );
        assert_eq!(stats.absent, 2);
        assert_eq!(stats.fetched, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_absent_retains_output() {
        let role = brightness_actuator().with_initial(7);
        let session = Arc::new(ScriptedSession::new());
        let (token, handle) = spawn_consumer(role, &session);

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        token.cancel();
        handle.await.unwrap();

        assert_eq!(session.published("brightness"), vec![Value::Int(7); 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_survives_publish_failure() {
        let session = Arc::new(
            ScriptedSession::new()
                .script_fetch("intensity", vec![Ok(Some(Value::Int(150)))])
                .fail_publish(0),
        );
        let (token, handle) = spawn_consumer(brightness_actuator(), &session);

        tokio::time::sleep(Duration::from_millis(8_500)).await;
        token.cancel();
        let stats = handle.await.unwrap();

        // One failed publish, then seven more iterations that all went through.
        assert_eq!(stats.iterations, 8);
        assert_eq!(stats.publish_failures, 1);
        assert_eq!(session.published("brightness"), vec![Value::Int(100); 7]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_counts_as_absent() {
        let session = Arc::new(ScriptedSession::new().script_fetch(
            "intensity",
            vec![
                Ok(Some(Value::Int(100))),
                Err(SessionError::transport("reset by peer")),
            ],
        ));
        let role = brightness_actuator();
        let (token, handle) = spawn_consumer(role, &session);

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        token.cancel();
        let stats = handle.await.unwrap();

        assert_eq!(stats.fetch_failures, 1);
        assert_eq!(
            session.published("brightness"),
            vec![Value::Int(100), Value::Int(100)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_types_flow_through_comparison() {
        let session = Arc::new(ScriptedSession::new().script_fetch(
            "intensity",
            vec![
                Ok(Some(Value::Bool(true))),
                Ok(Some(Value::Float(f64::NAN))),
                Ok(Some(Value::Float(100.0))),
            ],
        ));
        let (token, handle) = spawn_consumer(brightness_actuator(), &session);

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        token.cancel();
        handle.await.unwrap();

        assert_eq!(
            session.published("brightness"),
            vec![Value::Int(0), Value::Int(0), Value::Int(100)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_multiple_inputs_are_fetched_each_iteration() {
        let role = ConsumerRole::new(
            "TouchActuator",
            ["Touch", "Occupancy"],
            "Brightness",
            DecisionRule::Each {
                rules: vec![
                    DecisionRule::Map {
                        cases: vec![
                            (Value::Int(1), Value::Int(100)),
                            (Value::Int(0), Value::Int(0)),
                        ],
                    },
                    DecisionRule::Map {
                        cases: vec![(Value::Int(0), Value::Int(0))],
                    },
                ],
            },
        )
        .with_period(JitterPeriod::fixed(Duration::from_secs(1)));
        let session = Arc::new(
            ScriptedSession::new()
                .script_fetch("Touch", vec![Ok(Some(Value::Int(1))), Ok(None)])
                .script_fetch("Occupancy", vec![Ok(None), Ok(Some(Value::Int(0)))]),
        );
        let (token, handle) = spawn_consumer(role, &session);

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        token.cancel();
        handle.await.unwrap();

        assert_eq!(session.fetch_calls(), 4);
        assert_eq!(
            session.published("Brightness"),
            vec![Value::Int(100), Value::Int(0)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_slow_fetch() {
        let session = Arc::new(
            ScriptedSession::new().with_fetch_delay(Duration::from_secs(60)),
        );
        let (token, handle) = spawn_consumer(brightness_actuator(), &session);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(session.fetch_calls(), 1);
        token.cancel();

        let stats = tokio::time::timeout(Duration::from_millis(10), handle)
            .await
            .expect("consumer should stop promptly")
            .unwrap();
        assert_eq!(stats.iterations, 0);
        assert_eq!(session.publish_calls(), 0);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(session.fetch_calls(), 1);
    }
}
