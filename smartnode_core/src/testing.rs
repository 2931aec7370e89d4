//! Scripted session used by the loop and supervisor tests.

use async_trait::async_trait;
use smartnode_env::{
    Lifecycle, LifecycleController, NodeId, RetrievalPolicy, SessionError, Tag, Value,
    ValueSession,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

type FetchOutcome = Result<Option<Value>, SessionError>;

/// A session whose fetch answers and publish failures are scripted.
///
/// Unscripted fetches return `Ok(None)`.
pub struct ScriptedSession {
    id: NodeId,
    lifecycle: LifecycleController,
    fetch_scripts: Mutex<HashMap<Tag, VecDeque<FetchOutcome>>>,
    fetch_delay: Duration,
    failing_publishes: Mutex<HashSet<u64>>,
    panic_on: Option<Tag>,
    publish_calls: Mutex<u64>,
    published: Mutex<Vec<(Tag, Value)>>,
    fetches: Mutex<Vec<Tag>>,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self {
            id: NodeId::new("test-node"),
            lifecycle: LifecycleController::new(),
            fetch_scripts: Mutex::new(HashMap::new()),
            fetch_delay: Duration::ZERO,
            failing_publishes: Mutex::new(HashSet::new()),
            panic_on: None,
            publish_calls: Mutex::new(0),
            published: Mutex::new(Vec::new()),
            fetches: Mutex::new(Vec::new()),
        }
    }

    /// Queues the answers for successive fetches of `tag`.
    pub fn script_fetch(self, tag: &str, outcomes: Vec<FetchOutcome>) -> Self {
        self.fetch_scripts
            .lock()
            .unwrap()
            .insert(Tag::new(tag), outcomes.into());
        self
    }

    /// Makes every fetch take `delay` before answering.
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    /// Makes the n-th publish call (0-based, across all tags) fail.
    pub fn fail_publish(self, call: u64) -> Self {
        self.failing_publishes.lock().unwrap().insert(call);
        self
    }

    /// Panics whenever `tag` is published.
    pub fn panic_on_publish(mut self, tag: &str) -> Self {
        self.panic_on = Some(Tag::new(tag));
        self
    }

    pub fn controller(&self) -> &LifecycleController {
        &self.lifecycle
    }

    /// Successfully published values of one tag, in order.
    pub fn published(&self, tag: &str) -> Vec<Value> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t.as_str() == tag)
            .map(|(_, v)| *v)
            .collect()
    }

    pub fn publish_calls(&self) -> u64 {
        *self.publish_calls.lock().unwrap()
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }
}

#[async_trait]
impl ValueSession for ScriptedSession {
    async fn publish(&self, tag: &Tag, value: Value) -> Result<(), SessionError> {
        if self.panic_on.as_ref() == Some(tag) {
            panic!("scripted panic on {}", tag);
        }

        let call = {
            let mut calls = self.publish_calls.lock().unwrap();
            let call = *calls;
            *calls += 1;
            call
        };

        if self.failing_publishes.lock().unwrap().contains(&call) {
            return Err(SessionError::transport("scripted publish failure"));
        }

        self.published.lock().unwrap().push((tag.clone(), value));
        Ok(())
    }

    async fn fetch(&self, tag: &Tag, _policy: &RetrievalPolicy) -> FetchOutcome {
        self.fetches.lock().unwrap().push(tag.clone());
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }

        let next = self
            .fetch_scripts
            .lock()
            .unwrap()
            .get_mut(tag)
            .and_then(|script| script.pop_front());
        next.unwrap_or(Ok(None))
    }

    fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.handle()
    }

    fn local_id(&self) -> &NodeId {
        &self.id
    }
}
