//! Test doubles shared by unit tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{FetchError, Result};
use crate::fetcher::{ArtifactStore, ContentSource, Fetcher};
use crate::stream::{Subscriber, Subscription};
use crate::types::{Artifact, ArtifactId, Completion, Demand, Never, SourceItem};

pub(crate) fn source(locator: &str) -> SourceItem {
    SourceItem::parse(locator).unwrap()
}

/// Let every spawned task and timer run to completion under paused time
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_secs(60)).await;
}

/// Fetcher over `content` storing into a fresh [`MemoryStore`]
pub(crate) fn test_fetcher(content: ScriptedSource) -> (Fetcher, Arc<MemoryStore>) {
    shared_fetcher(Arc::new(content))
}

/// Like [`test_fetcher`], keeping a handle on the source for call inspection
pub(crate) fn shared_fetcher(content: Arc<ScriptedSource>) -> (Fetcher, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Fetcher::new(content, Arc::clone(&store) as Arc<dyn ArtifactStore>);
    (fetcher, store)
}

#[derive(Clone)]
enum Script {
    Body(Vec<u8>),
    Unavailable,
}

/// [`ContentSource`] answering from a fixed script, with optional latency
#[derive(Default)]
pub(crate) struct ScriptedSource {
    scripts: HashMap<String, (Script, Duration)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn ok(self, locator: &str, body: &[u8]) -> Self {
        self.ok_after(locator, body, Duration::ZERO)
    }

    pub(crate) fn ok_after(mut self, locator: &str, body: &[u8], delay: Duration) -> Self {
        self.scripts
            .insert(source(locator).to_string(), (Script::Body(body.to_vec()), delay));
        self
    }

    pub(crate) fn failing(self, locator: &str) -> Self {
        self.failing_after(locator, Duration::ZERO)
    }

    pub(crate) fn failing_after(mut self, locator: &str, delay: Duration) -> Self {
        self.scripts
            .insert(source(locator).to_string(), (Script::Unavailable, delay));
        self
    }

    /// Retrieved locators, in call order
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentSource for ScriptedSource {
    async fn retrieve(&self, source: &SourceItem) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().push(source.to_string());
        let (script, delay) = self
            .scripts
            .get(source.as_str())
            .cloned()
            .unwrap_or((Script::Unavailable, Duration::ZERO));

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match script {
            Script::Body(body) => Ok(body),
            Script::Unavailable => Err(FetchError::HttpStatus {
                status: 503,
                url: source.to_string(),
            }
            .into()),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// [`ArtifactStore`] keeping artifacts in memory
#[derive(Default)]
pub(crate) struct MemoryStore {
    artifacts: Mutex<HashMap<ArtifactId, Vec<u8>>>,
    fail: bool,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn contents(&self, id: ArtifactId) -> Option<Vec<u8>> {
        self.artifacts.lock().unwrap().get(&id).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.artifacts.lock().unwrap().len()
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn persist(&self, bytes: &[u8]) -> Result<Artifact> {
        let id = ArtifactId::random();
        let path = std::path::PathBuf::from(format!("memory/{id}"));
        if self.fail {
            return Err(FetchError::Persist {
                path,
                source: std::io::Error::other("store configured to fail"),
            }
            .into());
        }
        self.artifacts.lock().unwrap().insert(id, bytes.to_vec());
        Ok(Artifact {
            id,
            path,
            size_bytes: bytes.len() as u64,
        })
    }
}

/// Subscriber recording everything it receives
pub(crate) struct RecordingSubscriber<T> {
    initial: Demand,
    per_value: Demand,
    cancel_after: Option<usize>,
    values: Mutex<Vec<T>>,
    completions: Mutex<Vec<Completion<Never>>>,
    subscription: Mutex<Option<Arc<dyn Subscription>>>,
    received: AtomicUsize,
}

impl<T> RecordingSubscriber<T> {
    fn build(initial: Demand, per_value: Demand, cancel_after: Option<usize>) -> Arc<Self> {
        Arc::new(Self {
            initial,
            per_value,
            cancel_after,
            values: Mutex::new(Vec::new()),
            completions: Mutex::new(Vec::new()),
            subscription: Mutex::new(None),
            received: AtomicUsize::new(0),
        })
    }

    /// Requests unlimited demand on subscribe
    pub(crate) fn unlimited() -> Arc<Self> {
        Self::build(Demand::Unlimited, Demand::none(), None)
    }

    /// Requests `initial` on subscribe and `per_value` from each receive
    pub(crate) fn with_demand(initial: Demand, per_value: Demand) -> Arc<Self> {
        Self::build(initial, per_value, None)
    }

    /// Unlimited demand, cancelling from inside the `n`th receive
    pub(crate) fn cancelling_after(n: usize) -> Arc<Self> {
        Self::build(Demand::Unlimited, Demand::none(), Some(n))
    }

    /// Cancels right after requesting, before any value can arrive
    pub(crate) fn cancelling_on_subscribe() -> Arc<Self> {
        Self::build(Demand::Unlimited, Demand::none(), Some(0))
    }

    pub(crate) fn values(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.values.lock().unwrap().clone()
    }

    pub(crate) fn value_count(&self) -> usize {
        self.values.lock().unwrap().len()
    }

    pub(crate) fn completions(&self) -> Vec<Completion<Never>> {
        self.completions.lock().unwrap().clone()
    }

    pub(crate) fn subscription(&self) -> Arc<dyn Subscription> {
        self.subscription.lock().unwrap().clone().unwrap()
    }

    pub(crate) fn request(&self, demand: Demand) {
        self.subscription().request(demand);
    }

    pub(crate) fn cancel(&self) {
        self.subscription().cancel();
    }
}

impl<T: Send + 'static> Subscriber for RecordingSubscriber<T> {
    type Input = T;
    type Failure = Never;

    fn receive_subscription(&self, subscription: Arc<dyn Subscription>) {
        *self.subscription.lock().unwrap() = Some(Arc::clone(&subscription));
        if !self.initial.is_none() {
            subscription.request(self.initial);
        }
        if self.cancel_after == Some(0) {
            subscription.cancel();
        }
    }

    fn receive(&self, input: T) -> Demand {
        self.values.lock().unwrap().push(input);
        let received = self.received.fetch_add(1, Ordering::SeqCst) + 1;
        if self.cancel_after == Some(received) {
            self.cancel();
        }
        self.per_value
    }

    fn receive_completion(&self, completion: Completion<Never>) {
        self.completions.lock().unwrap().push(completion);
    }
}
