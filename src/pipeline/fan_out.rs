//! Eager fan-out/fan-in download stage.
//!
//! Every source received is fetched at once in its own task; results are
//! forwarded downstream in completion order. Failed fetches are forwarded as
//! [`ResultItem::Absent`] so the downstream count always matches the input
//! count. Fetching does not wait for demand, delivery does.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use super::next_subscription_id;
use crate::config::{Config, FlowConfig};
use crate::error::Result;
use crate::fetcher::Fetcher;
use crate::stream::demand::DemandLedger;
use crate::stream::slot::SubscriberSlot;
use crate::stream::{Publisher, Subscriber, Subscription};
use crate::types::{Completion, Demand, Never, ResultItem, SourceItem};

/// Intermediate stage: a subscriber of sources and a subscription of results
///
/// Either [`launch`](Self::launch)ed over a fixed list or
/// [`attach`](Self::attach)ed to an upstream publisher of [`SourceItem`]s.
/// Completes downstream once the input is closed and every fetch has been
/// forwarded.
pub struct FanOutStage<S> {
    id: u64,
    fetcher: Fetcher,
    slot: SubscriberSlot<S>,
    demand: DemandLedger,
    input: Mutex<Option<mpsc::UnboundedSender<SourceItem>>>,
    upstream: Mutex<Option<Arc<dyn Subscription>>>,
}

impl<S> FanOutStage<S>
where
    S: Subscriber<Input = ResultItem, Failure = Never>,
{
    /// Start fetching every source in `sources` immediately
    ///
    /// Must be called from within a tokio runtime.
    pub fn launch(
        sources: impl IntoIterator<Item = SourceItem>,
        fetcher: Fetcher,
        flow: &FlowConfig,
        downstream: Arc<S>,
    ) -> Arc<Self> {
        let (stage, work) = Self::build(fetcher, flow, Arc::clone(&downstream));
        let mut launched = 0usize;
        for source in sources {
            stage.enqueue(source);
            launched += 1;
        }
        stage.close_input();
        tracing::debug!(stage_id = stage.id, launched, "Fan-out stage launched");
        stage.start(work, downstream);
        stage
    }

    /// Create a stage fed by an upstream publisher
    ///
    /// Subscribe the returned stage to a publisher of [`SourceItem`]s; it
    /// requests unlimited demand upstream and completes after the upstream
    /// does. Must be called from within a tokio runtime.
    pub fn attach(fetcher: Fetcher, flow: &FlowConfig, downstream: Arc<S>) -> Arc<Self> {
        let (stage, work) = Self::build(fetcher, flow, Arc::clone(&downstream));
        stage.start(work, downstream);
        stage
    }

    /// Id used in log lines
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether more sources can still be received
    pub fn is_accepting(&self) -> bool {
        self.lock_input().is_some()
    }

    fn build(
        fetcher: Fetcher,
        flow: &FlowConfig,
        downstream: Arc<S>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<SourceItem>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let stage = Arc::new(Self {
            id: next_subscription_id(),
            fetcher,
            slot: SubscriberSlot::new(downstream),
            demand: DemandLedger::new(flow.demand_policy),
            input: Mutex::new(Some(sender)),
            upstream: Mutex::new(None),
        });
        (stage, receiver)
    }

    fn start(self: &Arc<Self>, work: mpsc::UnboundedReceiver<SourceItem>, downstream: Arc<S>) {
        downstream.receive_subscription(Arc::clone(self) as Arc<dyn Subscription>);
        tokio::spawn(Arc::clone(self).run(work));
    }

    fn enqueue(&self, source: SourceItem) {
        match self.lock_input().as_ref() {
            // Send only fails once the driver has stopped after cancel
            Some(sender) => {
                let _ = sender.send(source);
            }
            None => {
                tracing::warn!(stage_id = self.id, source = %source, "Input closed, source ignored");
            }
        }
    }

    fn close_input(&self) {
        self.lock_input().take();
    }

    async fn run(self: Arc<Self>, mut work: mpsc::UnboundedReceiver<SourceItem>) {
        let cancel_token = self.slot.cancel_token().clone();
        let mut group: JoinSet<ResultItem> = JoinSet::new();
        // Joined results waiting for demand
        let mut ready: VecDeque<ResultItem> = VecDeque::new();
        let mut input_open = true;
        let mut launched = 0usize;
        let mut forwarded = 0usize;

        let drained = loop {
            if !input_open && group.is_empty() && ready.is_empty() {
                break true;
            }
            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => break false,
                _ = self.demand.take(), if !ready.is_empty() => {
                    let Some(item) = ready.pop_front() else {
                        continue;
                    };
                    match self.slot.deliver(item) {
                        Some(more) => {
                            forwarded += 1;
                            self.demand.add(more);
                        }
                        None => break false,
                    }
                }
                next = work.recv(), if input_open => match next {
                    Some(source) => {
                        let fetcher = self.fetcher.clone();
                        group.spawn(async move { fetcher.fetch(&source).await });
                        launched += 1;
                    }
                    None => input_open = false,
                },
                Some(joined) = group.join_next(), if !group.is_empty() => {
                    let item = joined.unwrap_or_else(|e| {
                        tracing::error!(stage_id = self.id, error = %e, "Fetch task failed");
                        ResultItem::Absent
                    });
                    ready.push_back(item);
                }
            }
        };

        if drained {
            self.slot.complete(Completion::Finished);
            tracing::debug!(stage_id = self.id, launched, forwarded, "Fan-out stage finished");
        } else {
            // In-flight fetches run to completion; their results are discarded
            group.detach_all();
            ready.clear();
            tracing::debug!(stage_id = self.id, launched, forwarded, "Fan-out stage stopped");
        }
    }

    fn lock_input(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<SourceItem>>> {
        self.input.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_upstream(&self) -> MutexGuard<'_, Option<Arc<dyn Subscription>>> {
        self.upstream.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S> Subscription for FanOutStage<S>
where
    S: Subscriber<Input = ResultItem, Failure = Never>,
{
    fn request(&self, demand: Demand) {
        self.demand.add(demand);
    }

    fn cancel(&self) {
        if self.slot.cancel() {
            tracing::debug!(stage_id = self.id, "Fan-out stage cancelled");
        }
        self.close_input();
        let upstream = self.lock_upstream().take();
        if let Some(upstream) = upstream {
            upstream.cancel();
        }
    }
}

impl<S> Subscriber for FanOutStage<S>
where
    S: Subscriber<Input = ResultItem, Failure = Never>,
{
    type Input = SourceItem;
    type Failure = Never;

    fn receive_subscription(&self, subscription: Arc<dyn Subscription>) {
        if self.slot.is_cancelled() || !self.is_accepting() {
            subscription.cancel();
            return;
        }
        {
            let mut upstream = self.lock_upstream();
            if upstream.is_some() {
                drop(upstream);
                subscription.cancel();
                return;
            }
            *upstream = Some(Arc::clone(&subscription));
        }
        subscription.request(Demand::Unlimited);
    }

    fn receive(&self, source: SourceItem) -> Demand {
        self.enqueue(source);
        Demand::none()
    }

    fn receive_completion(&self, completion: Completion<Never>) {
        match completion {
            Completion::Finished => {}
            Completion::Failed(never) => match never {},
        }
        self.lock_upstream().take();
        self.close_input();
    }
}

/// Publisher launching a fresh [`FanOutStage`] over its sources per subscriber
#[derive(Clone)]
pub struct FanOutPublisher {
    sources: Arc<[SourceItem]>,
    fetcher: Fetcher,
    flow: FlowConfig,
}

impl FanOutPublisher {
    /// Create a publisher over `sources`
    pub fn new(sources: impl IntoIterator<Item = SourceItem>, fetcher: Fetcher, flow: FlowConfig) -> Self {
        Self {
            sources: sources.into_iter().collect(),
            fetcher,
            flow,
        }
    }

    /// Create a publisher using the HTTP fetcher and flow settings of `config`
    pub fn from_config(sources: impl IntoIterator<Item = SourceItem>, config: &Config) -> Result<Self> {
        Ok(Self::new(sources, Fetcher::from_config(config)?, config.flow.clone()))
    }
}

impl Publisher for FanOutPublisher {
    type Output = ResultItem;
    type Failure = Never;

    fn subscribe<S>(&self, subscriber: Arc<S>)
    where
        S: Subscriber<Input = ResultItem, Failure = Never>,
    {
        FanOutStage::launch(
            self.sources.iter().cloned(),
            self.fetcher.clone(),
            &self.flow,
            subscriber,
        );
    }
}
