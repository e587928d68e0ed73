//! Lazy download publisher.
//!
//! Nothing happens until the first positive request. The subscription then
//! fetches the source list with up to `max_in_flight` fetches running at once
//! and hands results over in completion order, one per unit of demand. With
//! `max_in_flight = 1` results arrive in list order.

use futures::stream::{self, StreamExt};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::{SubscriptionState, next_subscription_id};
use crate::config::{AbsentPolicy, Config, FlowConfig};
use crate::error::Result;
use crate::fetcher::Fetcher;
use crate::stream::demand::DemandLedger;
use crate::stream::slot::SubscriberSlot;
use crate::stream::{Publisher, Subscriber, Subscription};
use crate::types::{Completion, Demand, Never, ResultItem, SourceItem};

/// Publisher downloading a fixed list of sources for each subscriber
///
/// Every subscription re-runs the whole list independently.
#[derive(Clone)]
pub struct DownloadPublisher {
    sources: Arc<[SourceItem]>,
    fetcher: Fetcher,
    flow: FlowConfig,
}

impl DownloadPublisher {
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

    /// Sources fetched by every subscription
    pub fn sources(&self) -> &[SourceItem] {
        &self.sources
    }
}

impl Publisher for DownloadPublisher {
    type Output = ResultItem;
    type Failure = Never;

    fn subscribe<S>(&self, subscriber: Arc<S>)
    where
        S: Subscriber<Input = ResultItem, Failure = Never>,
    {
        let subscription = DownloadSubscription::new(
            Arc::clone(&self.sources),
            self.fetcher.clone(),
            self.flow.clone(),
            Arc::clone(&subscriber),
        );
        tracing::debug!(
            subscription_id = subscription.id(),
            sources = self.sources.len(),
            "Subscription created"
        );
        subscriber.receive_subscription(subscription);
    }
}

/// One subscriber's run over the source list
///
/// The first positive request spawns the driver task, so `request` must be
/// called from within a tokio runtime.
pub struct DownloadSubscription<S> {
    id: u64,
    this: Weak<Self>,
    sources: Arc<[SourceItem]>,
    fetcher: Fetcher,
    flow: FlowConfig,
    state: Mutex<SubscriptionState>,
    slot: SubscriberSlot<S>,
    demand: DemandLedger,
}

impl<S> DownloadSubscription<S>
where
    S: Subscriber<Input = ResultItem, Failure = Never>,
{
    pub(crate) fn new(
        sources: Arc<[SourceItem]>,
        fetcher: Fetcher,
        flow: FlowConfig,
        subscriber: Arc<S>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            id: next_subscription_id(),
            this: this.clone(),
            sources,
            fetcher,
            demand: DemandLedger::new(flow.demand_policy),
            flow,
            state: Mutex::new(SubscriptionState::Created),
            slot: SubscriberSlot::new(subscriber),
        })
    }

    /// Id used in log lines
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> SubscriptionState {
        *self.lock_state()
    }

    /// Total demand requested so far
    pub fn requested(&self) -> Demand {
        self.demand.requested()
    }

    fn lock_state(&self) -> MutexGuard<'_, SubscriptionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, from: SubscriptionState, to: SubscriptionState) -> bool {
        let mut state = self.lock_state();
        if *state == from {
            *state = to;
            true
        } else {
            false
        }
    }

    /// Move to `Completed` and deliver the completion; false if cancelled first
    fn finish(&self) -> bool {
        if !self.transition(SubscriptionState::Active, SubscriptionState::Completed) {
            return false;
        }
        if self.slot.complete(Completion::Finished) {
            return true;
        }
        // Cancel landed between the state change and the delivery
        *self.lock_state() = SubscriptionState::Cancelled;
        false
    }

    async fn run(self: Arc<Self>) {
        let cancel_token = self.slot.cancel_token().clone();
        let fetcher = self.fetcher.clone();
        // Dropped handles detach: in-flight fetches finish, their results are discarded
        let mut results = stream::iter(self.sources.to_vec())
            .map(move |source| {
                let fetcher = fetcher.clone();
                tokio::spawn(async move { fetcher.fetch(&source).await })
            })
            .buffer_unordered(self.flow.max_in_flight.max(1));

        let mut delivered = 0usize;
        let mut dropped = 0usize;

        let exhausted = loop {
            let joined = tokio::select! {
                biased;
                _ = cancel_token.cancelled() => break false,
                joined = results.next() => joined,
            };
            let Some(joined) = joined else {
                break true;
            };

            let item = joined.unwrap_or_else(|e| {
                tracing::error!(subscription_id = self.id, error = %e, "Fetch task failed");
                ResultItem::Absent
            });
            if item.is_absent() && self.flow.absent_policy == AbsentPolicy::Drop {
                dropped += 1;
                tracing::debug!(subscription_id = self.id, "Dropping absent result");
                continue;
            }

            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => break false,
                _ = self.demand.take() => {}
            }

            match self.slot.deliver(item) {
                Some(more) => {
                    delivered += 1;
                    self.demand.add(more);
                }
                None => break false,
            }
        };

        if exhausted && self.finish() {
            tracing::debug!(
                subscription_id = self.id,
                delivered,
                dropped,
                "Subscription finished"
            );
        } else {
            tracing::debug!(
                subscription_id = self.id,
                delivered,
                "Subscription stopped"
            );
        }
    }
}

impl<S> Subscription for DownloadSubscription<S>
where
    S: Subscriber<Input = ResultItem, Failure = Never>,
{
    fn request(&self, demand: Demand) {
        self.demand.add(demand);
        if demand.is_none() || !self.transition(SubscriptionState::Created, SubscriptionState::Active) {
            return;
        }
        let Some(this) = self.this.upgrade() else {
            return;
        };
        tracing::debug!(subscription_id = self.id, %demand, "Subscription started");
        tokio::spawn(this.run());
    }

    fn cancel(&self) {
        let previous = {
            let mut state = self.lock_state();
            let previous = *state;
            if previous != SubscriptionState::Completed {
                *state = SubscriptionState::Cancelled;
            }
            previous
        };
        if self.slot.cancel() && previous != SubscriptionState::Completed {
            tracing::debug!(subscription_id = self.id, ?previous, "Subscription cancelled");
        }
    }
}
