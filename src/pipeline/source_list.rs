//! Publisher of a fixed list of sources.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::next_subscription_id;
use crate::config::DemandPolicy;
use crate::error::Result;
use crate::stream::demand::DemandLedger;
use crate::stream::slot::SubscriberSlot;
use crate::stream::{Publisher, Subscriber, Subscription};
use crate::types::{Completion, Demand, Never, SourceItem};

/// Emits its sources in order, synchronously, as demand allows
///
/// Completes as soon as the list is exhausted. Usable without a runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceList {
    sources: Arc<[SourceItem]>,
}

impl SourceList {
    /// Create a list publisher
    pub fn new(sources: impl IntoIterator<Item = SourceItem>) -> Self {
        Self {
            sources: sources.into_iter().collect(),
        }
    }

    /// Parse every locator, failing on the first invalid one
    pub fn parse<I>(locators: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let sources = locators
            .into_iter()
            .map(|locator| SourceItem::parse(locator.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(sources))
    }

    /// Number of sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Iterate over the sources
    pub fn iter(&self) -> impl Iterator<Item = &SourceItem> {
        self.sources.iter()
    }
}

impl Publisher for SourceList {
    type Output = SourceItem;
    type Failure = Never;

    fn subscribe<S>(&self, subscriber: Arc<S>)
    where
        S: Subscriber<Input = SourceItem, Failure = Never>,
    {
        let subscription = Arc::new(ListSubscription {
            id: next_subscription_id(),
            pending: Mutex::new(self.sources.iter().cloned().collect()),
            slot: SubscriberSlot::new(Arc::clone(&subscriber)),
            demand: DemandLedger::new(DemandPolicy::Honor),
            draining: AtomicBool::new(false),
        });
        subscriber.receive_subscription(subscription);
    }
}

enum Step {
    Emit(SourceItem),
    Exhausted,
    Wait,
}

struct ListSubscription<S> {
    id: u64,
    pending: Mutex<VecDeque<SourceItem>>,
    slot: SubscriberSlot<S>,
    demand: DemandLedger,
    draining: AtomicBool,
}

impl<S> ListSubscription<S>
where
    S: Subscriber<Input = SourceItem, Failure = Never>,
{
    /// Emit while demand lasts; re-entrant calls from inside `receive` only
    /// add demand and leave the emitting to the outer call
    fn drain(&self) {
        loop {
            if self.draining.swap(true, Ordering::AcqRel) {
                return;
            }
            loop {
                if self.slot.is_cancelled() {
                    break;
                }
                let step = {
                    let mut pending = self.lock_pending();
                    if pending.is_empty() {
                        Step::Exhausted
                    } else if self.demand.try_take() {
                        pending.pop_front().map_or(Step::Exhausted, Step::Emit)
                    } else {
                        Step::Wait
                    }
                };
                match step {
                    Step::Emit(source) => match self.slot.deliver(source) {
                        Some(more) => self.demand.add(more),
                        None => break,
                    },
                    Step::Exhausted => {
                        if self.slot.complete(Completion::Finished) {
                            tracing::trace!(subscription_id = self.id, "Source list exhausted");
                        }
                        break;
                    }
                    Step::Wait => break,
                }
            }
            self.draining.store(false, Ordering::Release);

            // Demand that arrived while the flag was held
            let more_to_emit = !self.slot.is_cancelled()
                && !self.lock_pending().is_empty()
                && !self.demand.outstanding().is_none();
            if !more_to_emit {
                return;
            }
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, VecDeque<SourceItem>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S> Subscription for ListSubscription<S>
where
    S: Subscriber<Input = SourceItem, Failure = Never>,
{
    fn request(&self, demand: Demand) {
        self.demand.add(demand);
        self.drain();
    }

    fn cancel(&self) {
        if self.slot.cancel() {
            self.lock_pending().clear();
        }
    }
}
