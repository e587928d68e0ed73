//! Outstanding-demand bookkeeping.

use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

use crate::config::DemandPolicy;
use crate::types::Demand;

#[derive(Default)]
struct Counts {
    requested: Demand,
    outstanding: Demand,
}

/// Demand granted by a subscriber and not yet consumed by deliveries
///
/// Under [`DemandPolicy::Unlimited`] any positive request opens the gate for
/// good; the amount is still recorded in [`DemandLedger::requested`].
pub(crate) struct DemandLedger {
    policy: DemandPolicy,
    counts: Mutex<Counts>,
    available: Notify,
}

impl DemandLedger {
    pub(crate) fn new(policy: DemandPolicy) -> Self {
        Self {
            policy,
            counts: Mutex::new(Counts::default()),
            available: Notify::new(),
        }
    }

    pub(crate) fn add(&self, demand: Demand) {
        if demand.is_none() {
            return;
        }
        {
            let mut counts = self.lock();
            counts.requested += demand;
            counts.outstanding = match self.policy {
                DemandPolicy::Honor => counts.outstanding + demand,
                DemandPolicy::Unlimited => Demand::Unlimited,
            };
        }
        self.available.notify_one();
    }

    /// Consume one unit without waiting
    pub(crate) fn try_take(&self) -> bool {
        self.lock().outstanding.take_one()
    }

    /// Wait until one unit is available and consume it
    pub(crate) async fn take(&self) {
        loop {
            let notified = self.available.notified();
            if self.try_take() {
                return;
            }
            notified.await;
        }
    }

    pub(crate) fn outstanding(&self) -> Demand {
        self.lock().outstanding
    }

    /// Total demand ever requested
    pub(crate) fn requested(&self) -> Demand {
        self.lock().requested
    }

    fn lock(&self) -> MutexGuard<'_, Counts> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
