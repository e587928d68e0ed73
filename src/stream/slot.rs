//! Cancel-safe holder of a subscriber reference.
//!
//! Publishers keep their subscriber here instead of holding an `Arc<S>`
//! directly. Cancelling releases the reference, after which every delivery is
//! dropped on the floor. Cancel may be called from inside a delivery callback
//! without deadlocking: the reference is then released as soon as that
//! callback returns.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use tokio_util::sync::CancellationToken;

use super::Subscriber;
use crate::types::{Completion, Demand};

pub(crate) struct SubscriberSlot<S> {
    subscriber: Mutex<Option<Arc<S>>>,
    cancel_token: CancellationToken,
}

impl<S: Subscriber> SubscriberSlot<S> {
    pub(crate) fn new(subscriber: Arc<S>) -> Self {
        Self {
            subscriber: Mutex::new(Some(subscriber)),
            cancel_token: CancellationToken::new(),
        }
    }

    /// Token fired on cancel, for select! loops in driver tasks
    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Hand `value` to the subscriber
    ///
    /// Returns the additional demand it signalled, or `None` when the slot is
    /// cancelled or already completed.
    pub(crate) fn deliver(&self, value: S::Input) -> Option<Demand> {
        let demand = {
            let mut guard = self.lock();
            if self.is_cancelled() {
                guard.take();
                return None;
            }
            let subscriber = guard.as_ref()?;
            subscriber.receive(value)
        };

        // A cancel that found the lock held left the reference for us
        if self.is_cancelled() {
            self.lock().take();
            return None;
        }
        Some(demand)
    }

    /// Send the terminal signal; at most once, never after cancel
    pub(crate) fn complete(&self, completion: Completion<S::Failure>) -> bool {
        let mut guard = self.lock();
        if self.is_cancelled() {
            guard.take();
            return false;
        }
        match guard.take() {
            Some(subscriber) => {
                subscriber.receive_completion(completion);
                true
            }
            None => false,
        }
    }

    /// Fire the token and release the subscriber; true on the first call
    pub(crate) fn cancel(&self) -> bool {
        if self.cancel_token.is_cancelled() {
            return false;
        }
        self.cancel_token.cancel();

        // A delivery in progress holds the lock and releases the reference itself
        match self.subscriber.try_lock() {
            Ok(mut guard) => {
                guard.take();
            }
            Err(TryLockError::Poisoned(poisoned)) => {
                poisoned.into_inner().take();
            }
            Err(TryLockError::WouldBlock) => {}
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<S>>> {
        self.subscriber.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
