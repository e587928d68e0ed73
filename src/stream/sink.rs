//! Closure-based subscriber and its cancellation handle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Subscriber, Subscription};
use crate::types::{Completion, Demand};

type ValueFn<I> = Box<dyn Fn(I) + Send + Sync>;
type CompletionFn<F> = Box<dyn FnOnce(Completion<F>) + Send>;

/// Subscriber forwarding every value and the completion to closures
///
/// Requests unlimited demand as soon as it is subscribed.
pub struct Sink<I, F> {
    on_value: ValueFn<I>,
    on_completion: Mutex<Option<CompletionFn<F>>>,
    subscription: Mutex<Option<Arc<dyn Subscription>>>,
}

impl<I, F> Sink<I, F> {
    /// Create a sink from its two callbacks
    pub fn new<V, C>(on_value: V, on_completion: C) -> Self
    where
        V: Fn(I) + Send + Sync + 'static,
        C: FnOnce(Completion<F>) + Send + 'static,
    {
        Self {
            on_value: Box::new(on_value),
            on_completion: Mutex::new(Some(Box::new(on_completion))),
            subscription: Mutex::new(None),
        }
    }

    /// The current subscription; `None` before subscribing and after completion
    pub fn subscription(&self) -> Option<Arc<dyn Subscription>> {
        self.lock_subscription().clone()
    }

    /// Cancel the current subscription, if any
    pub fn cancel(&self) {
        let subscription = self.lock_subscription().take();
        if let Some(subscription) = subscription {
            subscription.cancel();
        }
    }

    fn lock_subscription(&self) -> MutexGuard<'_, Option<Arc<dyn Subscription>>> {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<I, F> Subscriber for Sink<I, F>
where
    I: Send + 'static,
    F: Send + 'static,
{
    type Input = I;
    type Failure = F;

    fn receive_subscription(&self, subscription: Arc<dyn Subscription>) {
        {
            let mut current = self.lock_subscription();
            if current.is_some() {
                drop(current);
                subscription.cancel();
                return;
            }
            *current = Some(Arc::clone(&subscription));
        }
        subscription.request(Demand::Unlimited);
    }

    fn receive(&self, input: I) -> Demand {
        (self.on_value)(input);
        Demand::none()
    }

    fn receive_completion(&self, completion: Completion<F>) {
        self.lock_subscription().take();
        let on_completion = self
            .on_completion
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(on_completion) = on_completion {
            on_completion(completion);
        }
    }
}

/// Handle that cancels a subscription when cancelled or dropped
#[must_use = "dropping a Cancellable cancels its subscription"]
pub struct Cancellable {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Cancellable {
    /// Wrap the action to run on cancel
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Cancel now
    pub fn cancel(mut self) {
        self.run();
    }

    /// Keep the handle alive in `bag`; cancelled when the bag is dropped
    pub fn store(self, bag: &mut Vec<Cancellable>) {
        bag.push(self);
    }

    fn run(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Cancellable {
    fn drop(&mut self) {
        self.run();
    }
}

impl std::fmt::Debug for Cancellable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cancellable")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}
