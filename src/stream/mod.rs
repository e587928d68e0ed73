//! Publisher/subscriber protocol.
//!
//! The contract every producer and consumer in the crate follows:
//! - [`Publisher::subscribe`] builds a fresh [`Subscription`] and hands it to the
//!   subscriber through [`Subscriber::receive_subscription`]
//! - the subscriber asks for values with [`Subscription::request`]
//! - values arrive through [`Subscriber::receive`], whose return value adds demand
//! - exactly one [`Subscriber::receive_completion`] follows, unless the
//!   subscription was cancelled first
//!
//! Callbacks may be invoked from any runtime worker thread, but never
//! concurrently for the same subscription. A subscriber may call `request` or
//! `cancel` from inside its own callbacks.
//!
//! Submodules:
//! - `demand` - Outstanding-demand bookkeeping shared by publishers
//! - `slot` - Cancel-safe holder of the subscriber reference
//! - `sink` - Closure-based subscriber and [`Cancellable`]
//! - `values` - Adapter from a publisher to a [`futures::Stream`]

pub(crate) mod demand;
pub(crate) mod slot;
mod sink;
mod values;

pub use sink::{Cancellable, Sink};
pub use values::ValueStream;

use std::sync::Arc;

use crate::types::{Completion, Demand, Never};

/// Live link between one publisher and one subscriber
pub trait Subscription: Send + Sync {
    /// Ask for up to `demand` more values
    fn request(&self, demand: Demand);

    /// Stop delivery; idempotent
    ///
    /// Work already in flight may finish, but its results are discarded.
    fn cancel(&self);
}

/// Consumer side of the protocol
pub trait Subscriber: Send + Sync + 'static {
    /// Values this subscriber accepts
    type Input: Send + 'static;
    /// Failure type of the completion signal
    type Failure: Send + 'static;

    /// Called once with the subscription created for this subscriber
    fn receive_subscription(&self, subscription: Arc<dyn Subscription>);

    /// Called for each value; returns additional demand
    fn receive(&self, input: Self::Input) -> Demand;

    /// Called at most once, after every value
    fn receive_completion(&self, completion: Completion<Self::Failure>);
}

/// Producer side of the protocol
pub trait Publisher {
    /// Values emitted to subscribers
    type Output: Send + 'static;
    /// Failure type of the completion signal
    type Failure: Send + 'static;

    /// Attach `subscriber`, creating an independent subscription
    fn subscribe<S>(&self, subscriber: Arc<S>)
    where
        S: Subscriber<Input = Self::Output, Failure = Self::Failure>;
}

/// Convenience consumers available on every [`Publisher`]
pub trait PublisherExt: Publisher {
    /// Subscribe with closures, requesting unlimited demand
    ///
    /// The returned [`Cancellable`] cancels the subscription when dropped.
    fn sink<V, C>(&self, on_value: V, on_completion: C) -> Cancellable
    where
        V: Fn(Self::Output) + Send + Sync + 'static,
        C: FnOnce(Completion<Self::Failure>) + Send + 'static,
    {
        let sink = Arc::new(Sink::new(on_value, on_completion));
        self.subscribe(Arc::clone(&sink));
        Cancellable::new(move || sink.cancel())
    }

    /// Consume values as a [`futures::Stream`] with a demand window of `window`
    ///
    /// `window` values are requested up front and one more each time the stream
    /// yields, so at most `window` values are ever buffered.
    fn values(&self, window: usize) -> ValueStream<Self::Output>
    where
        Self: Publisher<Failure = Never>,
    {
        let (stream, collector) = ValueStream::new(window);
        self.subscribe(collector);
        stream
    }
}

impl<P: Publisher + ?Sized> PublisherExt for P {}
