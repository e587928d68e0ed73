//! Publisher-to-[`Stream`] adapter with a bounded demand window.

use futures::Stream;
use std::pin::Pin;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{Subscriber, Subscription};
use crate::types::{Completion, Demand, Never};

/// Values of a publisher as a [`futures::Stream`]
///
/// Ends after the publisher finishes. Dropping the stream cancels the
/// subscription.
pub struct ValueStream<T> {
    receiver: UnboundedReceiverStream<T>,
    collector: Arc<Collector<T>>,
}

impl<T: Send + 'static> ValueStream<T> {
    pub(crate) fn new(window: usize) -> (Self, Arc<Collector<T>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let collector = Arc::new(Collector {
            window: window.max(1),
            sender: Mutex::new(Some(sender)),
            subscription: OnceLock::new(),
        });
        let stream = Self {
            receiver: UnboundedReceiverStream::new(receiver),
            collector: Arc::clone(&collector),
        };
        (stream, collector)
    }
}

impl<T> Stream for ValueStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let polled = Pin::new(&mut self.receiver).poll_next(cx);
        if let Poll::Ready(Some(_)) = &polled {
            if let Some(subscription) = self.collector.subscription.get() {
                subscription.request(Demand::max(1));
            }
        }
        polled
    }
}

impl<T> Drop for ValueStream<T> {
    fn drop(&mut self) {
        if let Some(subscription) = self.collector.subscription.get() {
            subscription.cancel();
        }
    }
}

/// Subscriber side of a [`ValueStream`]
pub(crate) struct Collector<T> {
    window: usize,
    sender: Mutex<Option<mpsc::UnboundedSender<T>>>,
    subscription: OnceLock<Arc<dyn Subscription>>,
}

impl<T: Send + 'static> Subscriber for Collector<T> {
    type Input = T;
    type Failure = Never;

    fn receive_subscription(&self, subscription: Arc<dyn Subscription>) {
        if self.subscription.set(Arc::clone(&subscription)).is_err() {
            subscription.cancel();
            return;
        }
        subscription.request(Demand::max(self.window));
    }

    fn receive(&self, input: T) -> Demand {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = sender.as_ref() {
            // The stream may already be gone; cancel follows from its Drop
            let _ = sender.send(input);
        }
        Demand::none()
    }

    fn receive_completion(&self, completion: Completion<Never>) {
        match completion {
            Completion::Finished => {}
            Completion::Failed(never) => match never {},
        }
        // Closing the channel ends the stream once buffered values are read
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
