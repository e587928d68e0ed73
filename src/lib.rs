//! # fetch-pipeline
//!
//! Demand-driven download pipelines: turn a list of remote sources into a
//! stream of locally persisted artifacts.
//!
//! ## Design Philosophy
//!
//! - **Backpressure** - Consumers say how many results they want; nothing is
//!   delivered beyond that
//! - **Failures are values** - A failed fetch never fails the pipeline; it is
//!   either skipped or reported as [`ResultItem::Absent`]
//! - **Cancel at any time** - Cancelling stops delivery at once; in-flight
//!   fetches finish quietly
//! - **Replaceable seams** - Retrieval and storage sit behind traits
//!
//! ## Quick Start
//!
//! ```no_run
//! use fetch_pipeline::{Config, DownloadPublisher, PublisherExt, SourceList};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sources = SourceList::parse([
//!         "https://picsum.photos/id/237/200/300",
//!         "https://picsum.photos/id/238/200/300",
//!     ])?;
//!     let publisher = DownloadPublisher::from_config(sources.iter().cloned(), &Config::default())?;
//!
//!     // At most four results buffered at a time
//!     let mut results = publisher.values(4);
//!     while let Some(result) = results.next().await {
//!         println!("{:?}", result.artifact().map(|a| a.path()));
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Retrieve-and-persist of a single source
pub mod fetcher;
/// Sequential and fan-out download pipelines
pub mod pipeline;
/// Publisher/subscriber protocol with demand and cancel
pub mod stream;
/// Core types
pub mod types;

#[cfg(test)]
// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod test_helpers;

use std::sync::Arc;

// Re-export commonly used types
pub use config::{AbsentPolicy, Config, DemandPolicy, FetchConfig, FlowConfig, StorageConfig};
pub use error::{Error, FetchError, Result};
pub use fetcher::{ArtifactStore, ContentSource, DirectoryStore, Fetcher, HttpSource};
pub use pipeline::{
    DownloadPublisher, DownloadSubscription, FanOutPublisher, FanOutStage, SourceList,
    SubscriptionState,
};
pub use stream::{Cancellable, Publisher, PublisherExt, Sink, Subscriber, Subscription, ValueStream};
pub use types::{Artifact, ArtifactId, Completion, Demand, Never, ResultItem, SourceItem};

/// Cancel `subscription` when the process receives a termination signal.
///
/// Resolves after the signal arrived and the subscription was cancelled.
/// Race it against the pipeline's own completion to stop early on Ctrl+C.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use fetch_pipeline::{
///     cancel_on_shutdown, Completion, Config, DownloadPublisher, Publisher, ResultItem, Sink, SourceList,
/// };
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let sources = SourceList::parse(["https://picsum.photos/200/300"])?;
///     let publisher = DownloadPublisher::from_config(sources.iter().cloned(), &Config::default())?;
///
///     let (done_tx, done_rx) = tokio::sync::oneshot::channel();
///     let sink = Arc::new(Sink::new(
///         |result: ResultItem| println!("{result:?}"),
///         move |_: Completion| {
///             let _ = done_tx.send(());
///         },
///     ));
///     publisher.subscribe(Arc::clone(&sink));
///
///     if let Some(subscription) = sink.subscription() {
///         tokio::select! {
///             _ = done_rx => {}
///             _ = cancel_on_shutdown(subscription) => {}
///         }
///     }
///     Ok(())
/// }
/// ```
pub async fn cancel_on_shutdown(subscription: Arc<dyn Subscription>) {
    wait_for_signal().await;
    tracing::info!("Cancelling subscription on shutdown");
    subscription.cancel();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
