//! Image download example
//!
//! This example demonstrates the core functionality of fetch-pipeline:
//! - Building a configuration
//! - Downloading a list of images with the sequential publisher
//! - Downloading the same list with the fan-out publisher
//! - Cancelling on Ctrl+C
//!
//! Pass image URLs as arguments, or run without arguments to fetch three
//! images from picsum.photos.

use std::sync::Arc;

use fetch_pipeline::config::{Config, FlowConfig, StorageConfig};
use fetch_pipeline::{
    Completion, DownloadPublisher, FanOutPublisher, Publisher, PublisherExt, ResultItem, Sink,
    SourceList, cancel_on_shutdown,
};
use futures::StreamExt;

const DEFAULT_SOURCES: [&str; 3] = [
    "https://picsum.photos/id/237/400/300",
    "https://picsum.photos/id/238/400/300",
    "https://picsum.photos/id/239/400/300",
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let sources = if args.is_empty() {
        SourceList::parse(DEFAULT_SOURCES)?
    } else {
        SourceList::parse(&args)?
    };

    let config = Config {
        storage: StorageConfig {
            artifact_dir: "downloads".into(),
            file_prefix: "picsum".to_string(),
            extension: Some("jpg".to_string()),
        },
        flow: FlowConfig {
            max_in_flight: 2,
            ..Default::default()
        },
        ..Default::default()
    };
    config.validate()?;

    // Sequential publisher: pull results one at a time, failures are skipped
    println!("Sequential download of {} images", sources.len());
    let publisher = DownloadPublisher::from_config(sources.iter().cloned(), &config)?;
    let mut results = publisher.values(1);
    while let Some(result) = results.next().await {
        report(&result);
    }

    // Fan-out publisher: everything at once, failures reported as absent
    println!("Fan-out download of {} images", sources.len());
    let publisher = FanOutPublisher::from_config(sources.iter().cloned(), &config)?;
    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    let sink = Arc::new(Sink::new(
        |result: ResultItem| report(&result),
        move |completion: Completion| {
            let _ = done_tx.send(completion);
        },
    ));
    publisher.subscribe(Arc::clone(&sink));

    match sink.subscription() {
        Some(subscription) => {
            tokio::select! {
                completion = done_rx => println!("✓ Fan-out finished: {:?}", completion?),
                _ = cancel_on_shutdown(subscription) => println!("✗ Cancelled"),
            }
        }
        // Already finished
        None => {
            let completion = done_rx.await?;
            println!("✓ Fan-out finished: {:?}", completion);
        }
    }

    Ok(())
}

fn report(result: &ResultItem) {
    match result.artifact() {
        Some(artifact) => println!(
            "  ✓ {} ({} bytes)",
            artifact.path().display(),
            artifact.size_bytes
        ),
        None => println!("  ✗ download failed"),
    }
}
