//! Download pipelines built on the [`crate::stream`] protocol.
//!
//! Two ways to turn a list of sources into a stream of [`ResultItem`]s:
//! - [`sequential`] - [`DownloadPublisher`]: lazy, demand-driven, drops failures
//!   by default
//! - [`fan_out`] - [`FanOutStage`]: eager, every failure forwarded as
//!   [`ResultItem::Absent`]
//!
//! Plus [`source_list`] - [`SourceList`], a publisher of plain sources that
//! can feed a fan-out stage.
//!
//! [`ResultItem`]: crate::types::ResultItem
//! [`ResultItem::Absent`]: crate::types::ResultItem::Absent

pub mod fan_out;
pub mod sequential;
pub mod source_list;

pub use fan_out::{FanOutPublisher, FanOutStage};
pub use sequential::{DownloadPublisher, DownloadSubscription};
pub use source_list::SourceList;

use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle of a subscription
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Created, no demand yet
    Created,
    /// Work started
    Active,
    /// Every value was delivered and the completion sent
    Completed,
    /// Cancelled before completing
    Cancelled,
}

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique id used to correlate log lines of one subscription
pub(crate) fn next_subscription_id() -> u64 {
    NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed)
}
