//! Core types for fetch-pipeline

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Error;

/// Uninhabited failure type of a pipeline that cannot fail
///
/// Per-item failures travel as [`ResultItem::Absent`] values instead.
pub type Never = std::convert::Infallible;

/// Opaque locator of a remote resource
///
/// Always an absolute URL. Serializes as its string form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceItem(url::Url);

impl SourceItem {
    /// Wrap an already-parsed URL
    pub fn new(url: url::Url) -> Self {
        Self(url)
    }

    /// Parse a locator, rejecting anything that is not an absolute URL
    pub fn parse(locator: &str) -> Result<Self, Error> {
        url::Url::parse(locator)
            .map(Self)
            .map_err(|e| Error::InvalidSource {
                locator: locator.to_string(),
                reason: e.to_string(),
            })
    }

    /// The underlying URL
    pub fn url(&self) -> &url::Url {
        &self.0
    }

    /// The locator as text
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<url::Url> for SourceItem {
    fn from(url: url::Url) -> Self {
        Self(url)
    }
}

impl TryFrom<String> for SourceItem {
    type Error = Error;

    fn try_from(locator: String) -> Result<Self, Self::Error> {
        Self::parse(&locator)
    }
}

impl From<SourceItem> for String {
    fn from(source: SourceItem) -> Self {
        source.0.into()
    }
}

impl std::str::FromStr for SourceItem {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for SourceItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Unique identifier of a locally persisted artifact
///
/// Random 128-bit value, rendered as 32 lowercase hex characters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(pub u128);

impl ArtifactId {
    /// Draw a fresh random identifier
    pub fn random() -> Self {
        Self(rand::random())
    }

    /// Get the inner value
    pub fn get(&self) -> u128 {
        self.0
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl std::str::FromStr for ArtifactId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(u128::from_str_radix(s, 16)?))
    }
}

/// A downloaded resource stored on local disk
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Unique identifier, also embedded in the file name
    pub id: ArtifactId,
    /// Location of the stored bytes
    pub path: PathBuf,
    /// Number of bytes written
    pub size_bytes: u64,
}

impl Artifact {
    /// Location of the stored bytes
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Outcome of fetching one source
///
/// Failure is an ordinary value here, not an error: the stream of outcomes
/// itself never fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResultItem {
    /// The resource was retrieved and stored
    Success(Artifact),
    /// Retrieval or storage failed
    Absent,
}

impl ResultItem {
    /// Whether the fetch produced an artifact
    pub fn is_success(&self) -> bool {
        matches!(self, ResultItem::Success(_))
    }

    /// Whether the fetch failed
    pub fn is_absent(&self) -> bool {
        matches!(self, ResultItem::Absent)
    }

    /// Borrow the artifact, if any
    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            ResultItem::Success(artifact) => Some(artifact),
            ResultItem::Absent => None,
        }
    }

    /// Take the artifact, if any
    pub fn into_artifact(self) -> Option<Artifact> {
        match self {
            ResultItem::Success(artifact) => Some(artifact),
            ResultItem::Absent => None,
        }
    }
}

impl From<Option<Artifact>> for ResultItem {
    fn from(artifact: Option<Artifact>) -> Self {
        artifact.map_or(ResultItem::Absent, ResultItem::Success)
    }
}

/// Number of values a subscriber is willing to receive
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Demand {
    /// At most this many more values
    Max(usize),
    /// Any number of values
    Unlimited,
}

impl Demand {
    /// No additional demand
    pub const NONE: Demand = Demand::Max(0);

    /// Demand for exactly `n` more values
    pub fn max(n: usize) -> Self {
        Demand::Max(n)
    }

    /// No additional demand
    pub fn none() -> Self {
        Self::NONE
    }

    /// Whether this is zero demand
    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    /// Whether this is the unlimited sentinel
    pub fn is_unlimited(&self) -> bool {
        matches!(self, Demand::Unlimited)
    }

    /// Add two demands; saturates at [`Demand::Unlimited`]
    pub fn saturating_add(self, other: Demand) -> Demand {
        match (self, other) {
            (Demand::Max(a), Demand::Max(b)) => a.checked_add(b).map_or(Demand::Unlimited, Demand::Max),
            _ => Demand::Unlimited,
        }
    }

    /// Consume one unit of demand; false when none is left
    pub fn take_one(&mut self) -> bool {
        match self {
            Demand::Unlimited => true,
            Demand::Max(0) => false,
            Demand::Max(n) => {
                *n -= 1;
                true
            }
        }
    }
}

impl Default for Demand {
    fn default() -> Self {
        Self::NONE
    }
}

impl From<usize> for Demand {
    fn from(n: usize) -> Self {
        Demand::Max(n)
    }
}

impl std::ops::Add for Demand {
    type Output = Demand;

    fn add(self, rhs: Demand) -> Demand {
        self.saturating_add(rhs)
    }
}

impl std::ops::AddAssign for Demand {
    fn add_assign(&mut self, rhs: Demand) {
        *self = self.saturating_add(rhs);
    }
}

impl std::fmt::Display for Demand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Demand::Max(n) => write!(f, "max({n})"),
            Demand::Unlimited => f.write_str("unlimited"),
        }
    }
}

/// Terminal signal of a subscription
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion<F = Never> {
    /// All values were delivered
    Finished,
    /// The publisher failed
    Failed(F),
}

impl<F> Completion<F> {
    /// Whether this is a normal finish
    pub fn is_finished(&self) -> bool {
        matches!(self, Completion::Finished)
    }
}
