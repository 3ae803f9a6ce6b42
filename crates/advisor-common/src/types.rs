use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque identifier of a monitored unit (host, shard, column family).
pub type Entity = String;

/// Integer timestamp in seconds since the Unix epoch.
pub type Epoch = i64;

/// Samples of one statistic for one entity, keyed by timestamp.
pub type Series = BTreeMap<Epoch, f64>;

/// Raw samples as produced by a [`crate::provider::SampleProvider`]:
/// `entity -> statistic -> {timestamp: value}`.
pub type SeriesMap = BTreeMap<Entity, BTreeMap<String, Series>>;

/// Inclusive time range of a fetch, in epoch seconds.
///
/// # Examples
///
/// ```
/// use advisor_common::types::TimeRange;
///
/// let range = TimeRange::new(100, 200);
/// assert!(range.contains(100));
/// assert!(range.contains(200));
/// assert!(!range.contains(201));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Epoch,
    pub end: Epoch,
}

impl TimeRange {
    pub fn new(start: Epoch, end: Epoch) -> Self {
        Self { start, end }
    }

    /// The `secs` seconds ending at `end`.
    pub fn ending_at(end: Epoch, secs: i64) -> Self {
        Self {
            start: end - secs,
            end,
        }
    }

    pub fn contains(&self, ts: Epoch) -> bool {
        ts >= self.start && ts <= self.end
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}
