use crate::error::{DataError, Result};
use crate::types::{Epoch, Series, SeriesMap};

/// Raw samples for one evaluation cycle.
///
/// The store is filled once by a fetch step and then only read. Besides the
/// samples it carries the two constants of the source that produced them:
/// the fixed sampling interval and the reporting duration used to
/// normalize rates (e.g. `60` for per-minute rates).
#[derive(Debug, Clone)]
pub struct TimeSeriesStore {
    sampling_interval_secs: u64,
    duration_secs: u64,
    data: SeriesMap,
}

impl TimeSeriesStore {
    pub fn new(sampling_interval_secs: u64, duration_secs: u64) -> Result<Self> {
        if sampling_interval_secs == 0 {
            return Err(DataError::ZeroInterval {
                name: "sampling interval",
            });
        }
        if duration_secs == 0 {
            return Err(DataError::ZeroInterval {
                name: "reporting duration",
            });
        }
        Ok(Self {
            sampling_interval_secs,
            duration_secs,
            data: SeriesMap::new(),
        })
    }

    /// Builds a store from an already materialized map.
    ///
    /// Empty series are dropped so that every stored series holds at least
    /// one sample.
    pub fn with_data(sampling_interval_secs: u64, duration_secs: u64, data: SeriesMap) -> Result<Self> {
        let mut store = Self::new(sampling_interval_secs, duration_secs)?;
        store.extend(data);
        Ok(store)
    }

    pub fn sampling_interval_secs(&self) -> u64 {
        self.sampling_interval_secs
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    /// Records one sample. A second sample at the same timestamp replaces
    /// the first.
    pub fn insert(&mut self, entity: &str, statistic: &str, ts: Epoch, value: f64) {
        self.data
            .entry(entity.to_string())
            .or_default()
            .entry(statistic.to_string())
            .or_default()
            .insert(ts, value);
    }

    pub fn extend(&mut self, data: SeriesMap) {
        for (entity, stats) in data {
            for (statistic, series) in stats {
                if series.is_empty() {
                    continue;
                }
                self.data
                    .entry(entity.clone())
                    .or_default()
                    .entry(statistic)
                    .or_default()
                    .extend(series);
            }
        }
    }

    pub fn series(&self, entity: &str, statistic: &str) -> Option<&Series> {
        self.data.get(entity).and_then(|stats| stats.get(statistic))
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn data(&self) -> &SeriesMap {
        &self.data
    }

    /// Total number of samples across all series.
    pub fn len(&self) -> usize {
        self.data
            .values()
            .flat_map(|stats| stats.values())
            .map(|series| series.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
