use crate::error::ProviderError;
use crate::store::TimeSeriesStore;
use crate::types::{SeriesMap, TimeRange};

/// What a fetch step has to materialize for one evaluation cycle.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Glob patterns selecting entities (e.g. `"db-*"`). Empty selects all.
    pub entities: Vec<String>,
    /// Fully prefixed statistic keys.
    pub statistics: Vec<String>,
    pub range: TimeRange,
}

impl FetchRequest {
    pub fn wants_entity(&self, entity: &str) -> bool {
        self.entities.is_empty() || self.entities.iter().any(|p| entity_matches(p, entity))
    }

    pub fn wants_statistic(&self, statistic: &str) -> bool {
        self.statistics.iter().any(|s| s == statistic)
    }
}

/// A source of raw time-series samples.
///
/// Implementations only materialize data; they never decide whether a
/// condition triggers. Scheduling and retry of the fetch belong to the
/// implementation, not to the engine.
pub trait SampleProvider: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    /// Fixed spacing between consecutive samples of one series.
    fn sampling_interval_secs(&self) -> u64;

    /// Unit that burst rates are normalized to.
    fn duration_secs(&self) -> u64;

    /// Returns `entity -> statistic -> {timestamp: value}` for the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying source cannot be read or decoded.
    fn fetch(&self, request: &FetchRequest) -> Result<SeriesMap, ProviderError>;
}

/// Runs `provider` for `request` and loads the result into a fresh store.
pub fn fetch_store(
    provider: &dyn SampleProvider,
    request: &FetchRequest,
) -> Result<TimeSeriesStore, ProviderError> {
    let data = provider.fetch(request)?;
    let store = TimeSeriesStore::with_data(
        provider.sampling_interval_secs(),
        provider.duration_secs(),
        data,
    )?;
    tracing::info!(
        provider = provider.name(),
        statistics = request.statistics.len(),
        samples = store.len(),
        range = %request.range,
        "Fetched time series"
    );
    Ok(store)
}

pub fn entity_matches(pattern: &str, entity: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    glob_match::glob_match(pattern, entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Series;

    struct StaticProvider(SeriesMap);

    impl SampleProvider for StaticProvider {
        fn name(&self) -> &str {
            "static"
        }

        fn sampling_interval_secs(&self) -> u64 {
            60
        }

        fn duration_secs(&self) -> u64 {
            60
        }

        fn fetch(&self, _request: &FetchRequest) -> Result<SeriesMap, ProviderError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn entity_patterns() {
        assert!(entity_matches("*", "anything"));
        assert!(entity_matches("db-*", "db-01"));
        assert!(!entity_matches("db-*", "web-01"));
        assert!(entity_matches("web-01", "web-01"));
    }

    #[test]
    fn empty_entity_list_selects_all() {
        let request = FetchRequest {
            entities: Vec::new(),
            statistics: vec!["writes".into()],
            range: TimeRange::new(0, 100),
        };
        assert!(request.wants_entity("db-01"));
        assert!(request.wants_statistic("writes"));
        assert!(!request.wants_statistic("reads"));
    }

    #[test]
    fn fetch_store_carries_provider_intervals() {
        let mut data = SeriesMap::new();
        data.entry("db-01".into())
            .or_default()
            .insert("writes".into(), Series::from([(0, 1.0), (60, 2.0)]));
        let provider = StaticProvider(data);
        let request = FetchRequest {
            entities: vec!["db-*".into()],
            statistics: vec!["writes".into()],
            range: TimeRange::new(0, 60),
        };

        let store = fetch_store(&provider, &request).unwrap();
        assert_eq!(store.sampling_interval_secs(), 60);
        assert_eq!(store.duration_secs(), 60);
        assert_eq!(store.len(), 2);
    }
}
