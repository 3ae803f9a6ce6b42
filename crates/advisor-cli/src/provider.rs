use advisor_common::error::ProviderError;
use advisor_common::provider::{FetchRequest, SampleProvider};
use advisor_common::types::{Series, SeriesMap};
use std::path::PathBuf;

/// Reads samples from a JSON document shaped like
///
/// ```json
/// { "db-01": { "rocksdb.stall_micros": { "60": 0.0, "120": 12.5 } } }
/// ```
///
/// and keeps only the entities, statistics and timestamps the request asks
/// for.
pub struct JsonFileProvider {
    path: PathBuf,
    sampling_interval_secs: u64,
    duration_secs: u64,
}

impl JsonFileProvider {
    pub fn new(path: impl Into<PathBuf>, sampling_interval_secs: u64, duration_secs: u64) -> Self {
        Self {
            path: path.into(),
            sampling_interval_secs,
            duration_secs,
        }
    }
}

impl SampleProvider for JsonFileProvider {
    fn name(&self) -> &str {
        "json-file"
    }

    fn sampling_interval_secs(&self) -> u64 {
        self.sampling_interval_secs
    }

    fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    fn fetch(&self, request: &FetchRequest) -> Result<SeriesMap, ProviderError> {
        let content = std::fs::read_to_string(&self.path)?;
        let all: SeriesMap =
            serde_json::from_str(&content).map_err(|e| ProviderError::Malformed {
                source_name: self.path.display().to_string(),
                message: e.to_string(),
            })?;

        let mut selected = SeriesMap::new();
        for (entity, stats) in all {
            if !request.wants_entity(&entity) {
                tracing::debug!(entity = %entity, "Entity not selected");
                continue;
            }
            for (statistic, series) in stats {
                if !request.wants_statistic(&statistic) {
                    continue;
                }
                let series: Series = series
                    .into_iter()
                    .filter(|(ts, _)| request.range.contains(*ts))
                    .collect();
                if series.is_empty() {
                    continue;
                }
                selected
                    .entry(entity.clone())
                    .or_default()
                    .insert(statistic, series);
            }
        }
        Ok(selected)
    }
}
