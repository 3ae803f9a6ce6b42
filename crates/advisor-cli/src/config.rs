use advisor_common::types::{Epoch, TimeRange};
use advisor_rules::options::OptionMap;
use serde::{Deserialize, Serialize};

/// Default look-back when no start time is configured.
pub const DEFAULT_LOOKBACK_SECS: i64 = 3 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    /// TOML rules file with `[[rules]]`, `[[conditions]]` and `[[suggestions]]`.
    pub rules_path: String,
    /// JSON samples file, `entity -> statistic -> {epoch: value}`.
    pub samples_path: String,
    /// Replaces the `[]` placeholder of condition keys.
    #[serde(default)]
    pub key_prefix: Option<String>,
    /// Glob patterns selecting entities; `*` selects all.
    #[serde(default = "default_entities")]
    pub entities: Vec<String>,
    #[serde(default = "default_sampling_interval_secs")]
    pub sampling_interval_secs: u64,
    /// Burst rates are normalized to this many seconds.
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
    #[serde(default)]
    pub start_time: Option<Epoch>,
    #[serde(default)]
    pub end_time: Option<Epoch>,
    /// Where to write the JSON report, if anywhere.
    #[serde(default)]
    pub report_path: Option<String>,
    /// Parsed option values (`[options.<section>]`) for OPTIONS conditions.
    #[serde(default)]
    pub options: OptionMap,
}

fn default_entities() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_sampling_interval_secs() -> u64 {
    60
}

fn default_duration_secs() -> u64 {
    60
}

impl AdvisorConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path, e))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sampling_interval_secs == 0 {
            anyhow::bail!("sampling_interval_secs must be greater than zero");
        }
        if self.duration_secs == 0 {
            anyhow::bail!("duration_secs must be greater than zero");
        }
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if start > end {
                anyhow::bail!("start_time {start} is after end_time {end}");
            }
        }
        Ok(())
    }

    /// The fetch range: the configured bounds, defaulting to the three hours
    /// ending at `now`.
    pub fn time_range(&self, now: Epoch) -> TimeRange {
        let end = self.end_time.unwrap_or(now);
        match self.start_time {
            Some(start) => TimeRange::new(start, end),
            None => TimeRange::ending_at(end, DEFAULT_LOOKBACK_SECS),
        }
    }
}
