use advisor_common::error::DataError;
use advisor_common::types::{Entity, Series, SeriesMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Reduction applied to a statistic's samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationOp {
    Avg,
    Max,
    Min,
    /// Value at the newest timestamp.
    Latest,
    /// Value at the oldest timestamp.
    Oldest,
}

impl FromStr for AggregationOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avg" => Ok(Self::Avg),
            "max" => Ok(Self::Max),
            "min" => Ok(Self::Min),
            "latest" => Ok(Self::Latest),
            "oldest" => Ok(Self::Oldest),
            _ => Err(format!("unknown aggregation operator: {s}")),
        }
    }
}

impl std::fmt::Display for AggregationOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Avg => write!(f, "avg"),
            Self::Max => write!(f, "max"),
            Self::Min => write!(f, "min"),
            Self::Latest => write!(f, "latest"),
            Self::Oldest => write!(f, "oldest"),
        }
    }
}

impl AggregationOp {
    /// Reduces one series. Returns `None` for an empty series.
    pub fn apply(self, series: &Series) -> Option<f64> {
        match self {
            // keys are ordered, so the ends of the map are the extreme timestamps
            Self::Latest => series.values().next_back().copied(),
            Self::Oldest => series.values().next().copied(),
            Self::Max => series.values().copied().reduce(f64::max),
            Self::Min => series.values().copied().reduce(f64::min),
            Self::Avg => {
                if series.is_empty() {
                    None
                } else {
                    Some(series.values().sum::<f64>() / series.len() as f64)
                }
            }
        }
    }
}

/// `entity -> statistic -> aggregated value`
pub type AggregatedValues = BTreeMap<Entity, BTreeMap<String, f64>>;

/// Reduces every requested statistic of every entity to one scalar.
///
/// Statistics an entity does not carry are skipped; entities carrying none
/// of them are absent from the result.
///
/// # Errors
///
/// Returns [`DataError::EmptySeries`] if a requested series holds no samples.
pub fn aggregate(
    data: &SeriesMap,
    statistics: &[String],
    op: AggregationOp,
) -> Result<AggregatedValues, DataError> {
    let mut result = AggregatedValues::new();
    for (entity, stats) in data {
        for statistic in statistics {
            let Some(series) = stats.get(statistic) else {
                continue;
            };
            let value = op.apply(series).ok_or_else(|| DataError::EmptySeries {
                entity: entity.clone(),
                statistic: statistic.clone(),
            })?;
            result
                .entry(entity.clone())
                .or_default()
                .insert(statistic.clone(), value);
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> SeriesMap {
        let mut data = SeriesMap::new();
        let stats = data.entry("db-01".to_string()).or_default();
        // inserted out of timestamp order on purpose
        let mut series = Series::new();
        series.insert(300, 30.0);
        series.insert(100, 10.0);
        series.insert(200, 20.0);
        stats.insert("writes".to_string(), series);
        stats.insert("reads".to_string(), Series::from([(100, 5.0), (50, 7.0)]));
        data
    }

    fn single(op: AggregationOp) -> f64 {
        let result = aggregate(&data(), &["writes".to_string()], op).unwrap();
        result["db-01"]["writes"]
    }

    #[test]
    fn reductions() {
        assert_eq!(single(AggregationOp::Avg), 20.0);
        assert_eq!(single(AggregationOp::Max), 30.0);
        assert_eq!(single(AggregationOp::Min), 10.0);
        assert_eq!(single(AggregationOp::Latest), 30.0);
        assert_eq!(single(AggregationOp::Oldest), 10.0);
    }

    #[test]
    fn latest_and_oldest_follow_timestamps() {
        let stats = ["reads".to_string()];
        let latest = aggregate(&data(), &stats, AggregationOp::Latest).unwrap();
        let oldest = aggregate(&data(), &stats, AggregationOp::Oldest).unwrap();
        assert_eq!(latest["db-01"]["reads"], 5.0);
        assert_eq!(oldest["db-01"]["reads"], 7.0);
    }

    #[test]
    fn missing_statistic_is_skipped() {
        let stats = ["writes".to_string(), "absent".to_string()];
        let result = aggregate(&data(), &stats, AggregationOp::Max).unwrap();
        assert_eq!(result["db-01"].len(), 1);

        let none = aggregate(&data(), &["absent".to_string()], AggregationOp::Max).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn empty_series_is_a_data_error() {
        let mut data = data();
        data.get_mut("db-01")
            .unwrap()
            .insert("empty".to_string(), Series::new());
        let err = aggregate(&data, &["empty".to_string()], AggregationOp::Avg).unwrap_err();
        assert!(matches!(err, DataError::EmptySeries { .. }));
    }

    #[test]
    fn parse_and_display() {
        for op in ["avg", "max", "min", "latest", "oldest"] {
            let parsed: AggregationOp = op.parse().unwrap();
            assert_eq!(parsed.to_string(), op);
        }
        assert!("median".parse::<AggregationOp>().is_err());
    }
}
