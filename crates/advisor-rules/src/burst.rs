use advisor_common::store::TimeSeriesStore;
use advisor_common::types::{Entity, Epoch};
use std::collections::BTreeMap;

/// `entity -> trigger epoch -> rate`
pub type BurstMap = BTreeMap<Entity, BTreeMap<Epoch, f64>>;

/// Number of samples spanned by a window of `window_secs`.
///
/// Windows shorter than one sampling interval are widened to one sample.
pub fn window_samples(window_secs: u64, sampling_interval_secs: u64) -> usize {
    let interval = sampling_interval_secs.max(1);
    window_secs.max(interval).div_ceil(interval) as usize
}

/// Finds windows in which `statistic` changes at least as fast as
/// `threshold`.
///
/// The window slides one sample at a time over each entity's timestamps.
/// For the pair `(t[i - w], t[i])` the change is normalized to the store's
/// reporting duration:
///
/// ```text
/// rate = (v[i] - v[i-w]) [* 100 / v[i-w]] * duration / (t[i] - t[i-w])
/// ```
///
/// and `t[i] -> rate` is recorded when `rate >= threshold`. In percent mode
/// a window whose base value is zero is skipped.
pub fn detect_bursts(
    store: &TimeSeriesStore,
    statistic: &str,
    window_secs: u64,
    threshold: f64,
    percent: bool,
) -> BurstMap {
    let window = window_samples(window_secs, store.sampling_interval_secs());
    let duration = store.duration_secs() as f64;
    let mut bursts = BurstMap::new();

    for entity in store.entities() {
        let Some(series) = store.series(entity, statistic) else {
            continue;
        };
        // BTreeMap iteration is already in ascending timestamp order
        let samples: Vec<(Epoch, f64)> = series.iter().map(|(ts, v)| (*ts, *v)).collect();

        for ix in window..samples.len() {
            let (first_ts, first_val) = samples[ix - window];
            let (last_ts, last_val) = samples[ix];

            let mut diff = last_val - first_val;
            if percent {
                if first_val.abs() < f64::EPSILON {
                    tracing::warn!(
                        entity,
                        statistic,
                        first_ts,
                        last_ts,
                        "Skipping window with zero base value"
                    );
                    continue;
                }
                diff = diff * 100.0 / first_val;
            }
            let rate = diff * duration / (last_ts - first_ts) as f64;

            if rate >= threshold {
                bursts
                    .entry(entity.to_string())
                    .or_default()
                    .insert(last_ts, rate);
            }
        }
    }

    bursts
}
