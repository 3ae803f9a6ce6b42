use advisor_common::types::Epoch;

/// Reports whether any epoch of `epochs_b` lies within `window_secs` of
/// an epoch of `epochs_a`.
///
/// Every epoch of `a` is turned into the interval
/// `[a - window, a + window]`. The intervals are visited in ascending order
/// with a single pointer into the sorted `b` that only moves forward, so the
/// sweep is linear after sorting. Running off the end of `b` ends the search.
///
/// # Examples
///
/// ```
/// use advisor_rules::overlap::overlaps;
///
/// assert!(overlaps(&[100], &[100], 10));
/// assert!(!overlaps(&[100], &[1000], 10));
/// ```
pub fn overlaps(epochs_a: &[Epoch], epochs_b: &[Epoch], window_secs: u64) -> bool {
    if epochs_a.is_empty() || epochs_b.is_empty() {
        return false;
    }
    let window = i64::try_from(window_secs).unwrap_or(i64::MAX);
    let span = window.saturating_mul(2);

    let mut lower_bounds: Vec<Epoch> = epochs_a.iter().map(|e| e.saturating_sub(window)).collect();
    lower_bounds.sort_unstable();
    let mut sorted_b = epochs_b.to_vec();
    sorted_b.sort_unstable();

    let mut ix = 0;
    for lb in lower_bounds {
        while sorted_b[ix] < lb {
            ix += 1;
            if ix >= sorted_b.len() {
                return false;
            }
        }
        if sorted_b[ix] <= lb.saturating_add(span) {
            return true;
        }
    }
    false
}
