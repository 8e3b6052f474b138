//! Histogram bins and firing rates.
//!
//! All timestamps are in seconds.  Firing-rate windows are half-open,
//! `[begin, end)`, the same convention used by the treatment lookup.
use anyhow::{bail, Result};
use std::collections::BTreeMap;

use crate::treatment::TreatmentRanges;

/// Above this many timestamps the rug plot is subsampled.
pub const MAX_RUG_POINTS: usize = 150;

/// Bin edges starting at zero that cover the largest timestamp.
///
/// `n_bins = ⌊max / bin_sec⌋ + 1`; the result has `n_bins + 1` edges.
///
/// ```
/// use measpike::binning::hist_bins;
/// assert_eq!(hist_bins(&[12.0, 250.0], 100.0).unwrap(), vec![0.0, 100.0, 200.0, 300.0]);
/// ```
pub fn hist_bins(timestamps: &[f64], bin_sec: f64) -> Result<Vec<f64>> {
    if !(bin_sec > 0.0) {
        bail!("bin width must be positive, got {bin_sec}");
    }
    let max = max_timestamp(timestamps)?;
    let n_bins = (max / bin_sec).floor() as usize + 1;
    Ok((0..=n_bins).map(|i| i as f64 * bin_sec).collect())
}

/// Count timestamps per bin.
///
/// Bins are `[e_i, e_{i+1})` except the last, which also includes its right
/// edge.  Values outside `[e_0, e_n]` are not counted.
pub fn histogram(timestamps: &[f64], edges: &[f64]) -> Vec<usize> {
    if edges.len() < 2 {
        return vec![];
    }
    let n_bins = edges.len() - 1;
    let (first, last) = (edges[0], edges[n_bins]);
    let mut counts = vec![0usize; n_bins];
    for &ts in timestamps {
        if ts < first || ts > last {
            continue;
        }
        // index of the last edge <= ts
        let i = edges.partition_point(|&e| e <= ts).saturating_sub(1).min(n_bins - 1);
        counts[i] += 1;
    }
    counts
}

/// Per-bin activity in Hz: `count / bin_sec` over [`hist_bins`] edges.
///
/// Returns `(edges, rates)`.
pub fn rate_histogram(timestamps: &[f64], bin_sec: f64) -> Result<(Vec<f64>, Vec<f64>)> {
    let edges = hist_bins(timestamps, bin_sec)?;
    let rates = histogram(timestamps, &edges)
        .into_iter()
        .map(|c| c as f64 / bin_sec)
        .collect();
    Ok((edges, rates))
}

/// Step size for subsampling `n` rug markers.
///
/// ```
/// use measpike::binning::thinning_factor;
/// assert_eq!(thinning_factor(150), 1);
/// assert_eq!(thinning_factor(151), 1);
/// assert_eq!(thinning_factor(300), 2);
/// ```
pub fn thinning_factor(n: usize) -> usize {
    if n <= MAX_RUG_POINTS {
        1
    } else {
        n / MAX_RUG_POINTS
    }
}

/// Mean firing rate of every unit inside every treatment range.
///
/// Result: treatment label → unit id → Hz.  Every (treatment, unit) pair is
/// present; a unit with no spikes in a range gets `0.0`.
pub fn mean_firing_rate_by_treatment(
    spikes_by_unit: &BTreeMap<u32, Vec<f64>>,
    ranges: &TreatmentRanges,
) -> BTreeMap<String, BTreeMap<u32, f64>> {
    let mut out = BTreeMap::new();
    for range in ranges.iter() {
        let duration = range.duration();
        let per_unit = spikes_by_unit
            .iter()
            .map(|(&unit, ts)| {
                let count = ts.iter().filter(|&&t| range.contains(t)).count();
                (unit, count as f64 / duration)
            })
            .collect();
        out.insert(range.label.clone(), per_unit);
    }
    out
}

/// Overall firing rates between `start` and `end` seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct FiringRates {
    /// Unit id → Hz over the whole span.
    pub per_unit: BTreeMap<u32, f64>,
    /// Mean of the per-unit rates.
    pub population_mean: f64,
}

/// Whole-recording firing rate of every unit.
///
/// Every spike of a unit counts towards its rate; the span only sets the
/// denominator.  Typically `start` is the first treatment onset and `end`
/// the `END` marker.
pub fn mean_firing_rates(
    spikes_by_unit: &BTreeMap<u32, Vec<f64>>,
    start: f64,
    end: f64,
) -> Result<FiringRates> {
    let duration = end - start;
    if !(duration > 0.0) {
        bail!("firing-rate span must be positive, got [{start}, {end}]");
    }
    if spikes_by_unit.is_empty() {
        bail!("no units to compute firing rates for");
    }
    let per_unit: BTreeMap<u32, f64> = spikes_by_unit
        .iter()
        .map(|(&u, ts)| (u, ts.len() as f64 / duration))
        .collect();
    let total: usize = spikes_by_unit.values().map(Vec::len).sum();
    let population_mean = total as f64 / duration / spikes_by_unit.len() as f64;
    Ok(FiringRates { per_unit, population_mean })
}

pub(crate) fn max_timestamp(timestamps: &[f64]) -> Result<f64> {
    if timestamps.is_empty() {
        bail!("timestamp sequence is empty");
    }
    let mut max = f64::NEG_INFINITY;
    for &t in timestamps {
        if !t.is_finite() {
            bail!("timestamp {t} is not finite");
        }
        max = max.max(t);
    }
    Ok(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn bins_exact_multiple_gets_extra_bin() {
        // ⌊200/100⌋ + 1 = 3 bins
        assert_eq!(hist_bins(&[200.0], 100.0).unwrap(), vec![0.0, 100.0, 200.0, 300.0]);
    }

    #[test]
    fn bins_reject_empty_and_bad_width() {
        assert!(hist_bins(&[], 10.0).is_err());
        assert!(hist_bins(&[1.0], 0.0).is_err());
    }

    #[test]
    fn histogram_last_bin_closed() {
        let edges = [0.0, 1.0, 2.0];
        assert_eq!(histogram(&[0.0, 0.5, 1.0, 2.0, 2.5, -1.0], &edges), vec![2, 2]);
    }

    #[test]
    fn rate_histogram_divides_by_bin() {
        let (edges, rates) = rate_histogram(&[1.0, 2.0, 15.0], 10.0).unwrap();
        assert_eq!(edges, vec![0.0, 10.0, 20.0]);
        assert_abs_diff_eq!(rates[0], 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(rates[1], 0.1, epsilon = 1e-12);
    }

    #[test]
    fn thinning_large_counts() {
        assert_eq!(thinning_factor(0), 1);
        assert_eq!(thinning_factor(449), 2);
        assert_eq!(thinning_factor(450), 3);
    }

    #[test]
    fn overall_rates() {
        let mut units = BTreeMap::new();
        units.insert(1, vec![1.0, 2.0, 3.0, 4.0]);
        units.insert(2, vec![5.0, 6.0]);
        let fr = mean_firing_rates(&units, 0.0, 10.0).unwrap();
        assert_abs_diff_eq!(fr.per_unit[&1], 0.4, epsilon = 1e-12);
        assert_abs_diff_eq!(fr.per_unit[&2], 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(fr.population_mean, 0.3, epsilon = 1e-12);
        assert!(mean_firing_rates(&units, 5.0, 5.0).is_err());
    }
}
