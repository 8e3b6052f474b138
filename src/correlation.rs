//! Fixed-lag auto- and cross-correlograms of spike trains.
//!
//! # Algorithm
//! 1. Discretise each train into a count array at `bins_per_sec`
//!    (`idx = ⌊t · bins_per_sec⌋`, collisions accumulate).
//! 2. Trim `lag_bins` from both ends of the second array:
//!    `v = b[L .. N-L]`.
//! 3. "Valid" correlation of `a` against `v`, giving `2L + 1` values:
//!    ```text
//!    c[k] = Σ_n a[n + k] · v[n],   k = 0 … 2L   (k = L is zero lag)
//!    ```
//! 4. Normalise by `Σ a + 1`.  The `+ 1` keeps silent units finite.
//!
//! Both arrays have length `⌊t_max · bins_per_sec⌋ + 1`, where `t_max` is
//! the largest timestamp of either train (or the configured duration, if
//! larger).
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::binning::max_timestamp;
use crate::config::CorrelationConfig;

/// Correlation values with their lag axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correlogram {
    /// `-L … +L` bins expressed in milliseconds.
    pub lags_ms: Vec<f64>,
    pub values: Vec<f64>,
}

impl Correlogram {
    /// Value at zero lag.
    pub fn zero_lag(&self) -> f64 {
        self.values[self.values.len() / 2]
    }

    /// Value at `lag` bins (negative = reference leads), if within range.
    pub fn at_lag(&self, lag: i64) -> Option<f64> {
        let idx = lag + (self.values.len() / 2) as i64;
        usize::try_from(idx).ok().and_then(|i| self.values.get(i).copied())
    }
}

/// `-L … +L` lag bins in milliseconds.
///
/// ```
/// use measpike::correlation::lag_axis_ms;
/// assert_eq!(lag_axis_ms(2, 1000.0), vec![-2.0, -1.0, 0.0, 1.0, 2.0]);
/// ```
pub fn lag_axis_ms(lag_bins: usize, bins_per_sec: f64) -> Vec<f64> {
    let l = lag_bins as i64;
    let step = 1000.0 / bins_per_sec;
    (-l..=l).map(|k| k as f64 * step).collect()
}

/// Number of bins needed to hold a timestamp `t_max`.
#[inline]
pub fn bins_for(t_max: f64, bins_per_sec: f64) -> usize {
    (t_max * bins_per_sec) as usize + 1
}

/// Count spikes per bin in an array of `n_bins`.
pub fn discretize(timestamps: &[f64], bins_per_sec: f64, n_bins: usize) -> Result<Vec<f64>> {
    let mut counts = vec![0.0; n_bins];
    for &t in timestamps {
        if !(t >= 0.0) {
            bail!("timestamp {t} is negative or NaN");
        }
        let idx = (t * bins_per_sec) as usize;
        let slot = counts
            .get_mut(idx)
            .with_context(|| format!("timestamp {t} falls outside {n_bins} bins"))?;
        *slot += 1.0;
    }
    Ok(counts)
}

/// Valid-mode correlation of `a` against `b[lag .. len - lag]`.
///
/// `a` and `b` must have equal length greater than `2 · lag`.
pub fn lagged_correlation(a: &[f64], b: &[f64], lag: usize) -> Result<Vec<f64>> {
    if a.len() != b.len() {
        bail!("correlation arrays differ in length: {} vs {}", a.len(), b.len());
    }
    if a.len() <= 2 * lag {
        bail!("{} bins is too short for ±{lag} lag bins", a.len());
    }
    let v = &b[lag..b.len() - lag];
    let mut out = vec![0.0; 2 * lag + 1];
    // Spike trains are sparse; only non-zero bins of `v` contribute.
    for (n, &vn) in v.iter().enumerate().filter(|(_, &x)| x != 0.0) {
        for (k, o) in out.iter_mut().enumerate() {
            *o += a[n + k] * vn;
        }
    }
    Ok(out)
}

fn correlate(a: &[f64], b: &[f64], cfg: &CorrelationConfig) -> Result<Correlogram> {
    cfg.validate()?;
    let t_max = max_timestamp(a)?.max(max_timestamp(b)?);
    let t_max = cfg.duration.map_or(t_max, |d| t_max.max(d));
    let n_bins = bins_for(t_max, cfg.bins_per_sec);

    let arr_a = discretize(a, cfg.bins_per_sec, n_bins)?;
    let arr_b = discretize(b, cfg.bins_per_sec, n_bins)?;
    let norm = arr_a.iter().sum::<f64>() + 1.0;
    let values = lagged_correlation(&arr_a, &arr_b, cfg.lag_bins)?
        .into_iter()
        .map(|v| v / norm)
        .collect();
    Ok(Correlogram { lags_ms: lag_axis_ms(cfg.lag_bins, cfg.bins_per_sec), values })
}

/// Auto-correlogram of one spike train.
///
/// An empty train is rejected.
pub fn autocorr(timestamps: &[f64], cfg: &CorrelationConfig) -> Result<Correlogram> {
    correlate(timestamps, timestamps, cfg).context("auto-correlation")
}

/// Cross-correlogram of `a` (reference) against `b`.
pub fn crosscorr(a: &[f64], b: &[f64], cfg: &CorrelationConfig) -> Result<Correlogram> {
    correlate(a, b, cfg).context("cross-correlation")
}

/// Cross-correlogram of `reference` against every unit (itself included).
pub fn crosscorr_matrix(
    reference: u32,
    units: &BTreeMap<u32, Vec<f64>>,
    cfg: &CorrelationConfig,
) -> Result<BTreeMap<u32, Correlogram>> {
    let ref_ts = units
        .get(&reference)
        .with_context(|| format!("reference unit {reference} not found"))?;
    units
        .iter()
        .map(|(&u, ts)| {
            crosscorr(ref_ts, ts, cfg)
                .with_context(|| format!("unit {reference} × unit {u}"))
                .map(|c| (u, c))
        })
        .collect()
}
