//! Per-cluster waveform extraction.
//!
//! For every `(cluster, channel)` pair in the [`ClusterChannelMap`]:
//!
//! ```text
//! waves[cluster]    : [n_spikes, width]  f32   NaN rows = failed spikes
//! triggers[cluster] : [n_spikes]         u64   trigger sample of each row
//! valid[cluster]    : [n_spikes]         bool
//! ```
//!
//! Row `i` always corresponds to the `i`-th spike of the cluster in input
//! order.  A spike whose window runs past the recording (or whose channel
//! does not exist) keeps its row, NaN-filled and flagged invalid, and is
//! listed in the [`ExtractionReport`].
use anyhow::{bail, Result};
use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use std::collections::{BTreeSet, HashSet};

use crate::error::{SpikeError, SpikeFailure};
use crate::grouping::ClusterSpikeGroup;
use crate::recording::ChannelMatrix;
use crate::window::{compute_window, trigger_offset, Window};

// ── Cluster → channel map ─────────────────────────────────────────────────

/// Ordered `(cluster, channel)` assignment of the clusters to extract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterChannelMap {
    pairs: Vec<(u32, usize)>,
}

impl ClusterChannelMap {
    /// Build from pairs; a cluster listed twice is rejected.
    pub fn new(pairs: Vec<(u32, usize)>) -> Result<Self> {
        let mut seen = HashSet::new();
        for &(c, _) in &pairs {
            if !seen.insert(c) {
                bail!("cluster {c} assigned to more than one channel");
            }
        }
        Ok(Self { pairs })
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        self.pairs.iter().copied()
    }

    pub fn cluster_ids(&self) -> Vec<u32> {
        self.pairs.iter().map(|&(c, _)| c).collect()
    }

    pub fn channel_of(&self, cluster: u32) -> Option<usize> {
        self.pairs.iter().find(|&&(c, _)| c == cluster).map(|&(_, ch)| ch)
    }
}

// ── Output records ────────────────────────────────────────────────────────

/// All waveforms of one cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformRecord {
    pub cluster: u32,
    pub channel: usize,
    /// `[n_spikes, width]`; invalid rows are NaN.
    pub waves: Array2<f32>,
    /// Trigger sample of each row.
    pub triggers: Array1<u64>,
    /// `false` for rows whose extraction failed.
    pub valid: Vec<bool>,
}

impl WaveformRecord {
    #[inline]
    pub fn n_spikes(&self) -> usize {
        self.waves.nrows()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.waves.ncols()
    }

    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }

    /// Trigger times in seconds, same row order as `waves`.
    pub fn trigger_seconds(&self, sfreq: f64) -> Array1<f64> {
        self.triggers.mapv(|t| t as f64 / sfreq)
    }

    /// Mean over valid rows, or `None` when no row is valid.
    pub fn mean_waveform(&self) -> Option<Array1<f32>> {
        let n_valid = self.valid_count();
        if n_valid == 0 {
            return None;
        }
        let mut acc = Array1::<f64>::zeros(self.width());
        for (row, _) in self.waves.axis_iter(Axis(0)).zip(&self.valid).filter(|(_, &v)| v) {
            acc.zip_mut_with(&row, |a, &x| *a += x as f64);
        }
        Some(acc.mapv(|v| (v / n_valid as f64) as f32))
    }
}

/// Batch summary of per-spike failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    pub failures: Vec<SpikeFailure>,
}

impl ExtractionReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn n_skipped(&self) -> usize {
        self.failures.len()
    }

    /// Clusters with at least one failed row, ascending.
    pub fn affected_clusters(&self) -> Vec<u32> {
        self.failures
            .iter()
            .map(|f| f.cluster)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn summary(&self) -> String {
        if self.is_clean() {
            return "all spikes extracted".to_string();
        }
        format!(
            "{} spike(s) could not be extracted in {} cluster(s): {:?}",
            self.n_skipped(),
            self.affected_clusters().len(),
            self.affected_clusters()
        )
    }
}

/// Waveform records plus the failure report of one extraction run.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub records: Vec<WaveformRecord>,
    pub report: ExtractionReport,
}

impl Extraction {
    pub fn record(&self, cluster: u32) -> Option<&WaveformRecord> {
        self.records.iter().find(|r| r.cluster == cluster)
    }
}

// ── Extraction ────────────────────────────────────────────────────────────

/// Cut `width` samples for one spike.
pub fn cut_snippet<'a>(
    matrix: &'a ChannelMatrix,
    channel: usize,
    window: &Window,
    width: usize,
) -> Result<ArrayView1<'a, i16>, SpikeError> {
    let row = matrix.channel(channel).ok_or(SpikeError::BadChannel {
        channel,
        n_chan: matrix.n_chan(),
    })?;
    let range = window.samples(width);
    if range.end > row.len() {
        return Err(SpikeError::OutOfRange {
            start: range.start,
            stop: range.end,
            n_samples: row.len(),
        });
    }
    Ok(row.slice_move(ndarray::s![range]))
}

/// Extract every spike of every mapped cluster.
///
/// # Errors
///
/// Fails before doing any work if `width` is zero, if `pre_samples` does
/// not fit inside `width`, or if a cluster in `map` has no entry in
/// `groups` (the sorter files disagree with each other).
/// Per-spike problems do not fail the call; see [`ExtractionReport`].
pub fn extract_waveforms(
    matrix: &ChannelMatrix,
    groups: &ClusterSpikeGroup,
    map: &ClusterChannelMap,
    width: usize,
    pre_samples: Option<usize>,
) -> Result<Extraction> {
    if width == 0 {
        bail!("waveform width must be at least 1 sample");
    }
    if let Some(pre) = pre_samples {
        if pre >= width {
            bail!("pre_samples ({pre}) must be smaller than width ({width})");
        }
    }
    let missing: Vec<u32> = map.iter().map(|(c, _)| c).filter(|&c| !groups.contains(c)).collect();
    if !missing.is_empty() {
        bail!("clusters {missing:?} are in the channel map but have no spikes");
    }

    let mut records = Vec::with_capacity(map.len());
    let mut report = ExtractionReport::default();

    for (cluster, channel) in map.iter() {
        let triggers = groups.get(cluster).unwrap_or_default();
        let n = triggers.len();
        let mut waves = Array2::<f32>::from_elem((n, width), f32::NAN);
        let mut valid = vec![false; n];

        for (row, &trigger) in triggers.iter().enumerate() {
            let window = compute_window(trigger, width, pre_samples);
            match cut_snippet(matrix, channel, &window, width) {
                Ok(snippet) => {
                    waves.row_mut(row).assign(&snippet.mapv(f32::from));
                    valid[row] = true;
                }
                Err(error) => {
                    let failure = SpikeFailure { cluster, channel, row, trigger, window, error };
                    debug!("{failure}");
                    report.failures.push(failure);
                }
            }
        }

        debug!("cluster {cluster} on channel {channel}: {n} spikes");
        records.push(WaveformRecord {
            cluster,
            channel,
            waves,
            triggers: Array1::from(triggers.to_vec()),
            valid,
        });
    }

    info!("extracted {} clusters, {} samples per waveform", records.len(), width);
    if !report.is_clean() {
        warn!("{}", report.summary());
    }
    Ok(Extraction { records, report })
}

/// Time of each waveform sample relative to the trigger, in milliseconds.
///
/// ```
/// use measpike::extract::time_axis_ms;
///
/// let t = time_axis_ms(121, Some(30), 20_000.0);
/// assert_eq!(t.len(), 121);
/// assert!((t[30]).abs() < 1e-12);
/// assert!((t[0] + 1.5).abs() < 1e-12);
/// ```
pub fn time_axis_ms(width: usize, pre_samples: Option<usize>, sfreq: f64) -> Array1<f64> {
    let offset = trigger_offset(width, pre_samples) as f64;
    let ms_per_sample = 1000.0 / sfreq;
    Array1::from_shape_fn(width, |i| (i as f64 - offset) * ms_per_sample)
}
