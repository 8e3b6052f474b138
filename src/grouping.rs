//! Group spike trigger samples by their sorter-assigned cluster.
//!
//! PHY writes two parallel arrays, `spike_times.npy` (trigger sample of
//! every detection) and `spike_clusters.npy` (cluster of every detection).
//! Cluster assignments must come from `spike_clusters`, since the template
//! ids are not updated when clusters are split or merged.
use anyhow::{bail, Result};
use std::collections::{BTreeMap, HashSet};

/// Cluster id → trigger samples, in the order they appeared in the input.
///
/// Clusters iterate in ascending id order; spikes within a cluster are
/// never re-sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterSpikeGroup {
    spikes: BTreeMap<u32, Vec<u64>>,
}

impl ClusterSpikeGroup {
    pub fn get(&self, cluster: u32) -> Option<&[u64]> {
        self.spikes.get(&cluster).map(Vec::as_slice)
    }

    pub fn contains(&self, cluster: u32) -> bool {
        self.spikes.contains_key(&cluster)
    }

    pub fn n_clusters(&self) -> usize {
        self.spikes.len()
    }

    /// Total spikes over all clusters.
    pub fn n_spikes(&self) -> usize {
        self.spikes.values().map(Vec::len).sum()
    }

    pub fn cluster_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.spikes.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &[u64])> {
        self.spikes.iter().map(|(&c, v)| (c, v.as_slice()))
    }

    /// Drop every cluster not listed in `keep`.
    pub fn retain_clusters(&mut self, keep: &[u32]) {
        let keep: HashSet<u32> = keep.iter().copied().collect();
        self.spikes.retain(|c, _| keep.contains(c));
    }

    /// Trigger times per cluster converted from samples to seconds.
    pub fn to_seconds(&self, sfreq: f64) -> BTreeMap<u32, Vec<f64>> {
        self.spikes
            .iter()
            .map(|(&c, samples)| (c, samples.iter().map(|&s| s as f64 / sfreq).collect()))
            .collect()
    }
}

/// Group `samples[i]` under `clusters[i]`.
///
/// ```
/// use measpike::grouping::group_spikes;
///
/// let g = group_spikes(&[30, 10, 20, 40], &[2, 1, 2, 1]).unwrap();
/// assert_eq!(g.get(1).unwrap(), &[10, 40]);
/// assert_eq!(g.get(2).unwrap(), &[30, 20]); // input order, not time order
/// ```
pub fn group_spikes(samples: &[u64], clusters: &[u32]) -> Result<ClusterSpikeGroup> {
    if samples.len() != clusters.len() {
        bail!(
            "spike/cluster length mismatch: {} spike samples vs {} cluster ids",
            samples.len(),
            clusters.len()
        );
    }
    let mut spikes: BTreeMap<u32, Vec<u64>> = BTreeMap::new();
    for (&s, &c) in samples.iter().zip(clusters) {
        spikes.entry(c).or_default().push(s);
    }
    Ok(ClusterSpikeGroup { spikes })
}

/// Flatten spikes of the clusters in `keep` into `(seconds, cluster)` rows,
/// preserving the original detection order.
///
/// This is the row layout of `units_ts.tsv`.
pub fn flatten_seconds(
    samples: &[u64],
    clusters: &[u32],
    keep: &[u32],
    sfreq: f64,
) -> Result<Vec<(f64, u32)>> {
    if samples.len() != clusters.len() {
        bail!(
            "spike/cluster length mismatch: {} spike samples vs {} cluster ids",
            samples.len(),
            clusters.len()
        );
    }
    let keep: HashSet<u32> = keep.iter().copied().collect();
    Ok(samples
        .iter()
        .zip(clusters)
        .filter(|(_, c)| keep.contains(c))
        .map(|(&s, &c)| (s as f64 / sfreq, c))
        .collect())
}
