//! PHY spike-sorter output.
//!
//! A PHY directory (`<expt>.modat.GUI`) contains, among others:
//!
//! | file                 | content                                  |
//! |----------------------|------------------------------------------|
//! | `spike_times.npy`    | trigger sample of every spike, `[N]` int |
//! | `spike_clusters.npy` | cluster id of every spike, `[N]` int     |
//! | `cluster_info.tsv`   | one row per cluster: `cluster_id`, `ch`, `group`, `n_spikes`, … |
//!
//! Experiment directories follow the MED64 export layout:
//!
//! ```text
//! <dir>/<expt>.modat.bin
//! <dir>/<expt>.modat.GUI/            (default)
//! <dir>/PHY/<expt>.modat.GUI/        (phy_subdir = true; exports go to <dir>/PHY)
//! ```
use anyhow::{bail, Context, Result};
use log::info;
use ndarray::ArrayD;
use ndarray_npy::{read_npy, ReadableElement};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::extract::ClusterChannelMap;

// ── Paths ─────────────────────────────────────────────────────────────────

/// Files of one PHY directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhyPaths {
    pub dir: PathBuf,
    pub spike_times: PathBuf,
    pub spike_clusters: PathBuf,
    pub cluster_info: PathBuf,
}

impl PhyPaths {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref().to_path_buf();
        Self {
            spike_times: dir.join("spike_times.npy"),
            spike_clusters: dir.join("spike_clusters.npy"),
            cluster_info: dir.join("cluster_info.tsv"),
            dir,
        }
    }
}

/// Input and output locations of one MED64 experiment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentLayout {
    /// Experiment id, the directory's base name (e.g. `20190809_11h22m58s`).
    pub expt_id: String,
    pub recording: PathBuf,
    pub phy: PhyPaths,
    pub export_dir: PathBuf,
}

impl ExperimentLayout {
    pub fn new<P: AsRef<Path>>(expt_dir: P, phy_subdir: bool) -> Result<Self> {
        let expt_dir = expt_dir.as_ref();
        let expt_id = expt_dir
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("no experiment id in {}", expt_dir.display()))?
            .to_string();
        let gui_dir = format!("{expt_id}.modat.GUI");
        let export_dir = if phy_subdir { expt_dir.join("PHY") } else { expt_dir.to_path_buf() };
        Ok(Self {
            recording: expt_dir.join(format!("{expt_id}.modat.bin")),
            phy: PhyPaths::new(export_dir.join(gui_dir)),
            export_dir,
            expt_id,
        })
    }

    /// `<expt>_waves.tsv`: mean waveform per cluster.
    pub fn waves_tsv(&self) -> PathBuf {
        self.export_dir.join(format!("{}_waves.tsv", self.expt_id))
    }

    /// `<expt>_waves_raw.json`: every waveform and trigger time.
    pub fn waves_json(&self) -> PathBuf {
        self.export_dir.join(format!("{}_waves_raw.json", self.expt_id))
    }

    /// `<expt>_waves.safetensors`: every waveform as tensors.
    pub fn waves_safetensors(&self) -> PathBuf {
        self.export_dir.join(format!("{}_waves.safetensors", self.expt_id))
    }

    pub fn unit_electrode_tsv(&self) -> PathBuf {
        self.export_dir.join("unit_electrode.tsv")
    }

    pub fn units_ts_tsv(&self) -> PathBuf {
        self.export_dir.join("units_ts.tsv")
    }
}

// ── .npy arrays ───────────────────────────────────────────────────────────

fn try_read<T: ReadableElement + Copy>(path: &Path) -> Option<Vec<T>> {
    read_npy::<_, ArrayD<T>>(path).ok().map(|a| a.iter().copied().collect())
}

/// Read a 1-D (or `[N, 1]`) integer `.npy` array of any common dtype.
pub fn read_int_npy(path: &Path) -> Result<Vec<i64>> {
    if !path.is_file() {
        bail!("missing PHY array {}", path.display());
    }
    if let Some(v) = try_read::<i64>(path) {
        return Ok(v);
    }
    if let Some(v) = try_read::<u64>(path) {
        return v
            .into_iter()
            .map(|x| i64::try_from(x).context("value exceeds i64"))
            .collect::<Result<_>>()
            .with_context(|| format!("reading {}", path.display()));
    }
    if let Some(v) = try_read::<i32>(path) {
        return Ok(v.into_iter().map(i64::from).collect());
    }
    if let Some(v) = try_read::<u32>(path) {
        return Ok(v.into_iter().map(i64::from).collect());
    }
    bail!("{} is not an integer .npy array", path.display())
}

/// Trigger sample of every spike.
pub fn load_spike_times(path: &Path) -> Result<Vec<u64>> {
    read_int_npy(path)?
        .into_iter()
        .map(|s| u64::try_from(s).with_context(|| format!("negative spike sample {s}")))
        .collect::<Result<_>>()
        .with_context(|| format!("reading {}", path.display()))
}

/// Cluster id of every spike.
pub fn load_spike_clusters(path: &Path) -> Result<Vec<u32>> {
    read_int_npy(path)?
        .into_iter()
        .map(|c| u32::try_from(c).with_context(|| format!("invalid cluster id {c}")))
        .collect::<Result<_>>()
        .with_context(|| format!("reading {}", path.display()))
}

/// Parallel spike arrays of a PHY directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhySpikes {
    pub samples: Vec<u64>,
    pub clusters: Vec<u32>,
}

impl PhySpikes {
    pub fn load(paths: &PhyPaths) -> Result<Self> {
        let samples = load_spike_times(&paths.spike_times)?;
        let clusters = load_spike_clusters(&paths.spike_clusters)?;
        if samples.len() != clusters.len() {
            bail!(
                "{}: {} spike times but {} cluster ids",
                paths.dir.display(),
                samples.len(),
                clusters.len()
            );
        }
        info!("{}: {} spikes", paths.dir.display(), samples.len());
        Ok(Self { samples, clusters })
    }
}

// ── cluster_info.tsv ──────────────────────────────────────────────────────

/// The `cluster_info.tsv` columns used here; other columns are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClusterInfo {
    #[serde(alias = "id")]
    pub cluster_id: u32,
    pub ch: usize,
    /// Curated quality label (`good`, `mua`, `noise`); empty when unlabelled.
    pub group: Option<String>,
    pub n_spikes: usize,
}

pub fn parse_cluster_info<R: std::io::Read>(reader: R) -> Result<Vec<ClusterInfo>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .trim(csv::Trim::All)
        .from_reader(reader);
    rdr.deserialize::<ClusterInfo>()
        .enumerate()
        .map(|(i, row)| row.with_context(|| format!("cluster_info row {}", i + 1)))
        .collect()
}

pub fn read_cluster_info(path: &Path) -> Result<Vec<ClusterInfo>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("open {}", path.display()))?;
    parse_cluster_info(file).with_context(|| format!("parsing {}", path.display()))
}

/// Clusters labelled `good_label` with at least `min_spikes` spikes, in file order.
pub fn good_clusters(info: &[ClusterInfo], good_label: &str, min_spikes: usize) -> Result<ClusterChannelMap> {
    let pairs = info
        .iter()
        .filter(|c| c.group.as_deref() == Some(good_label) && c.n_spikes >= min_spikes)
        .map(|c| (c.cluster_id, c.ch))
        .collect();
    ClusterChannelMap::new(pairs)
}
