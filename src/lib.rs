//! # measpike: MEA spike waveforms and spike-train analytics
//!
//! `measpike` turns a raw MED64 multi-electrode-array recording plus the
//! output of the PHY spike sorter into per-unit waveform records, and
//! computes firing rates, activity histograms and correlograms from the
//! resulting unit timestamps.
//!
//! ## Pipeline overview
//!
//! ```text
//! <expt>.modat.bin                       <expt>.modat.GUI/
//!   │                                      ├─ spike_times.npy
//!   │                                      ├─ spike_clusters.npy
//!   │                                      └─ cluster_info.tsv
//!   │                                           │
//!   ├─ recording::read_recording()             ├─ phy::PhySpikes::load()
//!   │    interleaved i16 → [C, T]              ├─ phy::good_clusters()   group == "good", n ≥ 10
//!   │                                          └─ grouping::group_spikes()
//!   │                                               │
//!   └──────────────┬────────────────────────────────┘
//!                  ├─ window::compute_window()      trigger → (start, end)
//!                  └─ extract::extract_waveforms()  [n_spikes, width] per cluster
//!                        │
//!                        └─→ Extraction { records, report }
//!
//! units_ts.tsv + treatment log
//!   ├─ treatment::TreatmentRanges::resolve()   onsets → [begin, end)
//!   ├─ binning::mean_firing_rate_by_treatment()
//!   ├─ binning::rate_histogram()
//!   └─ correlation::{autocorr, crosscorr}()
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use measpike::{extract_units, ExtractConfig};
//! use measpike::phy::ExperimentLayout;
//!
//! let layout = ExperimentLayout::new("data/20190809_11h22m58s", false).unwrap();
//! let cfg    = ExtractConfig::default();
//! let units  = extract_units(&layout.recording, &layout.phy, &cfg).unwrap();
//!
//! for rec in &units.extraction.records {
//!     println!("cluster {} on ch {}: {:?}", rec.cluster, rec.channel, rec.waves.dim());
//! }
//! ```
//!
//! ## Running individual steps
//!
//! ```
//! use measpike::recording::deinterleave;
//! use measpike::grouping::group_spikes;
//! use measpike::extract::{extract_waveforms, ClusterChannelMap};
//!
//! // 2 channels × 200 samples of zeros
//! let matrix = deinterleave(vec![0i16; 400], 2).unwrap();
//! let groups = group_spikes(&[50, 120], &[7, 7]).unwrap();
//! let map    = ClusterChannelMap::new(vec![(7, 1)]).unwrap();
//!
//! let ex = extract_waveforms(&matrix, &groups, &map, 21, Some(5)).unwrap();
//! assert_eq!(ex.records[0].waves.dim(), (2, 21));
//! assert!(ex.report.is_clean());
//! ```

pub mod binning;
pub mod config;
pub mod correlation;
pub mod error;
pub mod extract;
pub mod grouping;
pub mod io;
pub mod phy;
pub mod recording;
pub mod treatment;
pub mod window;

use anyhow::{Context, Result};
use log::info;
use std::path::Path;

// ── Crate-root re-exports ─────────────────────────────────────────────────
//
// Everything a downstream user is likely to need is available directly as
// `measpike::Foo` without having to know the internal module layout.

// config
pub use config::{CorrelationConfig, ExtractConfig};

// error
pub use error::{SpikeError, SpikeFailure};

// recording
pub use recording::{decode_i16_le, deinterleave, load_recording, read_recording, ChannelMatrix};

// grouping
pub use grouping::{flatten_seconds, group_spikes, ClusterSpikeGroup};

// window
pub use window::{compute_window, trigger_offset, Window};

// extract
pub use extract::{
    cut_snippet, extract_waveforms, time_axis_ms,
    ClusterChannelMap, Extraction, ExtractionReport, WaveformRecord,
};

// binning
pub use binning::{
    hist_bins, histogram, mean_firing_rate_by_treatment, mean_firing_rates,
    rate_histogram, thinning_factor, FiringRates, MAX_RUG_POINTS,
};

// correlation
pub use correlation::{
    autocorr, bins_for, crosscorr, crosscorr_matrix, discretize, lag_axis_ms,
    lagged_correlation, Correlogram,
};

// treatment
pub use treatment::{
    parse_treatment_log, read_treatment_file,
    TreatmentRange, TreatmentRanges, NO_TREATMENT,
};

// phy
pub use phy::{
    good_clusters, load_spike_clusters, load_spike_times, read_cluster_info,
    ClusterInfo, ExperimentLayout, PhyPaths, PhySpikes,
};

// io
pub use io::{
    read_units_ts_tsv, read_waveforms_safetensors, write_mean_waveforms_tsv,
    write_unit_electrode_tsv, write_units_ts_tsv, write_waveforms_json,
    write_waveforms_safetensors, StReader, StWriter,
};

/// Output of [`extract_units`].
#[derive(Debug, Clone)]
pub struct UnitExtraction {
    /// The kept clusters and the channel each was extracted from.
    pub map: ClusterChannelMap,
    /// Waveform records in `map` order, plus per-spike failures.
    pub extraction: Extraction,
    /// `(seconds, cluster)` for every spike of a kept cluster, detection order.
    pub units_ts: Vec<(f64, u32)>,
}

/// Run the **full extraction pipeline** for one experiment.
///
/// # Pipeline steps
///
/// 1. Validate `cfg`.
/// 2. Read the interleaved recording into a `[n_chan, n_samples]` matrix and
///    log its duration.
/// 3. Load `spike_times.npy` / `spike_clusters.npy`.
/// 4. Keep clusters from `cluster_info.tsv` whose `group` is
///    [`ExtractConfig::good_label`] and with at least
///    [`ExtractConfig::min_spikes`] spikes.
/// 5. Group trigger samples by cluster, dropping everything not kept.
/// 6. Cut a [`ExtractConfig::window_width`]-sample waveform around every
///    trigger on the cluster's best channel.
///
/// # Errors
///
/// Returns an error if any input file is missing or malformed, if the
/// spike arrays differ in length, or if a kept cluster has no spikes.
/// Spikes whose window runs past the recording do **not** fail the call;
/// they are listed in [`ExtractionReport`].
pub fn extract_units(recording: &Path, phy: &PhyPaths, cfg: &ExtractConfig) -> Result<UnitExtraction> {
    cfg.validate()?;

    // 1. Raw recording.
    let matrix = load_recording(recording, cfg.n_chan, cfg.sfreq)?;

    // 2. Sorter output.
    let spikes = PhySpikes::load(phy)?;
    let info = read_cluster_info(&phy.cluster_info)?;
    let map = good_clusters(&info, &cfg.good_label, cfg.min_spikes)
        .with_context(|| format!("selecting clusters from {}", phy.cluster_info.display()))?;
    info!(
        "{} of {} clusters labelled '{}' with ≥ {} spikes",
        map.len(),
        info.len(),
        cfg.good_label,
        cfg.min_spikes
    );

    // 3. Group + filter.
    let mut groups = group_spikes(&spikes.samples, &spikes.clusters)?;
    let keep = map.cluster_ids();
    groups.retain_clusters(&keep);
    let units_ts = flatten_seconds(&spikes.samples, &spikes.clusters, &keep, cfg.sfreq)?;

    // 4. Cut waveforms.
    let extraction = extract_waveforms(&matrix, &groups, &map, cfg.window_width, cfg.pre_samples)?;

    Ok(UnitExtraction { map, extraction, units_ts })
}
