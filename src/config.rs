//! Extraction and correlation configuration.
//!
//! [`ExtractConfig`] holds every tunable parameter for turning a raw MED64
//! recording plus PHY spike-sorter output into per-unit waveform records.
//! [`CorrelationConfig`] holds the binning resolution and lag span of the
//! auto/cross-correlograms.  Both are passed explicitly to each step; there is
//! no process-wide configuration.
use anyhow::{bail, Result};

/// Configuration for waveform extraction.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use measpike::ExtractConfig;
///
/// let cfg = ExtractConfig {
///     window_width: 401,        // 20 ms at 20 kHz
///     pre_samples:  Some(200),  // 10 ms before the trigger
///     ..ExtractConfig::default()
/// };
/// assert!(cfg.validate().is_ok());
/// ```
///
/// Or just call [`ExtractConfig::default()`] for the MED64 lab settings.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Sampling rate of the raw recording in Hz.
    ///
    /// Used to convert trigger samples to seconds and for the duration
    /// diagnostic.
    ///
    /// Default: `20000.0` Hz.
    pub sfreq: f64,

    /// Number of interleaved channels in the raw `.modat.bin` stream.
    ///
    /// Default: `64`.
    pub n_chan: usize,

    /// Total number of samples in each extracted waveform snippet.
    ///
    /// At 20 kHz the default 121 samples span 6 ms.
    ///
    /// Default: `121`.
    pub window_width: usize,

    /// Number of samples kept before the trigger sample.
    ///
    /// `None` centres the window on the trigger (half-width on each side).
    /// With the default 30 samples (1.5 ms) the trigger lands on row
    /// index 30, i.e. the 31st sample of every waveform.
    ///
    /// Default: `Some(30)`.
    pub pre_samples: Option<usize>,

    /// Minimum `n_spikes` a cluster needs in `cluster_info.tsv` to be kept.
    ///
    /// Default: `10`.
    pub min_spikes: usize,

    /// Quality label (`group` column) a cluster needs to be kept.
    ///
    /// Default: `"good"`.
    pub good_label: String,
}

impl Default for ExtractConfig {
    /// 20 kHz · 64 channels · 121-sample windows with 30 pre-trigger samples.
    fn default() -> Self {
        Self {
            sfreq: 20_000.0,
            n_chan: 64,
            window_width: 121,
            pre_samples: Some(30),
            min_spikes: 10,
            good_label: "good".to_string(),
        }
    }
}

impl ExtractConfig {
    /// Reject configurations the window arithmetic cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.n_chan == 0 {
            bail!("n_chan must be at least 1");
        }
        if self.window_width == 0 {
            bail!("window_width must be at least 1 sample");
        }
        if !(self.sfreq > 0.0) {
            bail!("sfreq must be positive, got {}", self.sfreq);
        }
        if let Some(pre) = self.pre_samples {
            if pre >= self.window_width {
                bail!(
                    "pre_samples ({pre}) must be smaller than window_width ({})",
                    self.window_width
                );
            }
        }
        Ok(())
    }

    /// Window length in milliseconds.
    ///
    /// ```
    /// use measpike::ExtractConfig;
    /// let cfg = ExtractConfig::default();
    /// assert!((cfg.window_ms() - 6.05).abs() < 1e-9);
    /// ```
    pub fn window_ms(&self) -> f64 {
        self.window_width as f64 / self.sfreq * 1000.0
    }
}

/// Configuration for the spike-train correlograms.
#[derive(Debug, Clone)]
pub struct CorrelationConfig {
    /// Bins per second used to discretise timestamps.
    ///
    /// Default: `1000.0` (1 ms bins).
    pub bins_per_sec: f64,

    /// Number of lag bins on each side of zero.
    ///
    /// Default: `5` (−5 … +5 ms at 1 ms bins).
    pub lag_bins: usize,

    /// Optional recording length in seconds.
    ///
    /// When set, the binned arrays cover at least this duration, so spikes
    /// near the end of the train still fall inside the lagged window.
    /// When `None`, arrays end at the largest timestamp.
    ///
    /// Default: `None`.
    pub duration: Option<f64>,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self { bins_per_sec: 1000.0, lag_bins: 5, duration: None }
    }
}

impl CorrelationConfig {
    /// Width of one bin in milliseconds.
    pub fn bin_ms(&self) -> f64 {
        1000.0 / self.bins_per_sec
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.bins_per_sec > 0.0) {
            bail!("bins_per_sec must be positive, got {}", self.bins_per_sec);
        }
        if let Some(d) = self.duration {
            if !(d >= 0.0) {
                bail!("duration must be non-negative, got {d}");
            }
        }
        Ok(())
    }
}
