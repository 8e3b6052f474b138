//! Per-spike failure types.
//!
//! Fatal problems (missing files, malformed pairings) surface as
//! `anyhow::Error`.  A single spike whose window cannot be cut from the
//! recording is not fatal: it becomes a [`SpikeError`] inside the
//! extraction report and the row is marked invalid.
use thiserror::Error;

use crate::window::Window;

/// Why one spike's waveform could not be extracted.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpikeError {
    /// The window runs past the last sample of the recording.
    #[error("window [{start}, {stop}) exceeds recording length {n_samples}")]
    OutOfRange { start: usize, stop: usize, n_samples: usize },

    /// The cluster's assigned channel does not exist in the recording.
    #[error("channel {channel} not in recording with {n_chan} channels")]
    BadChannel { channel: usize, n_chan: usize },
}

/// One failed row of a [`WaveformRecord`](crate::extract::WaveformRecord).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpikeFailure {
    pub cluster: u32,
    pub channel: usize,
    /// Row index inside the cluster's waveform matrix.
    pub row: usize,
    pub trigger: u64,
    pub window: Window,
    pub error: SpikeError,
}

impl std::fmt::Display for SpikeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cluster {} channel {} row {} (trigger {}, window ({}, {})): {}",
            self.cluster, self.channel, self.row, self.trigger,
            self.window.start, self.window.end, self.error
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_names_cluster_and_range() {
        let f = SpikeFailure {
            cluster: 7,
            channel: 3,
            row: 12,
            trigger: 990,
            window: Window { start: 960, end: 1080 },
            error: SpikeError::OutOfRange { start: 960, stop: 1081, n_samples: 1000 },
        };
        let msg = f.to_string();
        assert!(msg.contains("cluster 7"));
        assert!(msg.contains("channel 3"));
        assert!(msg.contains("(960, 1080)"));
        assert!(msg.contains("recording length 1000"));
    }
}
