//! Raw MED64 `.modat.bin` reader.
//!
//! The file is a flat stream of little-endian `i16` samples with the
//! channels interleaved per time step:
//!
//! ```text
//! byte stream:  [t0 c0][t0 c1] … [t0 c63][t1 c0][t1 c1] … [t1 c63] …
//! matrix:       data[ch, t] = stream[t · n_chan + ch]
//! ```
//!
//! This is a column-major (Fortran order) fill of a `[n_chan, n_samples]`
//! matrix.  A trailing partial frame (fewer than `n_chan` samples) is dropped,
//! as is an odd trailing byte.
use anyhow::{bail, Context, Result};
use log::info;
use ndarray::{Array2, ArrayView1};
use std::path::Path;

/// Per-channel time series, shape `[n_chan, n_samples]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMatrix {
    data: Array2<i16>,
}

impl ChannelMatrix {
    /// Wrap an existing `[n_chan, n_samples]` array.
    pub fn from_array(data: Array2<i16>) -> Self {
        Self { data }
    }

    #[inline]
    pub fn n_chan(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    /// One channel's samples, or `None` if `ch` is out of range.
    pub fn channel(&self, ch: usize) -> Option<ArrayView1<'_, i16>> {
        (ch < self.n_chan()).then(|| self.data.row(ch))
    }

    pub fn as_array(&self) -> &Array2<i16> {
        &self.data
    }

    /// Recording length in seconds at `sfreq` Hz.
    #[inline]
    pub fn duration_secs(&self, sfreq: f64) -> f64 {
        self.n_samples() as f64 / sfreq
    }

    /// Recording length in minutes at `sfreq` Hz.
    #[inline]
    pub fn duration_minutes(&self, sfreq: f64) -> f64 {
        self.duration_secs(sfreq) / 60.0
    }
}

/// Split an interleaved sample stream into `[n_chan, n_samples]`.
///
/// ```
/// use measpike::recording::deinterleave;
///
/// // two channels, three time steps: ch0 = 0,1,2  ch1 = 10,11,12
/// let m = deinterleave(vec![0, 10, 1, 11, 2, 12], 2).unwrap();
/// assert_eq!(m.channel(0).unwrap().to_vec(), vec![0, 1, 2]);
/// assert_eq!(m.channel(1).unwrap().to_vec(), vec![10, 11, 12]);
/// ```
pub fn deinterleave(mut samples: Vec<i16>, n_chan: usize) -> Result<ChannelMatrix> {
    if n_chan == 0 {
        bail!("cannot de-interleave with n_chan = 0");
    }
    let n_samples = samples.len() / n_chan;
    samples.truncate(n_samples * n_chan);

    // Row-major [T, C] is the same memory as column-major [C, T].
    let frames = Array2::from_shape_vec((n_samples, n_chan), samples)?;
    let data = frames.reversed_axes().as_standard_layout().into_owned();
    Ok(ChannelMatrix { data })
}

/// Decode little-endian `i16` samples; an odd trailing byte is ignored.
pub fn decode_i16_le(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

/// Read a whole `.modat.bin` recording into memory.
pub fn read_recording<P: AsRef<Path>>(path: P, n_chan: usize) -> Result<ChannelMatrix> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading raw recording {}", path.display()))?;
    deinterleave(decode_i16_le(&bytes), n_chan)
        .with_context(|| format!("de-interleaving {}", path.display()))
}

/// Read a recording and log its duration.
pub fn load_recording<P: AsRef<Path>>(path: P, n_chan: usize, sfreq: f64) -> Result<ChannelMatrix> {
    let path = path.as_ref();
    let matrix = read_recording(path, n_chan)?;
    info!(
        "{}: {} ch × {} samples, duration {:.1} minutes",
        path.display(),
        matrix.n_chan(),
        matrix.n_samples(),
        matrix.duration_minutes(sfreq)
    );
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_frame_dropped() {
        // 7 samples, 3 channels → 2 complete frames, 1 leftover
        let m = deinterleave((0..7).collect(), 3).unwrap();
        assert_eq!((m.n_chan(), m.n_samples()), (3, 2));
        assert_eq!(m.channel(2).unwrap().to_vec(), vec![2, 5]);
    }

    #[test]
    fn rows_are_contiguous() {
        let m = deinterleave((0..12).collect(), 4).unwrap();
        assert!(m.as_array().is_standard_layout());
    }

    #[test]
    fn decode_little_endian_and_odd_byte() {
        let v = decode_i16_le(&[0x01, 0x00, 0xff, 0xff, 0x7f]);
        assert_eq!(v, vec![1, -1]);
    }

    #[test]
    fn duration_uses_samples_per_channel() {
        let m = ChannelMatrix::from_array(Array2::zeros((64, 1_200_000)));
        approx::assert_abs_diff_eq!(m.duration_minutes(20_000.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn missing_channel_is_none() {
        let m = deinterleave(vec![1, 2], 2).unwrap();
        assert!(m.channel(2).is_none());
    }
}
