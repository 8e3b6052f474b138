//! Trigger-aligned sample windows.
//!
//! Two placement rules, selected by `pre_samples`:
//!
//! ```text
//! centred:   start = t - ⌊w/2⌋          end = t + ⌊w/2⌋
//! pre-trig:  start = t - pre            end = t + (w - pre - 1)
//! ```
//!
//! Whenever `start <= 0` the window is reset flush-left to `(0, w)`; it is
//! not shifted symmetrically.  No upper-bound clamp is applied here, the
//! extractor detects windows that run past the recording.
//!
//! The extractor always cuts exactly `w` samples, `start..start + w`
//! (see [`Window::samples`]).  `end` is kept as computed above so the bounds
//! stay comparable with the legacy tooling.

/// Start/end sample bounds for one trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

impl Window {
    /// The exact-width sample range cut from a channel.
    #[inline]
    pub fn samples(&self, width: usize) -> std::ops::Range<usize> {
        self.start..self.start + width
    }
}

/// Compute the window around `trigger` for a snippet of `width` samples.
///
/// ```
/// use measpike::window::{compute_window, Window};
///
/// assert_eq!(compute_window(1000, 121, Some(30)), Window { start: 970, end: 1090 });
/// assert_eq!(compute_window(1000, 120, None),     Window { start: 940, end: 1060 });
/// // flush-left reset near the start of the recording
/// assert_eq!(compute_window(10, 121, Some(30)),   Window { start: 0, end: 121 });
/// ```
pub fn compute_window(trigger: u64, width: usize, pre_samples: Option<usize>) -> Window {
    let t = trigger as i64;
    let w = width as i64;
    let (pre, post) = match pre_samples {
        None => (w / 2, w / 2),
        Some(pre) => {
            let pre = pre as i64;
            (pre, w - pre - 1)
        }
    };

    let start = t - pre;
    if start <= 0 {
        return Window { start: 0, end: width };
    }
    Window { start: start as usize, end: (t + post).max(0) as usize }
}

/// Row index of the trigger sample inside an extracted snippet, for windows
/// that were not reset flush-left.
pub fn trigger_offset(width: usize, pre_samples: Option<usize>) -> usize {
    pre_samples.unwrap_or(width / 2)
}
