//! Treatment (phase) intervals.
//!
//! A treatment log lists the onset time of each pharmacological phase,
//! terminated by a synthetic `END` marker:
//!
//! ```text
//! begin   label
//! 0       00_Baseline
//! 600     01_DAMGO 500nM On
//! 1500    02_Washout
//! 2400    END
//! ```
//!
//! Each onset is paired with the next later onset to form `[begin, end)`.
//! The latest onset is open-ended and gets no range.  Onsets are ordered by
//! `(time, label)`, so when several labels share an onset time only the
//! label sorting last keeps a range; the others would be zero-width.
use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::path::Path;

/// Label returned by [`TreatmentRanges::label_of`] outside every range.
pub const NO_TREATMENT: &str = "No Tx";

/// One treatment interval, `[begin, end)` seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct TreatmentRange {
    pub label: String,
    pub begin: f64,
    pub end: f64,
}

impl TreatmentRange {
    #[inline]
    pub fn contains(&self, ts: f64) -> bool {
        ts >= self.begin && ts < self.end
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        self.end - self.begin
    }
}

/// Non-overlapping treatment ranges, ascending by `begin`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreatmentRanges {
    ranges: Vec<TreatmentRange>,
}

impl TreatmentRanges {
    /// Build ranges from `(label, onset seconds)` pairs.
    ///
    /// Labels are trimmed.  A label appearing twice, or a non-finite onset,
    /// is an error.
    ///
    /// ```
    /// use measpike::treatment::TreatmentRanges;
    ///
    /// let tx = TreatmentRanges::resolve([("B", 5.0), ("A", 0.0), ("END", 10.0)]).unwrap();
    /// assert_eq!(tx.label_of(7.0), "B");
    /// assert_eq!(tx.label_of(10.0), "No Tx");
    /// ```
    pub fn resolve<I, S>(onsets: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut sorted: Vec<(String, f64)> = Vec::new();
        for (label, time) in onsets {
            let label = label.as_ref().trim().to_string();
            if !time.is_finite() {
                bail!("treatment '{label}' has non-finite onset {time}");
            }
            if !seen.insert(label.clone()) {
                bail!("treatment '{label}' listed more than once");
            }
            sorted.push((label, time));
        }
        sorted.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let ranges = sorted
            .windows(2)
            .filter(|w| w[0].1 < w[1].1)
            .map(|w| TreatmentRange { label: w[0].0.clone(), begin: w[0].1, end: w[1].1 })
            .collect();
        Ok(Self { ranges })
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TreatmentRange> {
        self.ranges.iter()
    }

    pub fn get(&self, label: &str) -> Option<&TreatmentRange> {
        self.ranges.iter().find(|r| r.label == label)
    }

    /// The range containing `ts`, if any.
    pub fn treatment_of(&self, ts: f64) -> Option<&TreatmentRange> {
        self.ranges.iter().find(|r| r.contains(ts))
    }

    /// Label of the range containing `ts`, or [`NO_TREATMENT`].
    pub fn label_of(&self, ts: f64) -> &str {
        self.treatment_of(ts).map_or(NO_TREATMENT, |r| r.label.as_str())
    }

    pub fn begin_of(&self, ts: f64) -> Option<f64> {
        self.treatment_of(ts).map(|r| r.begin)
    }

    pub fn end_of(&self, ts: f64) -> Option<f64> {
        self.treatment_of(ts).map(|r| r.end)
    }

    /// Position of `ts` inside its range, `0.0` at `begin` → `1.0` at `end`.
    pub fn relative_position(&self, ts: f64) -> Option<f64> {
        self.treatment_of(ts).map(|r| (ts - r.begin) / r.duration())
    }

    /// First onset and last range end, i.e. the span covered by treatments.
    pub fn span(&self) -> Option<(f64, f64)> {
        Some((self.ranges.first()?.begin, self.ranges.last()?.end))
    }
}

/// Read `(label, begin)` pairs from a treatment log.
///
/// Tab- or comma-delimited with a header row containing `begin` and `label`
/// columns (surrounding whitespace in header names is ignored).
pub fn read_treatment_file<P: AsRef<Path>>(path: P) -> Result<Vec<(String, f64)>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading treatment log {}", path.display()))?;
    parse_treatment_log(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Parse the contents of a treatment log (see [`read_treatment_file`]).
pub fn parse_treatment_log(text: &str) -> Result<Vec<(String, f64)>> {
    let header = text.lines().next().unwrap_or_default();
    let delimiter = if header.contains('\t') { b'\t' } else { b',' };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let col = |name: &str| headers.iter().position(|h| h == name);
    let (Some(begin_col), Some(label_col)) = (col("begin"), col("label")) else {
        bail!("treatment log needs 'begin' and 'label' columns, found {headers:?}");
    };

    let mut out = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let row = row?;
        let label = row.get(label_col).unwrap_or_default();
        let begin = row.get(begin_col).unwrap_or_default();
        if label.is_empty() {
            continue;
        }
        let begin: f64 = begin
            .parse()
            .with_context(|| format!("row {}: bad begin time '{begin}'", i + 1))?;
        out.push((label.to_string(), begin));
    }
    Ok(out)
}
