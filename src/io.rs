//! Export writers and readers.
//!
//! | file                      | content                                       |
//! |---------------------------|-----------------------------------------------|
//! | `<expt>_waves_raw.json`   | `{"waves": {id: [[…]]}, "times": {id: [[t]]}, "invalid": {id: [row]}}` |
//! | `<expt>_waves.tsv`        | mean waveform per cluster, first column = id  |
//! | `<expt>_waves.safetensors`| `waves_<id>`, `triggers_<id>`, `valid_<id>`, `clusters`, `channels` |
//! | `unit_electrode.tsv`      | `unit  channel`                               |
//! | `units_ts.tsv`            | `timestamp  unit`, seconds in `%.9e`          |
//!
//! Failed waveform rows are NaN, which JSON writes as `null`.
use anyhow::{bail, Context, Result};
use log::info;
use ndarray::{Array1, Array2};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::Path;

use crate::extract::{ClusterChannelMap, WaveformRecord};

// ── safetensors ───────────────────────────────────────────────────────────

/// Minimal safetensors writer for F32, I64, U64 and U8 tensors.
///
/// ```rust,no_run
/// use measpike::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f32("signal", &[1.0f32, 2.0, 3.0], &[1, 3]);
/// w.add_u64("triggers", &[10, 20, 30], &[3]);
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        let bytes = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F32", shape.to_vec()));
    }

    pub fn add_f32_arr2(&mut self, name: &str, arr: &Array2<f32>) {
        let data: Vec<f32> = arr.iter().copied().collect();
        self.add_f32(name, &data, &[arr.nrows(), arr.ncols()]);
    }

    pub fn add_i64(&mut self, name: &str, data: &[i64], shape: &[usize]) {
        let bytes = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I64", shape.to_vec()));
    }

    pub fn add_u64(&mut self, name: &str, data: &[u64], shape: &[usize]) {
        let bytes = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "U64", shape.to_vec()));
    }

    pub fn add_u8(&mut self, name: &str, data: &[u8], shape: &[usize]) {
        self.entries.push((name.to_string(), data.to_vec(), "U8", shape.to_vec()));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut header_map = serde_json::Map::new();
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(name.clone(), serde_json::json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        let mut hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        hdr_bytes.extend(std::iter::repeat(b' ').take(pad));

        let mut f = std::fs::File::create(path)
            .with_context(|| format!("create {}", path.display()))?;
        f.write_all(&(hdr_bytes.len() as u64).to_le_bytes())?;
        f.write_all(&hdr_bytes)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        Ok(())
    }
}

/// One tensor located in a safetensors buffer.
struct StEntry {
    dtype: String,
    shape: Vec<usize>,
    start: usize,
    end: usize,
}

/// Minimal safetensors reader (whole file in memory).
pub struct StReader {
    bytes: Vec<u8>,
    data_start: usize,
    entries: HashMap<String, StEntry>,
}

impl StReader {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < 8 {
            bail!("safetensors file too small");
        }
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[..8]);
        let n = usize::try_from(u64::from_le_bytes(len)).context("bad safetensors header length")?;
        let data_start = 8usize.checked_add(n).context("bad safetensors header length")?;
        let header_bytes = bytes.get(8..data_start).context("truncated safetensors header")?;
        let header: HashMap<String, serde_json::Value> =
            serde_json::from_slice(header_bytes).context("failed to parse safetensors header")?;

        let mut entries = HashMap::new();
        for (name, v) in header {
            if name == "__metadata__" {
                continue;
            }
            let dtype = v["dtype"].as_str().context("missing dtype")?.to_string();
            let shape = v["shape"]
                .as_array()
                .context("missing shape")?
                .iter()
                .map(|d| d.as_u64().map(|d| d as usize).context("bad shape"))
                .collect::<Result<Vec<_>>>()?;
            let offsets = v["data_offsets"].as_array().context("missing data_offsets")?;
            let (Some(start), Some(end)) = (
                offsets.first().and_then(|o| o.as_u64()),
                offsets.get(1).and_then(|o| o.as_u64()),
            ) else {
                bail!("bad data_offsets for '{name}'");
            };
            if start > end {
                bail!("tensor '{name}' has data_offsets [{start}, {end}]");
            }
            let start = usize::try_from(start).context("data offset exceeds usize")?;
            let end = usize::try_from(end).context("data offset exceeds usize")?;
            entries.insert(name, StEntry { dtype, shape, start, end });
        }
        Ok(Self { bytes, data_start, entries })
    }

    fn raw(&self, name: &str, dtype: &str) -> Result<(&[u8], &[usize])> {
        let e = self.entries.get(name).with_context(|| format!("missing tensor '{name}'"))?;
        if e.dtype != dtype {
            bail!("tensor '{name}' is {}, expected {dtype}", e.dtype);
        }
        let (Some(lo), Some(hi)) = (self.data_start.checked_add(e.start), self.data_start.checked_add(e.end))
        else {
            bail!("tensor '{name}' offsets overflow");
        };
        let raw = self.bytes.get(lo..hi).with_context(|| format!("tensor '{name}' out of bounds"))?;
        Ok((raw, &e.shape))
    }

    pub fn f32(&self, name: &str) -> Result<(Vec<f32>, Vec<usize>)> {
        let (raw, shape) = self.raw(name, "F32")?;
        let v = raw.chunks_exact(4).map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])).collect();
        Ok((v, shape.to_vec()))
    }

    pub fn u64(&self, name: &str) -> Result<Vec<u64>> {
        let (raw, _) = self.raw(name, "U64")?;
        Ok(raw
            .chunks_exact(8)
            .map(|b| u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .collect())
    }

    pub fn i64(&self, name: &str) -> Result<Vec<i64>> {
        let (raw, _) = self.raw(name, "I64")?;
        Ok(raw
            .chunks_exact(8)
            .map(|b| i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .collect())
    }

    pub fn u8(&self, name: &str) -> Result<Vec<u8>> {
        Ok(self.raw(name, "U8")?.0.to_vec())
    }
}

/// Write every waveform record as tensors.
pub fn write_waveforms_safetensors(path: &Path, records: &[WaveformRecord]) -> Result<()> {
    let mut w = StWriter::new();
    let clusters: Vec<i64> = records.iter().map(|r| i64::from(r.cluster)).collect();
    let channels: Vec<i64> = records.iter().map(|r| r.channel as i64).collect();
    w.add_i64("clusters", &clusters, &[clusters.len()]);
    w.add_i64("channels", &channels, &[channels.len()]);
    for r in records {
        let c = r.cluster;
        w.add_f32_arr2(&format!("waves_{c}"), &r.waves);
        let triggers = r.triggers.to_vec();
        w.add_u64(&format!("triggers_{c}"), &triggers, &[triggers.len()]);
        let valid: Vec<u8> = r.valid.iter().map(|&v| u8::from(v)).collect();
        w.add_u8(&format!("valid_{c}"), &valid, &[valid.len()]);
    }
    w.write(path)?;
    info!("waveform tensors written to {}", path.display());
    Ok(())
}

/// Load records written by [`write_waveforms_safetensors`].
pub fn read_waveforms_safetensors(path: &Path) -> Result<Vec<WaveformRecord>> {
    let st = StReader::open(path)?;
    let clusters = st.i64("clusters")?;
    let channels = st.i64("channels")?;
    if clusters.len() != channels.len() {
        bail!("{}: clusters/channels length mismatch", path.display());
    }
    clusters
        .iter()
        .zip(&channels)
        .map(|(&c, &ch)| -> Result<WaveformRecord> {
            let (waves, shape) = st.f32(&format!("waves_{c}"))?;
            let [n, width] = shape[..] else {
                bail!("waves_{c} is not 2-D: {shape:?}");
            };
            let triggers = st.u64(&format!("triggers_{c}"))?;
            let valid: Vec<bool> = st.u8(&format!("valid_{c}"))?.into_iter().map(|v| v != 0).collect();
            // rows, triggers and flags must stay aligned
            if triggers.len() != n || valid.len() != n {
                bail!(
                    "cluster {c}: {n} waveform rows but {} triggers and {} valid flags",
                    triggers.len(),
                    valid.len()
                );
            }
            Ok(WaveformRecord {
                cluster: u32::try_from(c)?,
                channel: usize::try_from(ch)?,
                waves: Array2::from_shape_vec((n, width), waves)?,
                triggers: Array1::from(triggers),
                valid,
            })
        })
        .collect()
}

// ── JSON ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct WavesJson {
    waves: BTreeMap<u32, Vec<Vec<f32>>>,
    times: BTreeMap<u32, Vec<[u64; 1]>>,
    invalid: BTreeMap<u32, Vec<usize>>,
}

/// Every waveform and trigger sample, keyed by cluster id.
pub fn write_waveforms_json(path: &Path, records: &[WaveformRecord]) -> Result<()> {
    let mut doc = WavesJson { waves: BTreeMap::new(), times: BTreeMap::new(), invalid: BTreeMap::new() };
    for r in records {
        doc.waves.insert(r.cluster, r.waves.outer_iter().map(|row| row.to_vec()).collect());
        doc.times.insert(r.cluster, r.triggers.iter().map(|&t| [t]).collect());
        let bad = r.valid.iter().enumerate().filter(|(_, &v)| !v).map(|(i, _)| i).collect();
        doc.invalid.insert(r.cluster, bad);
    }
    let f = std::fs::File::create(path).with_context(|| format!("create {}", path.display()))?;
    serde_json::to_writer(std::io::BufWriter::new(f), &doc)?;
    info!("raw waveforms written to {}", path.display());
    Ok(())
}

// ── TSV ───────────────────────────────────────────────────────────────────

/// Mean waveform of each cluster; clusters without a valid row get NaN.
pub fn write_mean_waveforms_tsv(path: &Path, records: &[WaveformRecord], sfreq: f64) -> Result<()> {
    let mut f = std::io::BufWriter::new(
        std::fs::File::create(path).with_context(|| format!("create {}", path.display()))?,
    );
    let ids: Vec<u32> = records.iter().map(|r| r.cluster).collect();
    writeln!(
        f,
        "# Waveforms: rows are units; first column is PHY cluster id; \
         columns are samples at {sfreq} Hz; Cluster IDs in order: {ids:?}"
    )?;
    for r in records {
        let mean = r
            .mean_waveform()
            .unwrap_or_else(|| Array1::from_elem(r.width(), f32::NAN));
        let mut line = format!("{:.6}", f64::from(r.cluster));
        for v in mean.iter() {
            line.push_str(&format!("\t{v:.6}"));
        }
        writeln!(f, "{line}")?;
    }
    f.flush()?;
    info!("mean waveforms written to {}", path.display());
    Ok(())
}

pub fn write_unit_electrode_tsv(path: &Path, map: &ClusterChannelMap) -> Result<()> {
    let mut f = std::io::BufWriter::new(
        std::fs::File::create(path).with_context(|| format!("create {}", path.display()))?,
    );
    writeln!(f, "unit\tchannel")?;
    for (c, ch) in map.iter() {
        writeln!(f, "{c}\t{ch}")?;
    }
    f.flush()?;
    Ok(())
}

/// Format like C's `%.9e`: `1.500000000e+00`.
pub fn sci9(x: f64) -> String {
    let s = format!("{x:.9e}");
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => s,
    }
}

pub fn write_units_ts_tsv(path: &Path, rows: &[(f64, u32)]) -> Result<()> {
    let mut f = std::io::BufWriter::new(
        std::fs::File::create(path).with_context(|| format!("create {}", path.display()))?,
    );
    writeln!(f, "timestamp\tunit")?;
    for &(ts, unit) in rows {
        writeln!(f, "{} \t {unit}", sci9(ts))?;
    }
    f.flush()?;
    info!("{} spike timestamps written to {}", rows.len(), path.display());
    Ok(())
}

/// Parse `timestamp  unit` rows into per-unit timestamp lists.
pub fn parse_units_ts<R: std::io::Read>(reader: R) -> Result<BTreeMap<u32, Vec<f64>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut units: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for (i, row) in rdr.records().enumerate() {
        let row = row?;
        let (Some(ts), Some(unit)) = (row.get(0), row.get(1)) else {
            bail!("units_ts row {} has fewer than 2 columns", i + 1);
        };
        let ts: f64 = ts.parse().with_context(|| format!("row {}: bad timestamp '{ts}'", i + 1))?;
        let unit = parse_unit_id(unit).with_context(|| format!("row {}: bad unit '{unit}'", i + 1))?;
        units.entry(unit).or_default().push(ts);
    }
    Ok(units)
}

pub fn read_units_ts_tsv(path: &Path) -> Result<BTreeMap<u32, Vec<f64>>> {
    let f = std::fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    parse_units_ts(f).with_context(|| format!("parsing {}", path.display()))
}

/// Unit ids may have been written as floats (`3.0`).
fn parse_unit_id(s: &str) -> Result<u32> {
    if let Ok(u) = s.parse::<u32>() {
        return Ok(u);
    }
    let f: f64 = s.parse()?;
    if f.fract() != 0.0 || f < 0.0 || f > f64::from(u32::MAX) {
        bail!("not a unit id");
    }
    Ok(f as u32)
}
