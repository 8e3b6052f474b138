use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::info;
use measpike::{
    autocorr, crosscorr_matrix, mean_firing_rate_by_treatment, mean_firing_rates,
    rate_histogram, read_treatment_file, read_units_ts_tsv, thinning_factor,
    Correlogram, CorrelationConfig, TreatmentRanges,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "unit_activity", about = "Firing rates, activity histograms and correlograms per unit")]
struct Args {
    /// units_ts.tsv written by extract_waveforms
    units_ts: PathBuf,

    /// Treatment log with `begin` and `label` columns (last row = END)
    treatments: PathBuf,

    /// JSON output path
    #[arg(long)]
    output: PathBuf,

    /// Histogram bin width in seconds (default: 60)
    #[arg(long, default_value_t = 60.0)]
    bin_sec: f64,

    /// Correlogram bins per second (default: 1000)
    #[arg(long, default_value_t = 1000.0)]
    bins_per_sec: f64,

    /// Correlogram lag bins on each side of zero (default: 5)
    #[arg(long, default_value_t = 5)]
    lag_bins: usize,

    /// Cross-correlate this unit against every other unit
    #[arg(long)]
    reference: Option<u32>,
}

#[derive(Serialize)]
struct UnitHistogram {
    edges: Vec<f64>,
    rates_hz: Vec<f64>,
    rug_step: usize,
}

#[derive(Serialize)]
struct ActivityReport {
    treatments: Vec<(String, f64, f64)>,
    rate_by_treatment: BTreeMap<String, BTreeMap<u32, f64>>,
    overall_rate: BTreeMap<u32, f64>,
    population_rate: f64,
    histograms: BTreeMap<u32, UnitHistogram>,
    autocorr: BTreeMap<u32, Correlogram>,
    crosscorr: Option<BTreeMap<u32, Correlogram>>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let units = read_units_ts_tsv(&args.units_ts)?;
    let tx = TreatmentRanges::resolve(read_treatment_file(&args.treatments)?)?;
    let (start, end) = tx.span().context("treatment log needs at least two onsets")?;
    info!("{} units, {} treatments spanning {start}–{end} s", units.len(), tx.len());

    let overall = mean_firing_rates(&units, start, end)?;
    let rate_by_treatment = mean_firing_rate_by_treatment(&units, &tx);

    let cc_cfg = CorrelationConfig {
        bins_per_sec: args.bins_per_sec,
        lag_bins: args.lag_bins,
        duration: Some(end),
    };

    let mut histograms = BTreeMap::new();
    let mut autocorrs = BTreeMap::new();
    for (&unit, ts) in &units {
        let (edges, rates_hz) = rate_histogram(ts, args.bin_sec)
            .with_context(|| format!("histogram of unit {unit}"))?;
        histograms.insert(unit, UnitHistogram { edges, rates_hz, rug_step: thinning_factor(ts.len()) });
        autocorrs.insert(unit, autocorr(ts, &cc_cfg).with_context(|| format!("unit {unit}"))?);
    }

    let crosscorr = args
        .reference
        .map(|r| crosscorr_matrix(r, &units, &cc_cfg))
        .transpose()?;

    let report = ActivityReport {
        treatments: tx.iter().map(|r| (r.label.clone(), r.begin, r.end)).collect(),
        rate_by_treatment,
        overall_rate: overall.per_unit,
        population_rate: overall.population_mean,
        histograms,
        autocorr: autocorrs,
        crosscorr,
    };

    let f = std::fs::File::create(&args.output)
        .with_context(|| format!("create {}", args.output.display()))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(f), &report)?;
    info!("activity report → {}", args.output.display());
    Ok(())
}
