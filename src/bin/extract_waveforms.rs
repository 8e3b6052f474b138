use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::info;
use measpike::{extract_units, io, ExperimentLayout, ExtractConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "extract_waveforms", about = "Cut per-unit spike waveforms from a MED64 recording")]
struct Args {
    /// Experiment directory containing <expt>.modat.bin
    expt_dir: PathBuf,

    /// PHY output lives under <expt_dir>/PHY
    #[arg(long)]
    phy_subdir: bool,

    /// Sampling rate in Hz (default: 20000)
    #[arg(long, default_value_t = 20_000.0)]
    sfreq: f64,

    /// Number of interleaved channels (default: 64)
    #[arg(long, default_value_t = 64)]
    n_chan: usize,

    /// Samples per waveform (default: 121)
    #[arg(long, default_value_t = 121)]
    width: usize,

    /// Samples before the trigger (default: 30)
    #[arg(long, default_value_t = 30)]
    pre: usize,

    /// Centre the window on the trigger instead of using --pre
    #[arg(long)]
    centred: bool,

    /// Minimum spikes for a cluster to be kept (default: 10)
    #[arg(long, default_value_t = 10)]
    min_spikes: usize,

    /// Also write <expt>_waves_raw.json
    #[arg(long)]
    json: bool,

    /// Also write <expt>_waves.safetensors
    #[arg(long)]
    safetensors: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let layout = ExperimentLayout::new(&args.expt_dir, args.phy_subdir)?;
    let cfg = ExtractConfig {
        sfreq: args.sfreq,
        n_chan: args.n_chan,
        window_width: args.width,
        pre_samples: (!args.centred).then_some(args.pre),
        min_spikes: args.min_spikes,
        ..ExtractConfig::default()
    };

    let units = extract_units(&layout.recording, &layout.phy, &cfg)?;
    let records = &units.extraction.records;

    io::write_mean_waveforms_tsv(&layout.waves_tsv(), records, cfg.sfreq)?;
    io::write_unit_electrode_tsv(&layout.unit_electrode_tsv(), &units.map)?;
    io::write_units_ts_tsv(&layout.units_ts_tsv(), &units.units_ts)?;
    if args.json {
        io::write_waveforms_json(&layout.waves_json(), records)?;
    }
    if args.safetensors {
        io::write_waveforms_safetensors(&layout.waves_safetensors(), records)?;
    }

    info!(
        "{} units, {} skipped spikes → {}",
        records.len(),
        units.extraction.report.n_skipped(),
        layout.export_dir.display()
    );
    Ok(())
}
