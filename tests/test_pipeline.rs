mod common;
use common::{interleaved, ramp_value, write_phy_dir, write_recording};
use measpike::phy::{read_int_npy, ExperimentLayout, PhySpikes};
use measpike::{extract_units, io, ExtractConfig};
use ndarray::Array1;
use std::path::Path;

const N_CHAN: usize = 4;
const N_SAMPLES: usize = 2000;

/// Experiment `dir/<id>` with clusters 0 (good, ch 1), 1 (noise), 2 (good, ch 3).
fn make_experiment(root: &Path, phy_subdir: bool) -> ExperimentLayout {
    let expt = root.join("20240201_14h34m13s");
    std::fs::create_dir_all(&expt).unwrap();
    let layout = ExperimentLayout::new(&expt, phy_subdir).unwrap();
    write_recording(&layout.recording, &interleaved(N_CHAN, N_SAMPLES, ramp_value));

    let times = [100, 150, 200, 300, 400, 1995, 600];
    let clusters = [0, 1, 2, 0, 2, 0, 1];
    write_phy_dir(
        &layout.phy.dir,
        &times,
        &clusters,
        &[(0, 1, "good", 3), (1, 0, "noise", 2), (2, 3, "good", 2)],
    );
    layout
}

fn cfg() -> ExtractConfig {
    ExtractConfig {
        n_chan: N_CHAN,
        window_width: 21,
        pre_samples: Some(5),
        min_spikes: 2,
        ..ExtractConfig::default()
    }
}

#[test]
fn extracts_good_clusters_only() {
    let dir = tempfile::tempdir().unwrap();
    let layout = make_experiment(dir.path(), false);
    let units = extract_units(&layout.recording, &layout.phy, &cfg()).unwrap();

    assert_eq!(units.map.cluster_ids(), vec![0, 2]);
    let ex = &units.extraction;
    assert!(ex.record(1).is_none());

    let r0 = ex.record(0).unwrap();
    assert_eq!(r0.channel, 1);
    assert_eq!(r0.triggers.to_vec(), vec![100, 300, 1995]);
    assert_eq!(r0.valid, vec![true, true, false]);
    assert_eq!(r0.waves[[0, 5]], ramp_value(1, 100) as f32);

    let r2 = ex.record(2).unwrap();
    assert_eq!(r2.waves[[1, 5]], ramp_value(3, 400) as f32);
    assert_eq!(ex.report.affected_clusters(), vec![0]);
}

#[test]
fn units_ts_keeps_detection_order() {
    let dir = tempfile::tempdir().unwrap();
    let layout = make_experiment(dir.path(), true);
    let units = extract_units(&layout.recording, &layout.phy, &cfg()).unwrap();
    let ids: Vec<u32> = units.units_ts.iter().map(|&(_, u)| u).collect();
    assert_eq!(ids, vec![0, 2, 0, 2, 0]);
    approx::assert_abs_diff_eq!(units.units_ts[0].0, 100.0 / 20_000.0, epsilon = 1e-15);
}

#[test]
fn min_spikes_filters_clusters() {
    let dir = tempfile::tempdir().unwrap();
    let layout = make_experiment(dir.path(), false);
    let cfg = ExtractConfig { min_spikes: 3, ..cfg() };
    let units = extract_units(&layout.recording, &layout.phy, &cfg).unwrap();
    assert_eq!(units.map.cluster_ids(), vec![0]);
}

#[test]
fn good_cluster_without_spikes_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let layout = make_experiment(dir.path(), false);
    // cluster 7 claims spikes in cluster_info but has none in spike_clusters
    write_phy_dir(&layout.phy.dir, &[100, 200], &[0, 0], &[(0, 1, "good", 2), (7, 2, "good", 5)]);
    let err = extract_units(&layout.recording, &layout.phy, &cfg()).unwrap_err();
    assert!(format!("{err:#}").contains("[7]"));
}

#[test]
fn spike_array_length_mismatch_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let layout = make_experiment(dir.path(), false);
    ndarray_npy::write_npy(&layout.phy.spike_clusters, &Array1::from(vec![0i64])).unwrap();
    assert!(PhySpikes::load(&layout.phy).is_err());
}

#[test]
fn npy_dtypes_are_widened() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("a.npy");
    ndarray_npy::write_npy(&p, &Array1::from(vec![3u32, 4])).unwrap();
    assert_eq!(read_int_npy(&p).unwrap(), vec![3, 4]);
    ndarray_npy::write_npy(&p, &Array1::from(vec![-1i64])).unwrap();
    assert_eq!(read_int_npy(&p).unwrap(), vec![-1]);
}

#[test]
fn exports_land_in_export_dir() {
    let dir = tempfile::tempdir().unwrap();
    let layout = make_experiment(dir.path(), true);
    let units = extract_units(&layout.recording, &layout.phy, &cfg()).unwrap();
    io::write_mean_waveforms_tsv(&layout.waves_tsv(), &units.extraction.records, 20_000.0).unwrap();
    io::write_units_ts_tsv(&layout.units_ts_tsv(), &units.units_ts).unwrap();

    let back = io::read_units_ts_tsv(&layout.units_ts_tsv()).unwrap();
    assert_eq!(back[&0].len(), 3);
    assert_eq!(back[&2].len(), 2);
    assert!(layout.waves_tsv().starts_with(dir.path().join("20240201_14h34m13s/PHY")));
}
