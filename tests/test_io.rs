use measpike::extract::{ClusterChannelMap, WaveformRecord};
use measpike::io::{
    read_units_ts_tsv, read_waveforms_safetensors, write_mean_waveforms_tsv,
    write_unit_electrode_tsv, write_units_ts_tsv, write_waveforms_json,
    write_waveforms_safetensors, StWriter,
};
use ndarray::{array, Array2};

fn records() -> Vec<WaveformRecord> {
    vec![
        WaveformRecord {
            cluster: 4,
            channel: 12,
            waves: array![[1.0, 2.0, 3.0], [f32::NAN, f32::NAN, f32::NAN], [3.0, 4.0, 5.0]],
            triggers: array![100, 19_999_990, 300],
            valid: vec![true, false, true],
        },
        WaveformRecord {
            cluster: 17,
            channel: 0,
            waves: Array2::from_elem((1, 3), f32::NAN),
            triggers: array![5],
            valid: vec![false],
        },
    ]
}

#[test]
fn json_marks_invalid_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x_waves_raw.json");
    write_waveforms_json(&path, &records()).unwrap();

    let v: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(v["waves"]["4"][0], serde_json::json!([1.0, 2.0, 3.0]));
    assert!(v["waves"]["4"][1][0].is_null());
    assert_eq!(v["times"]["4"][1], serde_json::json!([19_999_990]));
    assert_eq!(v["invalid"]["4"], serde_json::json!([1]));
    assert_eq!(v["invalid"]["17"], serde_json::json!([0]));
}

#[test]
fn mean_tsv_has_header_and_id_column() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x_waves.tsv");
    write_mean_waveforms_tsv(&path, &records(), 20_000.0).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert!(lines[0].starts_with('#'));
    assert!(lines[0].contains("[4, 17]"));
    assert_eq!(lines[1], "4.000000\t2.000000\t3.000000\t4.000000");
    assert!(lines[2].starts_with("17.000000\tNaN"));
    assert_eq!(lines.len(), 3);
}

#[test]
fn unit_electrode_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unit_electrode.tsv");
    let map = ClusterChannelMap::new(vec![(4, 12), (17, 0)]).unwrap();
    write_unit_electrode_tsv(&path, &map).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "unit\tchannel\n4\t12\n17\t0\n");
}

#[test]
fn units_ts_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("units_ts.tsv");
    let rows = [(0.005, 4), (0.0123456789, 17), (999.5, 4)];
    write_units_ts_tsv(&path, &rows).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().nth(1), Some("5.000000000e-03 \t 4"));

    let units = read_units_ts_tsv(&path).unwrap();
    assert_eq!(units[&4], vec![0.005, 999.5]);
    approx::assert_abs_diff_eq!(units[&17][0], 0.0123456789, epsilon = 1e-12);
}

#[test]
fn safetensors_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x_waves.safetensors");
    let recs = records();
    write_waveforms_safetensors(&path, &recs).unwrap();

    let back = read_waveforms_safetensors(&path).unwrap();
    assert_eq!(back.len(), 2);
    assert_eq!(back[0].cluster, 4);
    assert_eq!(back[0].channel, 12);
    assert_eq!(back[0].triggers, recs[0].triggers);
    assert_eq!(back[0].valid, recs[0].valid);
    assert_eq!(back[0].waves.row(2).to_vec(), vec![3.0, 4.0, 5.0]);
    assert!(back[1].waves.iter().all(|v| v.is_nan()));
}

#[test]
fn safetensors_row_count_mismatch_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad_waves.safetensors");
    let mut w = StWriter::new();
    w.add_i64("clusters", &[1], &[1]);
    w.add_i64("channels", &[0], &[1]);
    w.add_f32("waves_1", &[1.0, 2.0, 3.0, 4.0], &[2, 2]);
    w.add_u64("triggers_1", &[10], &[1]);
    w.add_u8("valid_1", &[1; 5], &[5]);
    w.write(&path).unwrap();

    let err = read_waveforms_safetensors(&path).unwrap_err();
    assert!(err.to_string().contains("2 waveform rows"));
}
