/// Shared helpers for synthetic recordings and PHY directories.
use ndarray::Array1;
use ndarray_npy::write_npy;
use std::path::Path;

/// Value of channel `c` at time `t` in the ramp recording.
#[allow(unused)]
pub fn ramp_value(c: usize, t: usize) -> i16 {
    (c * 1000 + t % 1000) as i16
}

/// Interleaved sample stream `[t0 c0][t0 c1] … [t1 c0] …` of `f(c, t)`.
#[allow(unused)]
pub fn interleaved(n_chan: usize, n_samples: usize, f: impl Fn(usize, usize) -> i16) -> Vec<i16> {
    let mut v = Vec::with_capacity(n_chan * n_samples);
    for t in 0..n_samples {
        for c in 0..n_chan {
            v.push(f(c, t));
        }
    }
    v
}

#[allow(unused)]
pub fn write_recording(path: &Path, samples: &[i16]) {
    let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    std::fs::write(path, bytes).unwrap();
}

/// One `cluster_info.tsv` row: `(cluster_id, ch, group, n_spikes)`.
#[allow(unused)]
pub type InfoRow<'a> = (u32, usize, &'a str, usize);

/// Write `spike_times.npy`, `spike_clusters.npy` and `cluster_info.tsv`.
#[allow(unused)]
pub fn write_phy_dir(dir: &Path, times: &[u64], clusters: &[u32], info: &[InfoRow]) {
    std::fs::create_dir_all(dir).unwrap();
    write_npy(dir.join("spike_times.npy"), &Array1::from(times.to_vec())).unwrap();
    let clusters: Vec<i32> = clusters.iter().map(|&c| c as i32).collect();
    write_npy(dir.join("spike_clusters.npy"), &Array1::from(clusters)).unwrap();

    let mut tsv = String::from("cluster_id\tAmplitude\tch\tgroup\tn_spikes\n");
    for (id, ch, group, n) in info {
        tsv.push_str(&format!("{id}\t1.0\t{ch}\t{group}\t{n}\n"));
    }
    std::fs::write(dir.join("cluster_info.tsv"), tsv).unwrap();
}
