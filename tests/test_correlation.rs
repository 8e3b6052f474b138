use approx::assert_abs_diff_eq;
use measpike::CorrelationConfig;
use measpike::correlation::{autocorr, crosscorr, crosscorr_matrix};
use std::collections::BTreeMap;

fn cfg_for(duration: f64) -> CorrelationConfig {
    CorrelationConfig { duration: Some(duration), ..CorrelationConfig::default() }
}

#[test]
fn isolated_spike_zero_lag_is_half() {
    let c = autocorr(&[0.0105], &cfg_for(0.0205)).unwrap();
    assert_eq!(c.values.len(), 11);
    assert_abs_diff_eq!(c.zero_lag(), 0.5, epsilon = 1e-12);
    for lag in [-5, -1, 1, 5] {
        assert_eq!(c.at_lag(lag), Some(0.0));
    }
}

#[test]
fn autocorr_is_symmetric() {
    let ts = [0.0105, 0.0125, 0.0201, 0.0235, 0.0302, 0.0331, 0.0335];
    let c = autocorr(&ts, &cfg_for(0.050)).unwrap();
    for k in 1..=5 {
        assert_abs_diff_eq!(c.at_lag(k).unwrap(), c.at_lag(-k).unwrap(), epsilon = 1e-12);
    }
}

#[test]
fn lag_axis_spans_plus_minus_five_ms() {
    let c = autocorr(&[0.0105], &cfg_for(0.0205)).unwrap();
    assert_eq!(c.lags_ms, vec![-5.0, -4.0, -3.0, -2.0, -1.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
}

#[test]
fn crosscorr_peak_at_fixed_delay() {
    // b always fires 2 ms after a
    let a = [0.0105, 0.0305, 0.0505];
    let b = [0.0125, 0.0325, 0.0525];
    let c = crosscorr(&a, &b, &cfg_for(0.070)).unwrap();
    // c[k] pairs a[n + k] with b[n + L], so b lagging a by +2 bins shows at k = L - 2
    assert_abs_diff_eq!(c.at_lag(-2).unwrap(), 3.0 / 4.0, epsilon = 1e-12);
    assert_eq!(c.zero_lag(), 0.0);
}

#[test]
fn short_train_without_duration_is_error() {
    // 0.004 s → 5 bins, not enough for ±5 lag bins
    assert!(autocorr(&[0.001, 0.004], &CorrelationConfig::default()).is_err());
}

#[test]
fn matrix_covers_every_unit() {
    let mut units = BTreeMap::new();
    units.insert(1, vec![0.0105, 0.0205]);
    units.insert(2, vec![0.0115, 0.0255]);
    units.insert(4, vec![0.0405]);
    let m = crosscorr_matrix(1, &units, &cfg_for(0.060)).unwrap();
    assert_eq!(m.keys().copied().collect::<Vec<_>>(), vec![1, 2, 4]);
    assert_abs_diff_eq!(m[&1].zero_lag(), 2.0 / 3.0, epsilon = 1e-12);
    assert!(crosscorr_matrix(9, &units, &cfg_for(0.060)).is_err());
}

#[test]
fn empty_unit_in_matrix_is_error() {
    let mut units = BTreeMap::new();
    units.insert(1, vec![0.0105]);
    units.insert(2, vec![]);
    assert!(crosscorr_matrix(1, &units, &cfg_for(0.060)).is_err());
}
