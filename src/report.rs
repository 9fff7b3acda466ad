//! Report assembly: statistics, per-file deviations, pairwise comparison
//! and the global "same loudness" verdict.
//!
//! [`build`] is a pure function of its input. It never mutates the records
//! and never retries or repairs failed ones.

use thiserror::Error;
use tracing::debug;

use crate::classify::{classify, max_abs, Similarity};
use crate::models::{
    Deviation, EnrichedFile, MeasurementRecord, MetricStats, Pair, Report, ReportStats,
    ReportSummary,
};
use crate::policy;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReportError {
    #[error("no usable loudness measurement ({total} file(s), all failed)")]
    NoUsableData { total: usize },
}

/// Build the comparison report for `measurements`.
pub fn build(measurements: &[MeasurementRecord]) -> Result<Report, ReportError> {
    let (files_ok, files_err): (Vec<MeasurementRecord>, Vec<MeasurementRecord>) =
        measurements.iter().cloned().partition(MeasurementRecord::is_usable);

    if files_ok.is_empty() {
        return Err(ReportError::NoUsableData {
            total: measurements.len(),
        });
    }

    let stats = compute_stats(&files_ok);
    let files_enriched = measurements.iter().map(|m| enrich(m, &stats)).collect();
    let pairs = compare_pairs(&files_ok);
    let summary = summarize(measurements.len(), files_ok.len(), files_err.len(), &pairs);

    debug!(
        files = summary.files_total,
        ok = summary.files_ok,
        err = summary.files_err,
        pairs = summary.pairs,
        global_same = summary.global_same,
        "report built"
    );

    Ok(Report {
        metrics: measurements.to_vec(),
        files_ok,
        files_err,
        stats,
        files_enriched,
        pairs,
        summary,
    })
}

/// Values of one metric over the records that report it.
fn column(ok: &[MeasurementRecord], get: impl Fn(&MeasurementRecord) -> Option<f64>) -> Vec<f64> {
    ok.iter().filter_map(get).collect()
}

fn compute_stats(ok: &[MeasurementRecord]) -> ReportStats {
    ReportStats {
        lufs_i: MetricStats::from_values(&column(ok, |m| m.lufs_i)),
        true_peak_dbtp: MetricStats::from_values(&column(ok, |m| m.true_peak_dbtp)),
        lra: MetricStats::from_values(&column(ok, |m| m.lra)),
        peak_dbfs: MetricStats::from_values(&column(ok, |m| m.peak_dbfs)),
        rms_dbfs: MetricStats::from_values(&column(ok, |m| m.rms_dbfs)),
    }
}

/// Deviation of `value` from a population that is known to be non-empty.
fn deviation(value: f64, stats: &MetricStats) -> Deviation {
    let mean = stats.mean.unwrap_or(value);
    let median = stats.median.unwrap_or(value);
    let std = stats.std.unwrap_or(0.0);
    let z = if std > policy::STD_FLOOR {
        (value - mean) / std
    } else {
        0.0
    };
    Deviation {
        delta_mean: value - mean,
        delta_median: value - median,
        z,
    }
}

fn enrich(m: &MeasurementRecord, stats: &ReportStats) -> EnrichedFile {
    let mut file = EnrichedFile {
        file_name: m.file_name.clone(),
        ext: m.ext.clone(),
        size_bytes: m.size_bytes,
        path: m.path.clone(),
        lufs_i: None,
        lufs_m: None,
        lufs_s: None,
        true_peak_dbtp: None,
        lra: None,
        peak_dbfs: None,
        rms_dbfs: None,
        lufs_dev: None,
        tp_dev: None,
        lra_dev: None,
        error: m.error.clone(),
    };

    if let Some((lufs, tp, lra)) = m.primary() {
        file.lufs_i = Some(lufs);
        file.lufs_m = m.lufs_m;
        file.lufs_s = m.lufs_s;
        file.true_peak_dbtp = Some(tp);
        file.lra = Some(lra);
        file.peak_dbfs = m.peak_dbfs;
        file.rms_dbfs = m.rms_dbfs;
        file.lufs_dev = Some(deviation(lufs, &stats.lufs_i));
        file.tp_dev = Some(deviation(tp, &stats.true_peak_dbtp));
        file.lra_dev = Some(deviation(lra, &stats.lra));
        file.error = None;
    }

    file
}

/// All unordered pairs in combination order: (0,1), (0,2), ..., (1,2), ...
fn compare_pairs(ok: &[MeasurementRecord]) -> Vec<Pair> {
    let mut pairs = Vec::with_capacity(ok.len() * ok.len().saturating_sub(1) / 2);
    for (i, a) in ok.iter().enumerate() {
        for b in &ok[i + 1..] {
            if let (Some((a_lufs, a_tp, _)), Some((b_lufs, b_tp, _))) = (a.primary(), b.primary()) {
                let d_lufs = b_lufs - a_lufs;
                let d_tp = b_tp - a_tp;
                pairs.push(Pair {
                    a_file: a.file_name.clone(),
                    b_file: b.file_name.clone(),
                    a_ext: a.ext.clone(),
                    b_ext: b.ext.clone(),
                    a_lufs_i: a_lufs,
                    b_lufs_i: b_lufs,
                    d_lufs,
                    a_tp_dbtp: a_tp,
                    b_tp_dbtp: b_tp,
                    d_tp,
                    d_max_abs: max_abs(d_lufs, d_tp),
                    similarity: classify(d_lufs, d_tp),
                });
            }
        }
    }
    pairs
}

fn summarize(total: usize, ok: usize, err: usize, pairs: &[Pair]) -> ReportSummary {
    let mut summary = ReportSummary {
        files_total: total,
        files_ok: ok,
        files_err: err,
        pairs: pairs.len(),
        ratio_slight_or_less: 1.0,
        mean_delta: 0.0,
        max_delta: None,
        worst_pair: None,
        global_same: true,
    };

    if pairs.is_empty() {
        return summary;
    }

    let slight = Similarity::Slight.rank();
    let close = pairs
        .iter()
        .filter(|p| p.similarity.rank() <= slight)
        .count();
    summary.ratio_slight_or_less = close as f64 / pairs.len() as f64;
    summary.mean_delta = pairs.iter().map(|p| p.d_max_abs).sum::<f64>() / pairs.len() as f64;

    // Strict `>` keeps the first pair on ties; a NaN distance outranks any number.
    let worst = pairs.iter().skip(1).fold(&pairs[0], |worst, p| {
        let worse = if worst.d_max_abs.is_nan() {
            false
        } else {
            p.d_max_abs.is_nan() || p.d_max_abs > worst.d_max_abs
        };
        if worse {
            p
        } else {
            worst
        }
    });

    summary.max_delta = Some(worst.d_max_abs);
    summary.global_same = worst.d_max_abs <= policy::GLOBAL_MAX_DELTA
        && summary.ratio_slight_or_less >= policy::GLOBAL_MIN_RATIO;
    summary.worst_pair = Some(worst.clone());
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ok(name: &str, lufs: f64, tp: f64, lra: f64) -> MeasurementRecord {
        MeasurementRecord {
            file_name: name.to_string(),
            ext: "wav".to_string(),
            size_bytes: 1024,
            path: format!("/music/{}", name),
            lufs_i: Some(lufs),
            lufs_m: None,
            lufs_s: None,
            true_peak_dbtp: Some(tp),
            lra: Some(lra),
            peak_dbfs: None,
            rms_dbfs: None,
            error: None,
        }
    }

    fn failed(name: &str) -> MeasurementRecord {
        MeasurementRecord::failed(name, "mp3", 0, format!("/music/{}", name), "decode error")
    }

    #[test]
    fn test_all_failed_is_an_error() {
        let err = build(&[failed("a.mp3"), failed("b.mp3")]).unwrap_err();
        assert_eq!(err, ReportError::NoUsableData { total: 2 });
        assert!(build(&[]).is_err());
    }

    #[test]
    fn test_partial_triple_counts_as_failed() {
        let mut half = ok("half.wav", -14.0, -1.0, 6.0);
        half.lra = None;
        let report = build(&[half, ok("b.wav", -14.0, -1.0, 6.0)]).unwrap();
        assert_eq!(report.files_ok.len(), 1);
        assert_eq!(report.files_err.len(), 1);
        assert!(report.files_enriched[0].lufs_dev.is_none());
        assert!(report.files_enriched[0].lufs_i.is_none());
    }

    #[test]
    fn test_deviations_and_z_scores() {
        let report = build(&[
            ok("a.wav", -10.0, -1.0, 5.0),
            ok("b.wav", -12.0, -1.0, 5.0),
            ok("c.wav", -20.0, -1.0, 5.0),
        ])
        .unwrap();
        let lufs = report.stats.lufs_i;
        assert_eq!(lufs.mean, Some(-14.0));
        assert_eq!(lufs.median, Some(-12.0));

        let dev = report.files_enriched[0].lufs_dev.unwrap();
        assert!((dev.delta_mean - 4.0).abs() < 1e-12);
        assert!((dev.delta_median - 2.0).abs() < 1e-12);
        assert!((dev.z - 4.0 / lufs.std.unwrap()).abs() < 1e-12);

        // Identical true peaks: std is zero, z must be floored to 0.
        let tp = report.files_enriched[2].tp_dev.unwrap();
        assert_eq!(tp.z, 0.0);
        assert_eq!(tp.delta_mean, 0.0);
    }

    #[test]
    fn test_enriched_keeps_input_order() {
        let report = build(&[
            ok("z.wav", -14.0, -1.0, 6.0),
            failed("m.mp3"),
            ok("a.wav", -15.0, -1.0, 6.0),
        ])
        .unwrap();
        let names: Vec<&str> = report
            .files_enriched
            .iter()
            .map(|f| f.file_name.as_str())
            .collect();
        assert_eq!(names, ["z.wav", "m.mp3", "a.wav"]);
        assert_eq!(report.metrics.len(), 3);
    }

    #[test]
    fn test_optional_metrics_use_their_own_subset() {
        let mut a = ok("a.wav", -14.0, -1.0, 6.0);
        a.peak_dbfs = Some(-0.5);
        let mut b = ok("b.wav", -14.0, -1.0, 6.0);
        b.peak_dbfs = Some(-1.5);
        b.rms_dbfs = Some(-18.0);
        let c = ok("c.wav", -14.0, -1.0, 6.0);
        // Peak present on a failed record must not leak into the stats.
        let mut d = failed("d.mp3");
        d.peak_dbfs = Some(10.0);

        let report = build(&[a, b, c, d]).unwrap();
        assert_eq!(report.stats.peak_dbfs.mean, Some(-1.0));
        assert_eq!(report.stats.rms_dbfs.mean, Some(-18.0));
        assert_eq!(report.stats.rms_dbfs.std, Some(0.0));
        assert!(report.files_enriched[3].peak_dbfs.is_none());
    }

    #[test]
    fn test_empty_optional_subset_is_all_none() {
        let report = build(&[ok("a.wav", -14.0, -1.0, 6.0), ok("b.wav", -16.0, -1.0, 6.0)]).unwrap();
        assert_eq!(report.stats.peak_dbfs, MetricStats::default());
        assert_eq!(report.stats.rms_dbfs, MetricStats::default());
    }

    #[test]
    fn test_pair_order_and_direction() {
        let report = build(&[
            ok("f1", -14.0, -1.0, 6.0),
            failed("bad"),
            ok("f2", -15.0, -2.0, 6.0),
            ok("f3", -10.0, -0.5, 6.0),
        ])
        .unwrap();
        let order: Vec<(&str, &str)> = report
            .pairs
            .iter()
            .map(|p| (p.a_file.as_str(), p.b_file.as_str()))
            .collect();
        assert_eq!(order, [("f1", "f2"), ("f1", "f3"), ("f2", "f3")]);

        let p = &report.pairs[0];
        assert_eq!(p.d_lufs, -1.0);
        assert_eq!(p.d_tp, -1.0);
        assert_eq!(p.d_max_abs, 1.0);
        assert_eq!(p.similarity, Similarity::Slight);
    }

    #[test]
    fn test_worst_pair_first_wins_ties() {
        // (a,b) and (a,c) both have dMaxAbs 2.0; (b,c) is 0.
        let report = build(&[
            ok("a", -14.0, -1.0, 6.0),
            ok("b", -12.0, -1.0, 6.0),
            ok("c", -12.0, -1.0, 6.0),
        ])
        .unwrap();
        let worst = report.summary.worst_pair.unwrap();
        assert_eq!((worst.a_file.as_str(), worst.b_file.as_str()), ("a", "b"));
        assert_eq!(report.summary.max_delta, Some(2.0));
    }

    #[test]
    fn test_nan_loudness_is_never_same() {
        let report = build(&[ok("a", f64::NAN, -1.0, 6.0), ok("b", -14.0, -1.0, 6.0)]).unwrap();
        let pair = &report.pairs[0];
        assert!(pair.d_max_abs.is_nan());
        assert_eq!(pair.similarity, Similarity::Extreme);
        assert_eq!(report.summary.ratio_slight_or_less, 0.0);
        assert!(!report.summary.global_same);
    }

    #[test]
    fn test_nan_pair_is_worst() {
        let mut records: Vec<MeasurementRecord> = (0..4)
            .map(|i| ok(&format!("f{}", i), -14.0 - 0.01 * i as f64, -1.0, 6.0))
            .collect();
        records.push(ok("n", -14.0, f64::NAN, 6.0));
        let report = build(&[records[0].clone(), records[4].clone()]).unwrap();
        assert!(report.summary.worst_pair.unwrap().d_max_abs.is_nan());

        // NaN pair first in enumeration order, followed by close numeric pairs.
        records.swap(0, 4);
        let report = build(&records).unwrap();
        let worst = report.summary.worst_pair.unwrap();
        assert_eq!(worst.a_file, "n");
        assert!(!report.summary.global_same);

        // NaN found later in enumeration order still wins over a numeric worst.
        let report = build(&[
            ok("x", -14.0, -1.0, 6.0),
            ok("y", -20.0, -1.0, 6.0),
            ok("z", f64::NAN, -1.0, 6.0),
        ])
        .unwrap();
        assert!(report.summary.worst_pair.unwrap().d_max_abs.is_nan());
        assert!(report.summary.max_delta.unwrap().is_nan());
    }

    #[test]
    fn test_ratio_includes_slight() {
        // One slight pair (1.0 dB): ratio is 1.0 and max 1.0 <= 1.5.
        let report = build(&[ok("a", -14.0, -1.0, 6.0), ok("b", -15.0, -1.0, 6.0)]).unwrap();
        assert_eq!(report.pairs[0].similarity, Similarity::Slight);
        assert_eq!(report.summary.ratio_slight_or_less, 1.0);
        assert!(report.summary.global_same);
    }

    #[test]
    fn test_verdict_requires_both_conditions() {
        // Worst pair exactly 1.5 dB is moderate: ratio 2/3 < 0.8 so not same.
        let report = build(&[
            ok("a", -14.0, -1.0, 6.0),
            ok("b", -14.0, -1.0, 6.0),
            ok("c", -15.5, -1.0, 6.0),
        ])
        .unwrap();
        assert_eq!(report.summary.max_delta, Some(1.5));
        assert!((report.summary.ratio_slight_or_less - 1.0 / 3.0).abs() < 1e-12);
        assert!(!report.summary.global_same);

        // Every pair close but one far pair over the max delta.
        let mut files: Vec<MeasurementRecord> = (0..10)
            .map(|i| ok(&format!("f{}", i), -14.0, -1.0, 6.0))
            .collect();
        files.push(ok("loud", -12.0, -1.0, 6.0));
        let report = build(&files).unwrap();
        assert!(report.summary.ratio_slight_or_less >= policy::GLOBAL_MIN_RATIO);
        assert!(!report.summary.global_same);
    }

    #[test]
    fn test_mean_delta() {
        let report = build(&[
            ok("a", -14.0, -1.0, 6.0),
            ok("b", -14.2, -1.0, 6.0),
            ok("c", -14.6, -1.0, 6.0),
        ])
        .unwrap();
        let expected = (0.2 + 0.6 + 0.4) / 3.0;
        assert!((report.summary.mean_delta - expected).abs() < 1e-9);
    }

    #[test]
    fn test_single_usable_file_is_same() {
        let report = build(&[ok("only", -14.0, -1.0, 6.0)]).unwrap();
        assert!(report.pairs.is_empty());
        assert!(report.summary.global_same);
        assert_eq!(report.summary.ratio_slight_or_less, 1.0);
        assert_eq!(report.summary.mean_delta, 0.0);
        assert!(report.summary.worst_pair.is_none());
        assert!(report.summary.max_delta.is_none());
        assert_eq!(report.stats.lufs_i.std, Some(0.0));
        assert_eq!(report.files_enriched[0].lufs_dev.unwrap().z, 0.0);
    }

    proptest! {
        #[test]
        fn prop_pair_count(lufs in prop::collection::vec(-40.0f64..0.0, 1..12)) {
            let files: Vec<MeasurementRecord> = lufs
                .iter()
                .enumerate()
                .map(|(i, &l)| ok(&format!("f{}", i), l, -1.0, 6.0))
                .collect();
            let n = files.len();
            let report = build(&files).unwrap();
            prop_assert_eq!(report.pairs.len(), n * (n - 1) / 2);
            prop_assert_eq!(report.summary.pairs, report.pairs.len());
        }

        #[test]
        fn prop_build_is_idempotent(
            values in prop::collection::vec((-40.0f64..0.0, -10.0f64..1.0, 0.0f64..20.0, any::<bool>()), 1..10)
        ) {
            let files: Vec<MeasurementRecord> = values
                .iter()
                .enumerate()
                .map(|(i, &(l, tp, lra, good))| {
                    if good {
                        ok(&format!("f{}", i), l, tp, lra)
                    } else {
                        failed(&format!("f{}", i))
                    }
                })
                .collect();
            let first = build(&files);
            let second = build(&files);
            prop_assert_eq!(first.is_err(), !values.iter().any(|v| v.3));
            prop_assert_eq!(first, second);
        }
    }
}
