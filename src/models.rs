use serde::{Deserialize, Serialize};

use crate::classify::Similarity;

/// One file's raw measurement, as produced by the analyzer.
///
/// A record is usable when the integrated loudness, true peak and loudness
/// range are all present. Sample peak and RMS are independent of that triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    #[serde(rename = "FileName")]
    pub file_name: String,
    #[serde(rename = "Ext")]
    pub ext: String,
    #[serde(rename = "SizeBytes")]
    pub size_bytes: u64,
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "LUFS_I")]
    pub lufs_i: Option<f64>,
    /// Max momentary loudness, only reported by the single-pass strategy.
    #[serde(rename = "LUFS_M", default, skip_serializing_if = "Option::is_none")]
    pub lufs_m: Option<f64>,
    /// Max short-term loudness, only reported by the single-pass strategy.
    #[serde(rename = "LUFS_S", default, skip_serializing_if = "Option::is_none")]
    pub lufs_s: Option<f64>,
    #[serde(rename = "TruePeak_dBTP")]
    pub true_peak_dbtp: Option<f64>,
    #[serde(rename = "LRA")]
    pub lra: Option<f64>,
    #[serde(rename = "Peak_dBFS")]
    pub peak_dbfs: Option<f64>,
    #[serde(rename = "RMS_dBFS")]
    pub rms_dbfs: Option<f64>,
    #[serde(rename = "Error")]
    pub error: Option<String>,
}

impl MeasurementRecord {
    /// A record with every metric missing and `error` set.
    pub fn failed(
        file_name: impl Into<String>,
        ext: impl Into<String>,
        size_bytes: u64,
        path: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            ext: ext.into(),
            size_bytes,
            path: path.into(),
            lufs_i: None,
            lufs_m: None,
            lufs_s: None,
            true_peak_dbtp: None,
            lra: None,
            peak_dbfs: None,
            rms_dbfs: None,
            error: Some(error.into()),
        }
    }

    /// `(LUFS_I, TruePeak_dBTP, LRA)` when all three are present.
    pub fn primary(&self) -> Option<(f64, f64, f64)> {
        Some((self.lufs_i?, self.true_peak_dbtp?, self.lra?))
    }

    pub fn is_usable(&self) -> bool {
        self.primary().is_some()
    }
}

/// Names of the metrics the report aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    LufsI,
    TruePeak,
    Lra,
    PeakDbfs,
    RmsDbfs,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::LufsI,
        Metric::TruePeak,
        Metric::Lra,
        Metric::PeakDbfs,
        Metric::RmsDbfs,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Metric::LufsI => "LUFS_I",
            Metric::TruePeak => "TruePeak_dBTP",
            Metric::Lra => "LRA",
            Metric::PeakDbfs => "Peak_dBFS",
            Metric::RmsDbfs => "RMS_dBFS",
        }
    }
}

/// Population statistics of one metric. All `None` when no file reports it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportStats {
    #[serde(rename = "LUFS_I")]
    pub lufs_i: MetricStats,
    #[serde(rename = "TruePeak_dBTP")]
    pub true_peak_dbtp: MetricStats,
    #[serde(rename = "LRA")]
    pub lra: MetricStats,
    #[serde(rename = "Peak_dBFS")]
    pub peak_dbfs: MetricStats,
    #[serde(rename = "RMS_dBFS")]
    pub rms_dbfs: MetricStats,
}

impl ReportStats {
    pub fn get(&self, metric: Metric) -> &MetricStats {
        match metric {
            Metric::LufsI => &self.lufs_i,
            Metric::TruePeak => &self.true_peak_dbtp,
            Metric::Lra => &self.lra,
            Metric::PeakDbfs => &self.peak_dbfs,
            Metric::RmsDbfs => &self.rms_dbfs,
        }
    }
}

/// Distance of one value from its population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Deviation {
    pub delta_mean: f64,
    pub delta_median: f64,
    pub z: f64,
}

/// A measurement plus its deviations. Failed files carry only identity and
/// the analyzer's error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedFile {
    #[serde(rename = "FileName")]
    pub file_name: String,
    #[serde(rename = "Ext")]
    pub ext: String,
    #[serde(rename = "SizeBytes")]
    pub size_bytes: u64,
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "LUFS_I")]
    pub lufs_i: Option<f64>,
    #[serde(rename = "LUFS_M", default, skip_serializing_if = "Option::is_none")]
    pub lufs_m: Option<f64>,
    #[serde(rename = "LUFS_S", default, skip_serializing_if = "Option::is_none")]
    pub lufs_s: Option<f64>,
    #[serde(rename = "TruePeak_dBTP")]
    pub true_peak_dbtp: Option<f64>,
    #[serde(rename = "LRA")]
    pub lra: Option<f64>,
    #[serde(rename = "Peak_dBFS")]
    pub peak_dbfs: Option<f64>,
    #[serde(rename = "RMS_dBFS")]
    pub rms_dbfs: Option<f64>,
    #[serde(rename = "LUFS_Dev")]
    pub lufs_dev: Option<Deviation>,
    #[serde(rename = "TP_Dev")]
    pub tp_dev: Option<Deviation>,
    #[serde(rename = "LRA_Dev")]
    pub lra_dev: Option<Deviation>,
    #[serde(rename = "Error")]
    pub error: Option<String>,
}

impl EnrichedFile {
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.lufs_dev.is_some()
    }
}

/// One unordered combination of two usable files. Deltas are `B - A`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pair {
    #[serde(rename = "A_File")]
    pub a_file: String,
    #[serde(rename = "B_File")]
    pub b_file: String,
    #[serde(rename = "A_Ext")]
    pub a_ext: String,
    #[serde(rename = "B_Ext")]
    pub b_ext: String,
    #[serde(rename = "A_LUFS_I")]
    pub a_lufs_i: f64,
    #[serde(rename = "B_LUFS_I")]
    pub b_lufs_i: f64,
    #[serde(rename = "dLUFS")]
    pub d_lufs: f64,
    #[serde(rename = "A_TP_dBTP")]
    pub a_tp_dbtp: f64,
    #[serde(rename = "B_TP_dBTP")]
    pub b_tp_dbtp: f64,
    #[serde(rename = "dTP")]
    pub d_tp: f64,
    #[serde(rename = "dMaxAbs")]
    pub d_max_abs: f64,
    #[serde(rename = "Similarity")]
    pub similarity: Similarity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReportSummary {
    pub files_total: usize,
    pub files_ok: usize,
    pub files_err: usize,
    pub pairs: usize,
    pub ratio_slight_or_less: f64,
    pub mean_delta: f64,
    pub max_delta: Option<f64>,
    pub worst_pair: Option<Pair>,
    pub global_same: bool,
}

/// Everything a renderer needs. Built once, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Report {
    pub metrics: Vec<MeasurementRecord>,
    pub files_ok: Vec<MeasurementRecord>,
    pub files_err: Vec<MeasurementRecord>,
    pub stats: ReportStats,
    pub files_enriched: Vec<EnrichedFile>,
    pub pairs: Vec<Pair>,
    pub summary: ReportSummary,
}
