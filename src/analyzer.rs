use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use regex::Regex;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::models::MeasurementRecord;
use crate::volume;

const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp3", "mp4", "m4a", "wav", "flac", "ogg", "mkv", "mov", "m4v",
];

/// Containers that may carry a video stream; ffmpeg is told to ignore it.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "m4v", "mov", "mkv"];

static JSON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*?\}").expect("valid regex"));
static MAX_VOLUME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"max_volume:\s*([-\d.]+)\s*dB").expect("valid regex"));
static MEAN_VOLUME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"mean_volume:\s*([-\d.]+)\s*dB").expect("valid regex"));
static SUMMARY_I: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"I:\s*([-\d.]+)\s*LUFS").expect("valid regex"));
static SUMMARY_LRA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"LRA:\s*([\d.]+)\s*LU").expect("valid regex"));
static SUMMARY_PEAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Peak:\s*([-\d.]+)\s*dBFS").expect("valid regex"));
static FRAME_M: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\sM:\s*(-inf|[-\d.]+)").expect("valid regex"));
static FRAME_S: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\sS:\s*(-inf|[-\d.]+)").expect("valid regex"));

/// How loudness metrics are extracted from ffmpeg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Strategy {
    /// `loudnorm` pass, then a `volumedetect` pass.
    #[default]
    TwoPass,
    /// One `ebur128` + `volumedetect` invocation through `asplit`.
    SinglePass,
    /// `loudnorm` pass; sample peak and RMS decoded in-process.
    NativeVolume,
}

fn lower_ext(path: &Path) -> String {
    path.extension()
        .and_then(OsStr::to_str)
        .map(str::to_lowercase)
        .unwrap_or_default()
}

/// Check if a path has a supported media extension.
fn is_supported_file(path: &Path) -> bool {
    SUPPORTED_EXTENSIONS.contains(&lower_ext(path).as_str())
}

fn is_video_file(path: &Path) -> bool {
    VIDEO_EXTENSIONS.contains(&lower_ext(path).as_str())
}

/// Recursively collect supported media files under `root`, sorted by path.
pub fn scan_media_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_supported_file(p))
        .collect();
    files.sort();
    files
}

/// Handle on the ffmpeg executable.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    program: PathBuf,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl Ffmpeg {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Fail unless `ffmpeg -version` runs successfully.
    pub fn check(&self) -> Result<()> {
        let status = Command::new(&self.program)
            .arg("-version")
            .output()
            .with_context(|| format!("ffmpeg not found ({})", self.program.display()))?
            .status;
        if !status.success() {
            bail!("ffmpeg not usable ({}): {}", self.program.display(), status);
        }
        Ok(())
    }

    /// Run ffmpeg on `input` and return stdout followed by stderr.
    /// ffmpeg prints filter reports on stderr and exits non-zero on
    /// decode failures, so the exit status is only logged.
    fn run(&self, input: &Path, filter_args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-hide_banner", "-nostats", "-i"]).arg(input);
        cmd.args(filter_args);
        debug!(?cmd, "running ffmpeg");

        let out = cmd
            .output()
            .with_context(|| format!("Failed to run {}", self.program.display()))?;
        if !out.status.success() {
            warn!(path = %input.display(), status = %out.status, "ffmpeg exited with failure");
        }
        let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&out.stderr));
        Ok(text)
    }

    fn run_filter(&self, input: &Path, filter: &str) -> Result<String> {
        let mut args = Vec::with_capacity(6);
        if is_video_file(input) {
            args.push("-vn");
        }
        args.extend(["-af", filter, "-f", "null", "-"]);
        self.run(input, &args)
    }
}

/// Integrated loudness, true peak and loudness range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Loudness {
    pub lufs_i: f64,
    pub true_peak_dbtp: f64,
    pub lra: f64,
}

/// Sample peak and mean (RMS) level, each independently optional.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Volume {
    pub peak_dbfs: Option<f64>,
    pub rms_dbfs: Option<f64>,
}

/// Result of parsing an `ebur128` run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ebur128 {
    pub loudness: Loudness,
    pub max_momentary: Option<f64>,
    pub max_short_term: Option<f64>,
}

fn capture_f64(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

/// loudnorm writes its numbers as JSON strings.
fn json_f64(block: &serde_json::Value, key: &str) -> Result<f64> {
    let value = block
        .get(key)
        .with_context(|| format!("loudnorm output has no \"{}\"", key))?;
    let parsed: f64 = match value {
        serde_json::Value::String(s) => s
            .trim()
            .parse()
            .with_context(|| format!("loudnorm \"{}\" is not a number: {}", key, s))?,
        serde_json::Value::Number(n) => n
            .as_f64()
            .with_context(|| format!("loudnorm \"{}\" out of range", key))?,
        other => bail!("loudnorm \"{}\" has unexpected value {}", key, other),
    };
    // Silence measures as -inf; there is no loudness to compare.
    if !parsed.is_finite() {
        bail!("loudnorm \"{}\" is not finite: {}", key, parsed);
    }
    Ok(parsed)
}

/// Parse the last JSON block printed by `loudnorm=print_format=json`.
pub fn parse_loudnorm(output: &str, path: &Path) -> Result<Loudness> {
    let block = JSON_BLOCK
        .find_iter(output)
        .last()
        .with_context(|| format!("no loudnorm JSON for: {}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(block.as_str())
        .with_context(|| format!("malformed loudnorm JSON for: {}", path.display()))?;
    Ok(Loudness {
        lufs_i: json_f64(&json, "input_i")?,
        true_peak_dbtp: json_f64(&json, "input_tp")?,
        lra: json_f64(&json, "input_lra")?,
    })
}

/// Parse `max_volume` / `mean_volume` lines printed by `volumedetect`.
pub fn parse_volumedetect(output: &str) -> Volume {
    Volume {
        peak_dbfs: capture_f64(&MAX_VOLUME, output),
        rms_dbfs: capture_f64(&MEAN_VOLUME, output),
    }
}

/// Largest finite per-frame value captured by `re`.
fn max_frame_value(re: &Regex, output: &str) -> Option<f64> {
    re.captures_iter(output)
        .filter_map(|c| c.get(1)?.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .reduce(f64::max)
}

/// Parse the `Summary:` section and per-frame lines of `ebur128=peak=true`.
pub fn parse_ebur128(output: &str, path: &Path) -> Result<Ebur128> {
    let summary = output
        .split_once("Summary:")
        .map(|(_, s)| s)
        .unwrap_or_default();

    let lufs_i = capture_f64(&SUMMARY_I, summary)
        .with_context(|| format!("no ebur128 output for: {}", path.display()))?;
    let lra = capture_f64(&SUMMARY_LRA, summary)
        .with_context(|| format!("no loudness range in ebur128 output for: {}", path.display()))?;
    let true_peak_dbtp = capture_f64(&SUMMARY_PEAK, summary)
        .with_context(|| format!("no true peak in ebur128 output for: {}", path.display()))?;

    let (frames, _) = output.split_once("Summary:").unwrap_or((output, ""));
    Ok(Ebur128 {
        loudness: Loudness {
            lufs_i,
            true_peak_dbtp,
            lra,
        },
        max_momentary: max_frame_value(&FRAME_M, frames),
        max_short_term: max_frame_value(&FRAME_S, frames),
    })
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Measure one file, returning an error instead of a failed record.
pub fn analyze_file(ffmpeg: &Ffmpeg, path: &Path, strategy: Strategy) -> Result<MeasurementRecord> {
    let size_bytes = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .len();

    let (loudness, volume, momentary, short_term) = match strategy {
        Strategy::TwoPass => {
            let loud = parse_loudnorm(&ffmpeg.run_filter(path, "loudnorm=print_format=json")?, path)?;
            let vol = parse_volumedetect(&ffmpeg.run_filter(path, "volumedetect")?);
            (loud, vol, None, None)
        }
        Strategy::SinglePass => {
            let output = ffmpeg.run(
                path,
                &[
                    "-filter_complex",
                    "[0:a]asplit=2[a1][a2];[a1]ebur128=peak=true[out1];[a2]volumedetect[out2]",
                    "-map", "[out1]", "-f", "null", "-",
                    "-map", "[out2]", "-f", "null", "-",
                ],
            )?;
            let ebu = parse_ebur128(&output, path)?;
            (ebu.loudness, parse_volumedetect(&output), ebu.max_momentary, ebu.max_short_term)
        }
        Strategy::NativeVolume => {
            let loud = parse_loudnorm(&ffmpeg.run_filter(path, "loudnorm=print_format=json")?, path)?;
            let vol = match volume::measure_file(path) {
                Ok(levels) => Volume {
                    peak_dbfs: levels.peak_dbfs(),
                    rms_dbfs: levels.rms_dbfs(),
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "native volume measurement failed");
                    Volume::default()
                }
            };
            (loud, vol, None, None)
        }
    };

    Ok(MeasurementRecord {
        file_name: file_name_of(path),
        ext: lower_ext(path),
        size_bytes,
        path: path.display().to_string(),
        lufs_i: Some(loudness.lufs_i),
        lufs_m: momentary,
        lufs_s: short_term,
        true_peak_dbtp: Some(loudness.true_peak_dbtp),
        lra: Some(loudness.lra),
        peak_dbfs: volume.peak_dbfs,
        rms_dbfs: volume.rms_dbfs,
        error: None,
    })
}

/// Measure one file. Failures become a failed record carrying the message.
pub fn measure(ffmpeg: &Ffmpeg, path: &Path, strategy: Strategy) -> MeasurementRecord {
    analyze_file(ffmpeg, path, strategy).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "measurement failed");
        MeasurementRecord::failed(
            file_name_of(path),
            lower_ext(path),
            std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
            path.display().to_string(),
            format!("{:#}", e),
        )
    })
}

/// Return the default number of parallel jobs (number of CPU cores).
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Measure `files` with `jobs` worker threads.
///
/// Records come back in the order of `files`. `on_done` is called from the
/// worker threads as each file finishes, with the completion count.
pub fn analyze_files(
    ffmpeg: &Ffmpeg,
    files: &[PathBuf],
    strategy: Strategy,
    jobs: usize,
    on_done: impl Fn(usize, &MeasurementRecord) + Sync,
) -> Vec<MeasurementRecord> {
    let jobs = jobs.max(1).min(files.len().max(1));
    let next_index = AtomicUsize::new(0);
    let completed = AtomicUsize::new(0);

    let mut indexed: Vec<(usize, MeasurementRecord)> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..jobs)
            .map(|_| {
                scope.spawn(|| {
                    let mut results = Vec::new();
                    loop {
                        let idx = next_index.fetch_add(1, Ordering::SeqCst);
                        if idx >= files.len() {
                            break;
                        }
                        let record = measure(ffmpeg, &files[idx], strategy);
                        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                        on_done(done, &record);
                        results.push((idx, record));
                    }
                    results
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|h| match h.join() {
                Ok(results) => results,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    });

    indexed.sort_by_key(|(idx, _)| *idx);
    indexed.into_iter().map(|(_, record)| record).collect()
}
