use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing::info;

use crate::csv_output;
use crate::html_output;
use crate::models::Report;

const FILE_STEM: &str = "sound_report";

/// Paths of the files written for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub html: PathBuf,
    pub csv: PathBuf,
}

impl OutputPaths {
    /// `sound_report_<dd-mm-yy_HH-MM>.{html,csv}` inside `dir`.
    pub fn for_time(dir: &Path, at: &DateTime<Local>) -> Self {
        let stamp = at.format("%d-%m-%y_%H-%M");
        Self {
            html: dir.join(format!("{}_{}.html", FILE_STEM, stamp)),
            csv: dir.join(format!("{}_{}.csv", FILE_STEM, stamp)),
        }
    }
}

/// Write the CSV and HTML renderings of `report` into `out_dir`.
pub fn write_outputs(folder: &Path, out_dir: &Path, report: &Report) -> Result<OutputPaths> {
    let now = Local::now();
    let paths = OutputPaths::for_time(out_dir, &now);

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    std::fs::write(&paths.csv, csv_output::format_csv(report))
        .with_context(|| format!("Failed to write {}", paths.csv.display()))?;

    let generated = now.format("%Y-%m-%d %H:%M:%S").to_string();
    let html = html_output::format_html(report, folder, &generated, &paths.html);
    std::fs::write(&paths.html, html)
        .with_context(|| format!("Failed to write {}", paths.html.display()))?;

    info!(html = %paths.html.display(), csv = %paths.csv.display(), "report written");
    Ok(paths)
}
