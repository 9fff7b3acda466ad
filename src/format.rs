use crate::models::{Metric, Report};

fn opt(v: Option<f64>, unit: &str) -> String {
    match v {
        Some(v) => format!("{:>7.2} {}", v, unit),
        None => format!("{:>7} {}", "-", unit),
    }
}

/// Format a report as a terminal table: one row per file, then the verdict.
pub fn format_table(report: &Report) -> String {
    let separator = "\u{2500}".repeat(78);
    let mut output = String::new();

    output.push_str(&format!(
        "{:>12} {:>12} {:>9} {:>12}  {}\n",
        "LUFS", "TruePeak", "LRA", "\u{394} median", "File"
    ));
    output.push_str(&separator);
    output.push('\n');

    for file in &report.files_enriched {
        match &file.error {
            Some(err) if !file.is_ok() => {
                output.push_str(&format!("{:>50}  {} ({})\n", "error", file.file_name, err));
            }
            _ => {
                output.push_str(&format!(
                    "{} {} {} {}  {}\n",
                    opt(file.lufs_i, "LUFS"),
                    opt(file.true_peak_dbtp, "dBTP"),
                    opt(file.lra, "LU"),
                    opt(file.lufs_dev.map(|d| d.delta_median), "LU"),
                    file.file_name,
                ));
            }
        }
    }

    output.push_str(&separator);
    output.push('\n');

    let medians: Vec<String> = Metric::ALL
        .iter()
        .filter_map(|&m| Some(format!("{} {:.2}", m.name(), report.stats.get(m).median?)))
        .collect();
    output.push_str(&format!("Median: {}\n", medians.join("   ")));

    let s = &report.summary;
    output.push_str(&format!(
        "Files: {} ({} ok, {} failed)   Pairs: {}\n",
        s.files_total, s.files_ok, s.files_err, s.pairs
    ));
    if let Some(wp) = &s.worst_pair {
        output.push_str(&format!(
            "Worst pair:       {} <-> {} (\u{394}max {:.2} dB, {})\n",
            wp.a_file, wp.b_file, wp.d_max_abs, wp.similarity
        ));
        output.push_str(&format!(
            "Mean \u{394}max:       {:.2} dB   At or below slight: {:.0}%\n",
            s.mean_delta,
            s.ratio_slight_or_less * 100.0
        ));
    }
    output.push_str(&format!(
        "Same overall level: {}",
        if s.global_same { "yes" } else { "no" }
    ));

    output
}

/// Format a report as pretty-printed JSON.
pub fn format_json(report: &Report) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
}
