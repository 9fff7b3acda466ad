//! CSV rendering of a report: one `File` row per enriched file followed by
//! one `Pair` row per comparison, under a single shared header.

use crate::models::{Deviation, EnrichedFile, Pair, Report};

pub const HEADER: [&str; 25] = [
    "Section",
    "FileName",
    "Ext",
    "SizeBytes",
    "LUFS_I",
    "TruePeak_dBTP",
    "LRA",
    "Peak_dBFS",
    "RMS_dBFS",
    "LUFS_DeltaMean",
    "LUFS_DeltaMedian",
    "LUFS_Z",
    "TP_DeltaMean",
    "TP_DeltaMedian",
    "TP_Z",
    "LRA_DeltaMean",
    "LRA_DeltaMedian",
    "LRA_Z",
    "A_File",
    "B_File",
    "dLUFS",
    "dTP",
    "dMaxAbs",
    "Similarity",
    "Error",
];

/// Escape CSV field (handle commas, quotes, newlines)
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn num(v: Option<f64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

fn deviation_fields(dev: Option<Deviation>) -> [String; 3] {
    [
        num(dev.map(|d| d.delta_mean)),
        num(dev.map(|d| d.delta_median)),
        num(dev.map(|d| d.z)),
    ]
}

fn file_row(f: &EnrichedFile) -> Vec<String> {
    let mut row = vec![
        "File".to_string(),
        escape_field(&f.file_name),
        escape_field(&f.ext),
        f.size_bytes.to_string(),
        num(f.lufs_i),
        num(f.true_peak_dbtp),
        num(f.lra),
        num(f.peak_dbfs),
        num(f.rms_dbfs),
    ];
    row.extend(deviation_fields(f.lufs_dev));
    row.extend(deviation_fields(f.tp_dev));
    row.extend(deviation_fields(f.lra_dev));
    row.extend(std::iter::repeat(String::new()).take(6));
    row.push(f.error.as_deref().map(escape_field).unwrap_or_default());
    row
}

fn pair_row(p: &Pair) -> Vec<String> {
    let mut row = vec!["Pair".to_string()];
    row.extend(std::iter::repeat(String::new()).take(17));
    row.extend([
        escape_field(&p.a_file),
        escape_field(&p.b_file),
        p.d_lufs.to_string(),
        p.d_tp.to_string(),
        p.d_max_abs.to_string(),
        p.similarity.to_string(),
        String::new(),
    ]);
    row
}

/// Render the whole report as CSV text.
pub fn format_csv(report: &Report) -> String {
    let mut output = HEADER.join(",");
    output.push('\n');
    for f in &report.files_enriched {
        output.push_str(&file_row(f).join(","));
        output.push('\n');
    }
    for p in &report.pairs {
        output.push_str(&pair_row(p).join(","));
        output.push('\n');
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MeasurementRecord;
    use crate::report;

    fn ok(name: &str, lufs: f64, tp: f64) -> MeasurementRecord {
        MeasurementRecord {
            file_name: name.to_string(),
            ext: "flac".to_string(),
            size_bytes: 2048,
            path: name.to_string(),
            lufs_i: Some(lufs),
            lufs_m: None,
            lufs_s: None,
            true_peak_dbtp: Some(tp),
            lra: Some(5.0),
            peak_dbfs: Some(-1.0),
            rms_dbfs: None,
            error: None,
        }
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_rows_share_header_width() {
        let report = report::build(&[
            ok("01.flac", -14.0, -1.0),
            ok("02, live.flac", -16.0, -2.0),
            MeasurementRecord::failed("03.mp3", "mp3", 9, "03.mp3", "decode error"),
        ])
        .unwrap();
        let csv = format_csv(&report);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 1 + 3 + 1);
        assert_eq!(lines[0], HEADER.join(","));
        for row in [file_row(&report.files_enriched[0]), pair_row(&report.pairs[0])] {
            assert_eq!(row.len(), HEADER.len());
        }
        assert_eq!(file_row(&report.files_enriched[2]).len(), HEADER.len());
    }

    #[test]
    fn test_file_and_pair_rows() {
        let report = report::build(&[
            ok("01.flac", -14.0, -1.0),
            ok("02.flac", -16.0, -2.0),
            MeasurementRecord::failed("03.mp3", "mp3", 9, "03.mp3", "decode error"),
        ])
        .unwrap();
        let csv = format_csv(&report);
        let lines: Vec<&str> = csv.lines().collect();

        assert!(lines[1].starts_with("File,01.flac,flac,2048,-14,-1,5,-1,,1,"));
        assert_eq!(lines[3], format!("File,03.mp3,mp3,9{}decode error", ",".repeat(21)));
        assert_eq!(lines[4], format!("Pair{}01.flac,02.flac,-2,-1,2,moderate,", ",".repeat(18)));
    }
}
