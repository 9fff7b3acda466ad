//! Self-contained HTML report with embedded CSS and a small script that
//! recolours metric cells relative to the population (median, mean or z-score).

use std::fmt::Write;
use std::path::Path;

use crate::classify::Similarity;
use crate::models::{MeasurementRecord, Metric, Report};
use crate::policy;

/// Escape HTML special characters
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn format_num(v: f64) -> String {
    format!("{:.2}", v)
}

const DIM_CELL: &str = "<span class='metricbox dim'>&mdash;</span>";

fn metric_cell(metric: Metric, value: Option<f64>, clip_check: bool) -> String {
    match value {
        Some(v) => {
            let s = format_num(v);
            let clip = if clip_check && v >= 0.0 {
                " data-clipping='1'"
            } else {
                ""
            };
            format!(
                "<span class='metricbox' data-metric='{}' data-value='{}'{}>{}</span>",
                metric.name(),
                s,
                clip,
                s
            )
        }
        None => DIM_CELL.to_string(),
    }
}

fn header_help(label: &str, tip: &str) -> String {
    format!(
        "<span class='thhelp' data-tip='{}'>{} <span class='q'>?</span></span>",
        escape_html(tip),
        escape_html(label)
    )
}

/// Clickable column header; `num` right-aligns it over numeric cells.
fn sortable(label: &str, num: bool) -> String {
    format!(
        "<th class=\"{}sortable\">{} <span class=\"sort-ind\">&#8597;</span></th>",
        if num { "num " } else { "" },
        label
    )
}

fn scale_text() -> String {
    let b = policy::BANDS;
    format!(
        "identical &lt;{:.2} | negligible &lt;{:.2} | slight &lt;{:.2} | moderate &lt;{:.2} | \
         high &lt;{:.2} | extreme &ge;{:.2} (dB, on max(|&Delta;LUFS|, |&Delta;TruePeak|))",
        b[0], b[1], b[2], b[3], b[4], b[4]
    )
}

fn file_row(m: &MeasurementRecord) -> String {
    let size_mb = format!("{:.2}", m.size_bytes as f64 / (1024.0 * 1024.0));
    let (status, cells) = if m.is_usable() {
        (
            "<span class='tag identical'>OK</span>",
            [
                metric_cell(Metric::LufsI, m.lufs_i, false),
                metric_cell(Metric::TruePeak, m.true_peak_dbtp, true),
                metric_cell(Metric::Lra, m.lra, false),
                metric_cell(Metric::PeakDbfs, m.peak_dbfs, true),
                metric_cell(Metric::RmsDbfs, m.rms_dbfs, false),
            ],
        )
    } else {
        (
            "<span class='tag error'>Error</span>",
            std::array::from_fn(|_| DIM_CELL.to_string()),
        )
    };
    let error = m.error.as_deref().map(escape_html).unwrap_or_default();

    let mut row = String::from("<tr>\n");
    let _ = writeln!(row, "  <td>{}</td>", escape_html(&m.file_name));
    let _ = writeln!(row, "  <td>{}</td>", escape_html(&m.ext));
    let _ = writeln!(row, "  <td class='num'>{}</td>", size_mb);
    for cell in cells {
        let _ = writeln!(row, "  <td class='num'>{}</td>", cell);
    }
    let _ = writeln!(row, "  <td>{}</td>", status);
    let _ = writeln!(row, "  <td class='err'>{}</td>", error);
    row.push_str("</tr>");
    row
}

fn pair_rows(report: &Report) -> String {
    if report.pairs.is_empty() {
        return "<tr><td colspan='10' class='small'>Not enough measured files to form pairs.</td></tr>"
            .to_string();
    }
    let mut pairs: Vec<_> = report.pairs.iter().collect();
    pairs.sort_by(|a, b| b.d_max_abs.total_cmp(&a.d_max_abs));

    let mut out = String::new();
    for p in pairs {
        let _ = writeln!(
            out,
            "<tr><td>{}</td><td>{}</td>\
             <td class='num'>{}</td><td class='num'>{}</td><td class='num'>{}</td>\
             <td class='num'>{}</td><td class='num'>{}</td><td class='num'>{}</td>\
             <td class='num'>{}</td><td><span class='tag {}'>{}</span></td></tr>",
            escape_html(&p.a_file),
            escape_html(&p.b_file),
            format_num(p.a_lufs_i),
            format_num(p.b_lufs_i),
            format_num(p.d_lufs),
            format_num(p.a_tp_dbtp),
            format_num(p.b_tp_dbtp),
            format_num(p.d_tp),
            format_num(p.d_max_abs),
            p.similarity,
            p.similarity,
        );
    }
    out
}

fn histogram(report: &Report) -> String {
    Similarity::ALL
        .iter()
        .map(|cat| {
            let count = report.pairs.iter().filter(|p| p.similarity == *cat).count();
            format!(
                "<div class='badge'><span class='tag {}'>{}</span><span class='small'>{} pair(s)</span></div>",
                cat, cat, count
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

const STYLES: &str = r#"<style>
:root{
  --bg:#0b1020; --text:#e7ecff; --muted:#aab3d6; --border:rgba(255,255,255,.10); --accent:#7aa2ff;
  --identical:#1f8a3b; --negligible:#4aa334; --slight:#b38a00; --moderate:#d66a00; --high:#d13939; --extreme:#a31f1f; --error:#666;
}
*{box-sizing:border-box}
body{margin:0; font-family:Segoe UI, Arial, sans-serif; background:linear-gradient(180deg,var(--bg),#070b18); color:var(--text)}
.container{max-width:1280px; margin:0 auto; padding:22px}
.header{display:flex; gap:16px; align-items:flex-start; justify-content:space-between; margin-bottom:16px}
.h-title{font-size:20px; font-weight:700; margin:0}
.h-sub{color:var(--muted); margin-top:6px; line-height:1.35}
.kpis{display:grid; grid-template-columns:repeat(4,1fr); gap:10px; margin:16px 0}
.card{background:rgba(255,255,255,.04); border:1px solid var(--border); border-radius:14px; padding:12px 14px}
.kpi-title{color:var(--muted); font-size:12px; margin:0 0 6px 0}
.kpi-value{font-size:18px; font-weight:700; margin:0}
.section{margin-top:16px}
.section h2{font-size:14px; margin:0 0 10px 0; color:var(--muted); text-transform:uppercase}
.tablewrap{background:rgba(255,255,255,.03); border:1px solid var(--border); border-radius:14px; overflow:auto}
table{width:100%; border-collapse:collapse; font-size:12.5px; min-width:1050px}
thead th{position:sticky; top:0; background:rgba(10,15,30,.95); border-bottom:1px solid var(--border); padding:10px; text-align:left}
tbody td{border-top:1px solid rgba(255,255,255,.06); padding:9px 10px; vertical-align:top}
.num{font-variant-numeric:tabular-nums; text-align:right}
.err{max-width:520px; color:#ffb2b2}
.badge{display:inline-flex; align-items:center; gap:8px; padding:6px 10px; border-radius:999px; border:1px solid var(--border); font-weight:600; font-size:12px}
.tag{display:inline-block; padding:4px 10px; border-radius:999px; font-weight:700; color:#fff; font-size:12px}
.tag.identical{background:var(--identical)}
.tag.negligible{background:var(--negligible)}
.tag.slight{background:var(--slight)}
.tag.moderate{background:var(--moderate)}
.tag.high{background:var(--high)}
.tag.extreme{background:var(--extreme)}
.tag.error{background:var(--error)}
.small{color:var(--muted); font-size:12px}
select{background:#12193a; color:var(--text); border:1px solid var(--border); border-radius:10px; padding:8px 10px}
.metricbox{display:inline-block; min-width:88px; text-align:right; padding:5px 10px; border-radius:10px; border:1px solid rgba(255,255,255,.22); font-weight:700}
.metricbox.dim{opacity:.55; font-weight:600}
.metricbox.clip-warn{background:rgba(220,40,40,.38) !important; border-color:rgba(255,70,70,.92) !important; color:#ffaaaa !important}
th.sortable{cursor:pointer; user-select:none; white-space:nowrap}
th.sortable:hover{background:rgba(122,162,255,.12)}
.sort-ind{opacity:.35; font-size:11px; margin-left:4px}
th.sortable[data-sort="asc"] .sort-ind, th.sortable[data-sort="desc"] .sort-ind{opacity:1; color:var(--accent)}
.thhelp{cursor:help; border-bottom:1px dotted rgba(216,222,251,.55)}
.thhelp .q{font-size:11px; font-weight:800}
.footer{margin-top:18px; color:var(--muted); font-size:12px}
</style>"#;

const SCRIPT: &str = r#"(() => {
  function clamp(x, a, b){ return Math.min(b, Math.max(a, x)); }
  const GREEN = {r:46, g:204, b:113}, BLUE = {r:52, g:152, b:219}, RED = {r:231, g:76, b:60};
  function mix(a, b, t){
    return {r: Math.round(a.r + (b.r - a.r) * t), g: Math.round(a.g + (b.g - a.g) * t), b: Math.round(a.b + (b.b - a.b) * t)};
  }
  function rgba(c, alpha){ return 'rgba(' + c.r + ',' + c.g + ',' + c.b + ',' + alpha + ')'; }
  function ref(method, metric){
    const s = stats[metric];
    if (!s) return 0;
    const v = method === "median" ? s.median : s.mean;
    return v != null ? v : 0;
  }
  function scale(method, metric){
    if (method === "zscore") return 2.0;
    const std = (stats[metric] && stats[metric].std) || 0;
    return Math.max(2.0 * std, metric === "LRA" ? 2.0 : 1.0);
  }
  function delta(method, metric, value){
    const std = (stats[metric] && stats[metric].std) || 0;
    if (method === "zscore") return std <= STD_FLOOR ? 0.0 : (value - ref(method, metric)) / std;
    return value - ref(method, metric);
  }
  function apply(){
    const method = document.getElementById("refMode").value;
    document.querySelectorAll(".metricbox[data-metric][data-value]").forEach(el => {
      const metric = el.getAttribute("data-metric");
      const value = parseFloat(el.getAttribute("data-value"));
      const d = delta(method, metric, value);
      const t = clamp(d / scale(method, metric), -1, 1);
      const u = Math.pow(Math.abs(t), 0.75);
      const c = t < 0 ? mix(GREEN, BLUE, u) : mix(GREEN, RED, u);
      el.style.backgroundColor = rgba(c, 0.28);
      el.style.borderColor = rgba(c, 0.82);
      el.title = metric + ': value=' + value.toFixed(2) + ', ' + method + ' delta=' + d.toFixed(2);
      if (el.getAttribute("data-clipping") === "1") {
        el.classList.add("clip-warn");
        el.title += " (clipping >= 0 dB)";
      }
    });
  }
  const LEGENDS = {
    zscore: "Colours (z-score): blue = below the mean, green = close, red = above (scale about \u00b12\u03c3).",
    median: "Colours (\u0394 vs median): blue = below, green = close, red = above (scale about \u00b12\u03c3, fixed minimum when \u03c3 is near 0).",
    mean: "Colours (\u0394 vs mean): blue = below, green = close, red = above (scale about \u00b12\u03c3, fixed minimum when \u03c3 is near 0)."
  };
  function sortTable(table, col, dir){
    const tbody = table.querySelector("tbody");
    const rows = Array.from(tbody.querySelectorAll("tr"));
    rows.sort((a, b) => {
      const aText = ((a.cells[col] && a.cells[col].textContent) || "").trim();
      const bText = ((b.cells[col] && b.cells[col].textContent) || "").trim();
      const aNum = parseFloat(aText), bNum = parseFloat(bText);
      if (!isNaN(aNum) && !isNaN(bNum)) return dir === "asc" ? aNum - bNum : bNum - aNum;
      return dir === "asc" ? aText.localeCompare(bText) : bText.localeCompare(aText);
    });
    rows.forEach(r => tbody.appendChild(r));
  }
  document.addEventListener("DOMContentLoaded", () => {
    const mode = document.getElementById("refMode");
    const legend = document.getElementById("modeLegend");
    const refresh = () => { apply(); legend.textContent = LEGENDS[mode.value] || ""; };
    mode.addEventListener("change", refresh);
    refresh();
    document.querySelectorAll("th.sortable").forEach(th => {
      th.addEventListener("click", () => {
        const table = th.closest("table");
        const col = Array.from(th.parentElement.children).indexOf(th);
        const dir = th.dataset.sort === "asc" ? "desc" : "asc";
        table.querySelectorAll("th.sortable").forEach(t => {
          t.dataset.sort = "";
          t.querySelector(".sort-ind").textContent = "\u2195";
        });
        th.dataset.sort = dir;
        th.querySelector(".sort-ind").textContent = dir === "asc" ? "\u2191" : "\u2193";
        sortTable(table, col, dir);
      });
    });
  });
})();"#;

/// Render the report as a standalone HTML page.
pub fn format_html(report: &Report, folder: &Path, generated: &str, html_path: &Path) -> String {
    let stats_json = serde_json::to_string(&report.stats).unwrap_or_else(|_| "{}".to_string());
    let summary = &report.summary;

    let worst = match &summary.worst_pair {
        Some(wp) => format!(
            "{} &harr; {} (&Delta;Max={})",
            escape_html(&wp.a_file),
            escape_html(&wp.b_file),
            format_num(wp.d_max_abs)
        ),
        None => "N/A (fewer than 2 measured files)".to_string(),
    };
    let verdict = if summary.global_same { "Yes" } else { "No" };

    let mut sorted: Vec<&MeasurementRecord> = report.metrics.iter().collect();
    sorted.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    let file_rows: Vec<String> = sorted.into_iter().map(file_row).collect();

    let th_lufs = header_help("LUFS_I", "Integrated loudness (LUFS, EBU R128). Closer to 0 = louder.");
    let th_tp = header_help("TruePeak (dBTP)", "Estimated inter-sample peak. Red at or above 0 dB: clipping.");
    let th_lra = header_help("LRA", "Loudness range. Larger = more dynamic.");
    let th_peak = header_help("Peak (dBFS)", "Raw sample peak. Red at or above 0 dB: clipping.");
    let th_rms = header_help("RMS (dBFS)", "Mean RMS level.");
    let th_dmax = header_help("\u{394}Max", "Pair distance: max(|\u{394}LUFS|, |\u{394}TruePeak|).");

    let file_headers: String = [
        sortable("File", false),
        sortable("Type", false),
        sortable("Size (MB)", true),
        sortable(&th_lufs, true),
        sortable(&th_tp, true),
        sortable(&th_lra, true),
        sortable(&th_peak, true),
        sortable(&th_rms, true),
        sortable("Status", false),
    ]
    .concat();
    let pair_headers: String = [
        sortable("File A", false),
        sortable("File B", false),
        sortable("LUFS A", true),
        sortable("LUFS B", true),
        sortable("&Delta;LUFS (B-A)", true),
        sortable("TP A", true),
        sortable("TP B", true),
        sortable("&Delta;TP (B-A)", true),
        sortable(&th_dmax, true),
        sortable("Similarity", false),
    ]
    .concat();

    let mut html = String::new();
    html.push_str("<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str("<title>Sound report</title>\n");
    html.push_str(STYLES);
    html.push_str("\n</head>\n<body>\n<div class=\"container\">\n");

    let _ = write!(
        html,
        r#"<div class="header">
  <div>
    <h1 class="h-title">Loudness comparison (ffmpeg)</h1>
    <div class="h-sub">
      <div><b>Folder</b>: {folder}</div>
      <div><b>Generated</b>: {generated}</div>
      <div><b>Pair scale</b>: {scale}</div>
    </div>
  </div>
  <div class="badge"><span class="small">Same overall level:</span> <span id="verdict">{verdict}</span></div>
</div>
<div class="kpis">
  <div class="card"><div class="kpi-title">Files found</div><div class="kpi-value">{total}</div></div>
  <div class="card"><div class="kpi-title">Files measured (OK)</div><div class="kpi-value">{ok}</div></div>
  <div class="card"><div class="kpi-title">Comparisons (pairs)</div><div class="kpi-value">{pairs}</div></div>
  <div class="card"><div class="kpi-title">Worst pair (&Delta;Max)</div><div class="kpi-value" style="font-size:13px">{worst}</div></div>
</div>
"#,
        folder = escape_html(&folder.display().to_string()),
        generated = escape_html(generated),
        scale = scale_text(),
        verdict = verdict,
        total = summary.files_total,
        ok = summary.files_ok,
        pairs = summary.pairs,
        worst = worst,
    );

    let _ = write!(
        html,
        r#"<div class="section">
  <h2>Per-file metrics</h2>
  <div class="card" style="margin-bottom:10px">
    <span class="small"><b>Colouring:</b></span>
    <select id="refMode" aria-label="Reference mode">
      <option value="median" selected>Median (&Delta;)</option>
      <option value="mean">Mean (&Delta;)</option>
      <option value="zscore">Z-score (&sigma;)</option>
    </select>
    <div class="small" id="modeLegend"></div>
  </div>
  <div class="tablewrap"><table>
    <thead><tr>{file_headers}<th>Error</th></tr></thead>
    <tbody>
{rows}
    </tbody>
  </table></div>
</div>
"#,
        file_headers = file_headers,
        rows = file_rows.join("\n"),
    );

    let _ = write!(
        html,
        r#"<div class="section">
  <h2>Pairwise comparisons</h2>
  <div class="card" style="margin-bottom:10px">
    <div class="kpi-title">Distribution of differences</div>
    <div style="display:flex; flex-wrap:wrap; gap:8px">
{hist}
    </div>
    <div class="small">Same overall level = max(&Delta;Max) &le; {max_delta} dB AND &ge;{ratio}% of pairs at or below "slight".</div>
  </div>
  <div class="tablewrap"><table>
    <thead><tr>{pair_headers}</tr></thead>
    <tbody>
{pairs}
    </tbody>
  </table></div>
</div>
<div class="footer">Generated from ffmpeg loudness analysis &bull; {path}</div>
</div>
"#,
        hist = histogram(report),
        pair_headers = pair_headers,
        max_delta = policy::GLOBAL_MAX_DELTA,
        ratio = policy::GLOBAL_MIN_RATIO * 100.0,
        pairs = pair_rows(report),
        path = escape_html(&html_path.display().to_string()),
    );

    let _ = write!(
        html,
        "<script>\nconst stats = {};\nconst STD_FLOOR = {:e};\n{}\n</script>\n</body>\n</html>\n",
        stats_json,
        policy::STD_FLOOR,
        SCRIPT
    );
    html
}
