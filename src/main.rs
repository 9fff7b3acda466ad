use std::io;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use soundreport::analyzer::{self, Ffmpeg, Strategy};
use soundreport::folder::{self, Argument, FolderProvider, OsDialog};
use soundreport::format;
use soundreport::output;
use soundreport::report;

#[derive(Parser)]
#[command(name = "soundreport", about = "Compare the loudness of a folder of audio/video files")]
struct Cli {
    /// Folder to analyze (prompted for when omitted)
    folder: Option<PathBuf>,

    /// How loudness metrics are extracted from ffmpeg
    #[arg(long, value_enum, default_value_t = Strategy::TwoPass)]
    strategy: Strategy,

    /// Number of parallel analysis jobs (default: number of CPU cores)
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Directory for the HTML and CSV reports (default: the analyzed folder)
    #[arg(long)]
    out: Option<PathBuf>,

    /// Print the full report as JSON instead of the summary table
    #[arg(long)]
    json: bool,

    /// Skip the OS folder dialog and ask on the terminal
    #[arg(long)]
    no_dialog: bool,

    /// ffmpeg executable
    #[arg(long, env = "SOUNDREPORT_FFMPEG", default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Initialize tracing subscriber; RUST_LOG overrides the default level.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ffmpeg = Ffmpeg::new(&cli.ffmpeg);
    ffmpeg.check()?;

    let argument = Argument(cli.folder.clone());
    let mut providers: Vec<&dyn FolderProvider> = Vec::new();
    providers.push(&argument);
    if !cli.no_dialog {
        providers.push(&OsDialog);
    }
    let folder = folder::select_folder(&providers, &mut io::stdin().lock(), &mut io::stderr())?;
    eprintln!("Folder: {}", folder.display());

    let files = analyzer::scan_media_files(&folder);
    if files.is_empty() {
        bail!("No supported files in {}", folder.display());
    }

    let total = files.len();
    let jobs = cli.jobs.unwrap_or_else(analyzer::default_jobs);
    eprintln!("Measuring loudness of {} file(s)...", total);

    let start = Instant::now();
    let measurements = analyzer::analyze_files(&ffmpeg, &files, cli.strategy, jobs, |done, record| {
        match &record.error {
            Some(err) => eprintln!("[{}/{}] {} (error: {})", done, total, record.file_name, err),
            None => eprintln!("[{}/{}] {}", done, total, record.file_name),
        }
    });
    let elapsed = start.elapsed();

    let report = report::build(&measurements)?;

    let out_dir = cli.out.as_deref().unwrap_or(&folder);
    let paths = output::write_outputs(&folder, out_dir, &report)?;

    if cli.json {
        println!("{}", format::format_json(&report));
    } else {
        println!("{}", format::format_table(&report));
    }

    eprintln!(
        "Measured {} file(s) in {:.2}s. Outputs:",
        total,
        elapsed.as_secs_f64()
    );
    eprintln!(" - HTML: {}", paths.html.display());
    eprintln!(" - CSV : {}", paths.csv.display());

    Ok(())
}
