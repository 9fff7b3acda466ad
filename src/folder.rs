//! Picking the folder to analyze.
//!
//! Providers are tried in order. Every provider but the last may decline
//! with a reason; the text prompt either yields a directory or fails.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::debug;

const DIALOG_TITLE: &str = "Select the folder containing your audio/video files";

/// Why a provider did not produce a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unavailable(pub String);

pub trait FolderProvider {
    fn name(&self) -> &'static str;
    /// Whether this provider opens a graphical dialog.
    fn is_dialog(&self) -> bool {
        false
    }
    fn select(&self) -> std::result::Result<PathBuf, Unavailable>;
}

/// A folder given on the command line.
pub struct Argument(pub Option<PathBuf>);

impl FolderProvider for Argument {
    fn name(&self) -> &'static str {
        "argument"
    }

    fn select(&self) -> std::result::Result<PathBuf, Unavailable> {
        match &self.0 {
            Some(path) => Ok(path.clone()),
            None => Err(Unavailable("no folder argument".to_string())),
        }
    }
}

/// Native folder dialog through the platform's scripting tool.
pub struct OsDialog;

impl OsDialog {
    /// Dialog commands to try in order for this platform.
    fn commands() -> std::result::Result<Vec<Command>, Unavailable> {
        if cfg!(target_os = "windows") {
            let script = format!(
                "Add-Type -AssemblyName System.Windows.Forms; \
                 $f = New-Object System.Windows.Forms.FolderBrowserDialog; \
                 $f.Description = '{}'; $f.ShowNewFolderButton = $false; \
                 if ($f.ShowDialog() -eq [System.Windows.Forms.DialogResult]::OK) {{ $f.SelectedPath }}",
                DIALOG_TITLE.replace('\'', "''")
            );
            let mut cmd = Command::new("powershell");
            cmd.args(["-NoProfile", "-Command", script.as_str()]);
            Ok(vec![cmd])
        } else if cfg!(target_os = "macos") {
            let mut cmd = Command::new("osascript");
            cmd.arg("-e").arg(format!(
                "POSIX path of (choose folder with prompt \"{}\")",
                DIALOG_TITLE
            ));
            Ok(vec![cmd])
        } else {
            if std::env::var_os("DISPLAY").is_none() && std::env::var_os("WAYLAND_DISPLAY").is_none() {
                return Err(Unavailable("no graphical display".to_string()));
            }
            let mut zenity = Command::new("zenity");
            zenity
                .args(["--file-selection", "--directory"])
                .arg(format!("--title={}", DIALOG_TITLE));
            let mut kdialog = Command::new("kdialog");
            kdialog
                .args(["--getexistingdirectory", "."])
                .args(["--title", DIALOG_TITLE]);
            Ok(vec![zenity, kdialog])
        }
    }

    fn run(mut cmd: Command) -> std::result::Result<PathBuf, Unavailable> {
        let program = cmd.get_program().to_string_lossy().into_owned();
        let out = cmd
            .output()
            .map_err(|e| Unavailable(format!("{} not available ({})", program, e)))?;
        let selected = String::from_utf8_lossy(&out.stdout).trim().to_string();
        if selected.is_empty() {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            return Err(Unavailable(if stderr.is_empty() {
                "dialog cancelled".to_string()
            } else {
                stderr
            }));
        }
        Ok(PathBuf::from(selected))
    }
}

impl FolderProvider for OsDialog {
    fn name(&self) -> &'static str {
        "os dialog"
    }

    fn is_dialog(&self) -> bool {
        true
    }

    /// First dialog that runs decides; a cancelled dialog is not retried
    /// with the next tool.
    fn select(&self) -> std::result::Result<PathBuf, Unavailable> {
        let mut last = Unavailable("no dialog tool".to_string());
        for cmd in Self::commands()? {
            match Self::run(cmd) {
                Ok(path) => return Ok(path),
                Err(reason) if reason.0.contains("not available") => last = reason,
                Err(reason) => return Err(reason),
            }
        }
        Err(last)
    }
}

/// Read a folder path from a line of input. Always the last provider.
pub fn prompt(input: &mut impl BufRead, out: &mut impl Write) -> Result<PathBuf> {
    write!(out, "Folder: ")?;
    out.flush()?;
    let mut line = String::new();
    input.read_line(&mut line).context("Failed to read folder path")?;
    let path = line.trim();
    if path.is_empty() {
        bail!("No folder provided.");
    }
    let path = Path::new(path);
    if !path.is_dir() {
        bail!("Invalid path: {}", path.display());
    }
    Ok(path.to_path_buf())
}

/// Try `providers` in order, then fall back to the text prompt.
pub fn select_folder(
    providers: &[&dyn FolderProvider],
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<PathBuf> {
    let mut dialog_reason = None;
    for provider in providers {
        match provider.select() {
            Ok(path) => {
                debug!(provider = provider.name(), path = %path.display(), "folder selected");
                return canonical_dir(&path);
            }
            Err(Unavailable(reason)) => {
                debug!(provider = provider.name(), %reason, "folder provider unavailable");
                if provider.is_dialog() {
                    dialog_reason = Some(reason);
                }
            }
        }
    }

    match dialog_reason {
        Some(reason) => writeln!(out, "GUI unavailable ({}). Enter the folder path:", reason)?,
        None => writeln!(out, "Enter the folder path:")?,
    }
    let path = prompt(input, out)?;
    canonical_dir(&path)
}

fn canonical_dir(path: &Path) -> Result<PathBuf> {
    if !path.is_dir() {
        bail!("Invalid path: {}", path.display());
    }
    path.canonicalize()
        .with_context(|| format!("Failed to resolve {}", path.display()))
}
