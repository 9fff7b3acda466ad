//! Loudness comparison for a folder of audio/video files.
//!
//! [`report::build`] turns per-file measurements into population statistics,
//! per-file deviations, pairwise similarity categories and a single
//! "same overall level" verdict. The remaining modules gather measurements
//! through ffmpeg and render the result.

pub mod analyzer;
pub mod classify;
pub mod csv_output;
pub mod folder;
pub mod format;
pub mod html_output;
pub mod models;
pub mod output;
pub mod policy;
pub mod report;
pub mod stats;
pub mod volume;
