//! In-process sample peak / RMS measurement, matching what ffmpeg's
//! `volumedetect` reports as `max_volume` and `mean_volume`.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Convert a linear amplitude to dBFS.
fn db_fs(linear: f64) -> f64 {
    if linear <= 0.0 {
        -f64::INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Running peak and energy over every sample of every channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeLevels {
    peak: f64,
    sum_sq: f64,
    samples: u64,
}

impl VolumeLevels {
    pub fn push_samples(&mut self, interleaved: &[f32]) {
        for &s in interleaved {
            let v = s as f64;
            self.sum_sq += v * v;
            let abs_v = v.abs();
            if abs_v > self.peak {
                self.peak = abs_v;
            }
        }
        self.samples += interleaved.len() as u64;
    }

    /// Sample peak in dBFS; `None` for silence or an empty stream.
    pub fn peak_dbfs(&self) -> Option<f64> {
        Some(db_fs(self.peak)).filter(|v| v.is_finite())
    }

    /// Mean level (power average) in dBFS; `None` for silence or an empty stream.
    pub fn rms_dbfs(&self) -> Option<f64> {
        if self.samples == 0 {
            return None;
        }
        let mean_sq = self.sum_sq / self.samples as f64;
        Some(10.0 * mean_sq.log10()).filter(|v| v.is_finite())
    }
}

/// Decode `path` and accumulate its volume levels.
pub fn measure_file(path: &Path) -> Result<VolumeLevels> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .with_context(|| format!("Failed to probe {}", path.display()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("No audio track found")?;
    let codec_params = track.codec_params.clone();
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .context("Failed to create decoder")?;

    let mut levels = VolumeLevels::default();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.capacity() as u64;
        let needed = decoded.capacity() * spec.channels.count();

        // Reuse the sample buffer; only reallocate when a packet outgrows it.
        if sample_buf.as_ref().is_some_and(|b| b.capacity() < needed) {
            sample_buf = None;
        }
        let buf = sample_buf.get_or_insert_with(|| SampleBuffer::new(num_frames, spec));

        buf.copy_interleaved_ref(decoded);
        levels.push_samples(buf.samples());
    }

    debug!(path = %path.display(), samples = levels.samples, "decoded for volume levels");
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_fs() {
        assert!((db_fs(1.0) - 0.0).abs() < 0.001);
        assert!((db_fs(0.5) - (-6.0206)).abs() < 0.01);
        assert!(db_fs(0.0).is_infinite());
    }

    #[test]
    fn test_constant_signal_levels() {
        let mut levels = VolumeLevels::default();
        levels.push_samples(&vec![0.5f32; 1000]);
        levels.push_samples(&vec![-0.5f32; 1000]);
        let peak = levels.peak_dbfs().unwrap();
        let rms = levels.rms_dbfs().unwrap();
        assert!((peak - (-6.0206)).abs() < 0.01);
        // Constant magnitude: mean power equals peak power.
        assert!((rms - peak).abs() < 1e-9);
    }

    #[test]
    fn test_silence_has_no_levels() {
        let mut levels = VolumeLevels::default();
        assert_eq!(levels.rms_dbfs(), None);
        levels.push_samples(&[0.0f32; 64]);
        assert_eq!(levels.peak_dbfs(), None);
        assert_eq!(levels.rms_dbfs(), None);
    }

    #[test]
    fn test_sine_rms_is_3db_below_peak() {
        let mut levels = VolumeLevels::default();
        let samples: Vec<f32> = (0..48_000)
            .map(|i| (2.0 * std::f64::consts::PI * 1000.0 * i as f64 / 48_000.0).sin() as f32)
            .collect();
        levels.push_samples(&samples);
        let peak = levels.peak_dbfs().unwrap();
        let rms = levels.rms_dbfs().unwrap();
        assert!(peak > -0.01);
        assert!((peak - rms - 3.0103).abs() < 0.01, "peak {:.3} rms {:.3}", peak, rms);
    }

    #[test]
    fn test_measure_missing_file() {
        assert!(measure_file(Path::new("/nonexistent/track.wav")).is_err());
    }
}
