//! Audio decoding into waveform peaks
//!
//! Decodes a whole file with symphonia, folds every frame to its loudest
//! channel, and buckets the result into a fixed number of peaks per second.
//! Peaks are normalized so the loudest one is 1.0.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use crate::types::WaveformBuffer;

/// Errors while turning a locator into peaks
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Locator is not a local path or `file://` URL
    #[error("Unsupported audio locator: {0}")]
    UnsupportedLocator(String),

    #[error("Failed to open audio source: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode audio: {0}")]
    Symphonia(#[from] SymphoniaError),

    #[error("No supported audio tracks found")]
    NoAudioTrack,

    #[error("Audio source contains no samples")]
    Empty,

    #[error("Load cancelled")]
    Cancelled,
}

/// Turn a locator into a local path
///
/// Accepts plain paths and `file://` URLs. Any other scheme is rejected.
pub fn resolve_locator(locator: &str) -> Result<PathBuf, DecodeError> {
    let trimmed = locator.trim();
    if trimmed.is_empty() {
        return Err(DecodeError::UnsupportedLocator("empty locator".into()));
    }
    if let Some(path) = trimmed.strip_prefix("file://") {
        return Ok(PathBuf::from(path));
    }
    if trimmed.contains("://") {
        return Err(DecodeError::UnsupportedLocator(trimmed.to_string()));
    }
    Ok(PathBuf::from(trimmed))
}

/// Decode a file into a normalized waveform buffer
///
/// `cancel` is checked between packets; once set the decode stops with
/// [`DecodeError::Cancelled`].
pub fn decode_peaks(
    path: &Path,
    peaks_per_second: u32,
    cancel: &AtomicBool,
) -> Result<WaveformBuffer, DecodeError> {
    let src = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();
    let probed = symphonia::default::get_probe().format(&hint, mss, &fmt_opts, &meta_opts)?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?;

    let dec_opts: DecoderOptions = Default::default();
    let mut decoder = symphonia::default::get_codecs().make(&track.codec_params, &dec_opts)?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(44100);

    // One value per frame: the loudest channel
    let mut envelope = Vec::<f32>::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut channels = 1usize;

    loop {
        if cancel.load(Ordering::Relaxed) {
            return Err(DecodeError::Cancelled);
        }

        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(err) => return Err(err.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(audio_buf) => {
                if sample_buf.is_none() {
                    let spec = *audio_buf.spec();
                    sample_rate = spec.rate;
                    channels = spec.channels.count().max(1);
                    // Capacity, not length: the largest packet this decoder produces
                    let duration = audio_buf.capacity() as u64;
                    sample_buf = Some(SampleBuffer::<f32>::new(duration, spec));
                }

                if let Some(buf) = &mut sample_buf {
                    buf.copy_interleaved_ref(audio_buf);
                    envelope.extend(buf.samples().chunks(channels).map(|frame| {
                        frame.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
                    }));
                }
            }
            // Corrupt packets are skipped, not fatal
            Err(SymphoniaError::DecodeError(msg)) => {
                log::debug!("Skipping undecodable packet in {:?}: {}", path, msg);
            }
            Err(err) => return Err(err.into()),
        }
    }

    if envelope.is_empty() || sample_rate == 0 {
        return Err(DecodeError::Empty);
    }

    let duration = envelope.len() as f64 / sample_rate as f64;
    let frames_per_peak = (sample_rate / peaks_per_second.max(1)).max(1) as usize;
    let peaks = compute_peaks(&envelope, frames_per_peak);

    log::info!(
        "Decoded {:?}: {:.2}s at {} Hz, {} peaks",
        path,
        duration,
        sample_rate,
        peaks.len()
    );

    Ok(WaveformBuffer::new(peaks, duration))
}

/// Bucket an amplitude envelope into peaks and normalize to `[0, 1]`
///
/// Silence stays silence: an all-zero envelope yields all-zero peaks.
pub fn compute_peaks(envelope: &[f32], frames_per_peak: usize) -> Vec<f32> {
    let frames_per_peak = frames_per_peak.max(1);
    let mut peaks: Vec<f32> = envelope
        .par_chunks(frames_per_peak)
        .map(|chunk| chunk.iter().fold(0.0f32, |peak, s| peak.max(s.abs())))
        .collect();

    let max = peaks.iter().cloned().fold(0.0f32, f32::max);
    if max > 0.0 {
        peaks.par_iter_mut().for_each(|p| *p /= max);
    }
    peaks
}
