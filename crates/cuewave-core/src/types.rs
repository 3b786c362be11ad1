//! Common types for Cuewave
//!
//! This module contains the fundamental data shared by every part of the
//! engine: track references, the waveform buffer, and the display constants
//! that the configuration defaults are derived from.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Default zoom level in pixels per second
pub const DEFAULT_ZOOM: f64 = 50.0;

/// Minimum zoom level in pixels per second
pub const MIN_ZOOM: f64 = 10.0;

/// Maximum zoom level in pixels per second
pub const MAX_ZOOM: f64 = 1000.0;

/// Zoom change applied by a single zoom-in/zoom-out command
pub const ZOOM_STEP: f64 = 50.0;

/// Length of a freshly added marker region in seconds
pub const DEFAULT_MARKER_SPAN: f64 = 0.5;

/// Waveform bar width in pixels
pub const BAR_WIDTH: f32 = 2.0;

/// Gap between waveform bars in pixels
pub const BAR_GAP: f32 = 1.0;

/// Default waveform display height in pixels
pub const WAVEFORM_HEIGHT: f32 = 128.0;

/// Opaque track identifier, owned by the caller
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TrackId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A track as handed to the engine: identifier plus audio source locator
///
/// The locator is a URL or filesystem path. The engine only holds the
/// reference for the lifetime of one load/display cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRef {
    pub id: TrackId,
    pub locator: String,
}

impl TrackRef {
    pub fn new(id: impl Into<TrackId>, locator: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            locator: locator.into(),
        }
    }
}

/// Where the currently displayed waveform came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveformOrigin {
    /// Peaks decoded from the real audio
    Decoded,
    /// Generated fallback, not derived from audio
    Synthetic,
}

/// Immutable waveform amplitude data for one track
///
/// One amplitude per fixed time slice, normalized to `[0, 1]`, plus the
/// track's total duration. Cloning is cheap (the samples are shared) and the
/// buffer is replaced wholesale when the source changes, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformBuffer {
    samples: Arc<[f32]>,
    duration: f64,
    origin: WaveformOrigin,
}

impl WaveformBuffer {
    /// Create a buffer from decoded peaks
    ///
    /// Values are clamped into `[0, 1]` (NaN becomes 0) and a negative or
    /// non-finite duration is treated as zero.
    pub fn new(samples: Vec<f32>, duration: f64) -> Self {
        Self::with_origin(samples, duration, WaveformOrigin::Decoded)
    }

    pub(crate) fn with_origin(samples: Vec<f32>, duration: f64, origin: WaveformOrigin) -> Self {
        let samples: Vec<f32> = samples
            .into_iter()
            .map(|s| if s.is_nan() { 0.0 } else { s.clamp(0.0, 1.0) })
            .collect();
        let duration = if duration.is_finite() && duration > 0.0 {
            duration
        } else {
            0.0
        };
        Self {
            samples: samples.into(),
            duration,
            origin,
        }
    }

    /// An empty buffer (renders zero bars)
    pub fn empty() -> Self {
        Self::new(Vec::new(), 0.0)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Total duration in seconds
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn origin(&self) -> WaveformOrigin {
        self.origin
    }

    pub fn is_synthetic(&self) -> bool {
        self.origin == WaveformOrigin::Synthetic
    }

    /// Seconds covered by one amplitude entry
    pub fn slice_duration(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.duration / self.samples.len() as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_clamps_amplitudes() {
        let buffer = WaveformBuffer::new(vec![-0.5, 0.5, 1.5, f32::NAN], 4.0);
        assert_eq!(buffer.samples(), &[0.0, 0.5, 1.0, 0.0]);
        assert_eq!(buffer.origin(), WaveformOrigin::Decoded);
    }

    #[test]
    fn test_buffer_rejects_bad_duration() {
        assert_eq!(WaveformBuffer::new(vec![0.1], -3.0).duration(), 0.0);
        assert_eq!(WaveformBuffer::new(vec![0.1], f64::INFINITY).duration(), 0.0);
    }

    #[test]
    fn test_slice_duration() {
        let buffer = WaveformBuffer::new(vec![0.2; 100], 10.0);
        assert!((buffer.slice_duration() - 0.1).abs() < 1e-12);
        assert_eq!(WaveformBuffer::empty().slice_duration(), 0.0);
    }

    #[test]
    fn test_track_id_display() {
        let track = TrackRef::new("a1", "/music/a1.flac");
        assert_eq!(track.id.to_string(), "a1");
        assert_eq!(track.id.as_str(), "a1");
    }
}
