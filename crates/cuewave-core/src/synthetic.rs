//! Synthetic waveform fallback
//!
//! When the real audio cannot be loaded the display still needs something
//! that looks like music: a slow sinusoid for structure, a faster one for a
//! rhythmic pulse, and some random jitter. Values are folded to their
//! absolute value and rescaled into `[0.2, 1.0]` so the display never goes
//! fully silent. The jitter makes buffers differ between calls; the bounded
//! range and periodic shape do not.

use rand::Rng;

use crate::types::{WaveformBuffer, WaveformOrigin};

/// Lowest amplitude a synthetic buffer ever contains
pub const SYNTHETIC_FLOOR: f32 = 0.2;

/// Highest amplitude a synthetic buffer ever contains
pub const SYNTHETIC_CEILING: f32 = 1.0;

/// Phase advance per sample of the structural sinusoid
const STRUCTURE_RATE: f64 = 0.05;
const STRUCTURE_DEPTH: f64 = 0.3;

/// Phase advance per sample of the rhythmic sinusoid
const PULSE_RATE: f64 = 0.2;
const PULSE_DEPTH: f64 = 0.2;

/// Peak-to-peak width of the random jitter
const JITTER_WIDTH: f64 = 0.3;

/// Generate `sample_count` synthetic amplitudes covering `duration` seconds
///
/// `seed_length` offsets the phase of both sinusoids, so different tracks get
/// visibly different (but equally shaped) fallbacks.
pub fn generate(seed_length: usize, sample_count: usize, duration: f64) -> WaveformBuffer {
    let mut rng = rand::thread_rng();
    let samples = (0..sample_count)
        .map(|i| {
            let jitter = (rng.gen::<f64>() - 0.5) * JITTER_WIDTH;
            shape(seed_length + i, jitter)
        })
        .collect();

    log::debug!(
        "Generated synthetic waveform: {} samples over {:.1}s (seed {})",
        sample_count,
        duration,
        seed_length
    );

    WaveformBuffer::with_origin(samples, duration, WaveformOrigin::Synthetic)
}

/// Amplitude at phase index `i` with the given jitter, in `[0.2, 1.0]`
fn shape(i: usize, jitter: f64) -> f32 {
    let i = i as f64;
    let structure = (i * STRUCTURE_RATE).sin() * STRUCTURE_DEPTH;
    let pulse = (i * PULSE_RATE).sin() * PULSE_DEPTH;
    let raw = (structure + pulse + jitter).abs();
    // raw <= 0.65, so raw * 0.8 + 0.2 <= 0.72 before the clamp
    let scaled = raw * (SYNTHETIC_CEILING - SYNTHETIC_FLOOR) as f64 + SYNTHETIC_FLOOR as f64;
    (scaled as f32).clamp(SYNTHETIC_FLOOR, SYNTHETIC_CEILING)
}

/// Derive a phase seed from a locator so each source gets its own shape
pub fn seed_for(locator: &str) -> usize {
    locator.len()
}

/// Self-contained playback clock for the synthetic display
///
/// Advances a progress ratio by a fixed step per frame, independent of any
/// audio clock. Reaching the end stops playback and rewinds to zero.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticPlayback {
    progress: f64,
    playing: bool,
    step: f64,
}

/// What a single frame of synthetic playback did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticTick {
    /// Not playing, nothing changed
    Idle,
    /// Progress advanced
    Advanced,
    /// Reached the end, stopped and rewound
    Finished,
}

impl SyntheticPlayback {
    /// `step` is the progress added per frame (0.005 = 0.5%)
    pub fn new(step: f64) -> Self {
        let step = if step.is_finite() && step > 0.0 {
            step.min(1.0)
        } else {
            0.005
        };
        Self {
            progress: 0.0,
            playing: false,
            step,
        }
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Stop and rewind
    pub fn stop(&mut self) {
        self.playing = false;
        self.progress = 0.0;
    }

    /// Jump to a progress ratio (clamped to `[0, 1]`)
    pub fn seek(&mut self, progress: f64) {
        self.progress = if progress.is_finite() {
            progress.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    /// Advance by one frame
    pub fn advance_frame(&mut self) -> SyntheticTick {
        if !self.playing {
            return SyntheticTick::Idle;
        }
        if self.progress >= 1.0 {
            self.stop();
            return SyntheticTick::Finished;
        }
        self.progress = (self.progress + self.step).min(1.0);
        SyntheticTick::Advanced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_within_bounds_for_any_seed_and_length() {
        for seed in [0usize, 1, 17, 999, 123_456] {
            for count in [0usize, 1, 2, 64, 400, 5000] {
                let buffer = generate(seed, count, 180.0);
                assert_eq!(buffer.len(), count);
                assert!(buffer.is_synthetic());
                for &v in buffer.samples() {
                    assert!(
                        (SYNTHETIC_FLOOR..=SYNTHETIC_CEILING).contains(&v),
                        "value {v} out of range (seed {seed}, count {count})"
                    );
                }
            }
        }
    }

    #[test]
    fn test_shape_extremes_stay_in_range() {
        for i in 0..2000 {
            for jitter in [-JITTER_WIDTH / 2.0, 0.0, JITTER_WIDTH / 2.0] {
                let v = shape(i, jitter);
                assert!((SYNTHETIC_FLOOR..=SYNTHETIC_CEILING).contains(&v));
            }
        }
    }

    #[test]
    fn test_shape_is_periodic_without_jitter() {
        // The structural sinusoid repeats every 2*pi/0.05 ~= 125.66 samples and
        // the pulse every 31.4, so without jitter the envelope is not flat and
        // its local maxima recur.
        let values: Vec<f32> = (0..400).map(|i| shape(i, 0.0)).collect();
        let max = values.iter().cloned().fold(f32::MIN, f32::max);
        let min = values.iter().cloned().fold(f32::MAX, f32::min);
        assert!(max - min > 0.2, "envelope is too flat: {min}..{max}");

        let first_cycle_max = values[..126].iter().cloned().fold(f32::MIN, f32::max);
        let second_cycle_max = values[126..252].iter().cloned().fold(f32::MIN, f32::max);
        assert!((first_cycle_max - second_cycle_max).abs() < 0.05);
    }

    #[test]
    fn test_buffer_duration() {
        let buffer = generate(3, 400, 180.0);
        assert_eq!(buffer.duration(), 180.0);
    }

    #[test]
    fn test_playback_advances_and_wraps() {
        let mut playback = SyntheticPlayback::new(0.25);
        assert_eq!(playback.advance_frame(), SyntheticTick::Idle);

        playback.play();
        for expected in [0.25, 0.5, 0.75, 1.0] {
            assert_eq!(playback.advance_frame(), SyntheticTick::Advanced);
            assert!((playback.progress() - expected).abs() < 1e-12);
        }
        assert_eq!(playback.advance_frame(), SyntheticTick::Finished);
        assert_eq!(playback.progress(), 0.0);
        assert!(!playback.is_playing());
    }

    #[test]
    fn test_playback_default_rate_reaches_end() {
        let mut playback = SyntheticPlayback::new(0.005);
        playback.play();
        let mut frames = 0;
        while playback.advance_frame() != SyntheticTick::Finished {
            frames += 1;
            assert!(frames < 1000, "synthetic playback never finished");
        }
        // 200 steps of 0.005, plus one if rounding leaves it just short of 1.0
        assert!((200..=201).contains(&frames), "took {frames} frames");
    }

    #[test]
    fn test_seek_clamps() {
        let mut playback = SyntheticPlayback::new(0.005);
        playback.seek(1.5);
        assert_eq!(playback.progress(), 1.0);
        playback.seek(-1.0);
        assert_eq!(playback.progress(), 0.0);
    }
}
