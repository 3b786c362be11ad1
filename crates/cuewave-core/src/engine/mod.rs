//! Waveform engine
//!
//! One [`WaveformEngine`] per track display. It owns the playback/load state
//! machine, the zoom level and the render cache, and talks to a
//! [`PlaybackBackend`](crate::backend::PlaybackBackend) for decoding and
//! transport.

mod state;
mod waveform;

pub use state::EngineState;
pub use waveform::WaveformEngine;
