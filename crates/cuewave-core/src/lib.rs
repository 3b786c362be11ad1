//! Cuewave Core - Waveform display and cue annotation engine
//!
//! Headless half of cuewave: loads a track through a decode/playback
//! backend, keeps the playback/load state machine, renders the waveform into
//! drawable bars and stores labelled regions (intro/outro cues) per track.
//! The iced front-end lives in `cuewave-widgets`.

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod region;
pub mod render;
pub mod synthetic;
pub mod time_axis;
pub mod types;

pub use engine::{EngineState, WaveformEngine};
pub use error::{EngineError, EngineResult};
pub use events::{EngineEvent, Subscription};
pub use region::{Region, RegionKind, RegionStore};
pub use types::*;
