//! Playback/load states

use std::fmt;

/// State of a waveform engine
///
/// ```text
/// Idle -> Loading -> Ready <-> Playing <-> Paused
///            |
///            +-> Error -> Loading (retry)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EngineState {
    /// No source bound
    #[default]
    Idle,
    /// Load issued to the backend, waiting for ready or error
    Loading,
    /// Audio loaded, stopped
    Ready,
    Playing,
    Paused,
    /// Load failed; the synthetic waveform is displayed
    Error,
}

impl EngineState {
    pub fn name(&self) -> &'static str {
        match self {
            EngineState::Idle => "idle",
            EngineState::Loading => "loading",
            EngineState::Ready => "ready",
            EngineState::Playing => "playing",
            EngineState::Paused => "paused",
            EngineState::Error => "in error",
        }
    }

    /// Real audio is loaded (ready, playing, or paused)
    pub fn has_audio(&self) -> bool {
        matches!(
            self,
            EngineState::Ready | EngineState::Playing | EngineState::Paused
        )
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
