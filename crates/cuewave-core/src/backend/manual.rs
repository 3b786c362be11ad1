//! Host-driven backend
//!
//! For hosts that own their audio engine elsewhere (a browser audio element,
//! a DJ deck, a test script): the backend only records what the engine asked
//! for, and the host reports back through [`ManualHandle`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{BackendNotifier, LoadToken, PlaybackBackend};
use crate::types::WaveformBuffer;

/// A primitive the engine issued to the backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCommand {
    Load(String),
    Play,
    Pause,
    SetTime(f64),
    Unload,
}

#[derive(Debug, Default)]
struct ManualState {
    commands: Vec<BackendCommand>,
    notifier: Option<BackendNotifier>,
    duration: f64,
    current_time: f64,
}

/// Backend that defers every decision to the host
#[derive(Debug, Default)]
pub struct ManualBackend {
    state: Arc<Mutex<ManualState>>,
}

/// Host-side view of a [`ManualBackend`]
#[derive(Debug, Clone)]
pub struct ManualHandle {
    state: Arc<Mutex<ManualState>>,
}

impl ManualBackend {
    /// Create the backend together with the handle the host keeps
    pub fn new() -> (Self, ManualHandle) {
        let backend = Self::default();
        let handle = ManualHandle {
            state: Arc::clone(&backend.state),
        };
        (backend, handle)
    }

    fn state(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PlaybackBackend for ManualBackend {
    fn load(&mut self, locator: &str, notifier: BackendNotifier) {
        let mut state = self.state();
        state.commands.push(BackendCommand::Load(locator.to_string()));
        state.notifier = Some(notifier);
        state.duration = 0.0;
        state.current_time = 0.0;
    }

    fn duration(&self) -> f64 {
        self.state().duration
    }

    fn current_time(&self) -> f64 {
        self.state().current_time
    }

    fn play(&mut self) {
        self.state().commands.push(BackendCommand::Play);
    }

    fn pause(&mut self) {
        self.state().commands.push(BackendCommand::Pause);
    }

    fn set_time(&mut self, seconds: f64) {
        let mut state = self.state();
        state.commands.push(BackendCommand::SetTime(seconds));
        state.current_time = seconds;
    }

    fn unload(&mut self) {
        let mut state = self.state();
        state.commands.push(BackendCommand::Unload);
        state.notifier = None;
        state.duration = 0.0;
        state.current_time = 0.0;
    }
}

impl ManualHandle {
    fn state(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Notifier of the most recent load, if one is outstanding
    pub fn notifier(&self) -> Option<BackendNotifier> {
        self.state().notifier.clone()
    }

    /// Token of the most recent load
    pub fn current_token(&self) -> Option<LoadToken> {
        self.state().notifier.as_ref().map(BackendNotifier::token)
    }

    /// Every command issued so far, oldest first
    pub fn commands(&self) -> Vec<BackendCommand> {
        self.state().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.state().commands.clear();
    }

    /// Report a successful load for the current source
    pub fn finish_load(&self, buffer: WaveformBuffer) -> bool {
        let notifier = {
            let mut state = self.state();
            state.duration = buffer.duration();
            state.notifier.clone()
        };
        notifier.map(|n| n.ready(buffer)).unwrap_or(false)
    }

    /// Report a failed load for the current source
    pub fn fail_load(&self, reason: &str) -> bool {
        let notifier = self.notifier();
        notifier.map(|n| n.error(reason)).unwrap_or(false)
    }

    /// Report a playback time from the host's audio clock
    pub fn report_time(&self, seconds: f64) -> bool {
        let notifier = {
            let mut state = self.state();
            state.current_time = seconds;
            state.notifier.clone()
        };
        notifier.map(|n| n.time_update(seconds)).unwrap_or(false)
    }

    /// Report that the host's audio started or stopped
    pub fn report_playing(&self, playing: bool) -> bool {
        let notifier = self.notifier();
        notifier.map(|n| n.playing(playing)).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendEventKind, BackendEvents};

    #[test]
    fn test_records_commands_in_order() {
        let (mut backend, handle) = ManualBackend::new();
        let events = BackendEvents::new();

        backend.load("/a.flac", events.notifier(LoadToken(1)));
        backend.play();
        backend.set_time(4.0);
        backend.pause();
        backend.unload();

        assert_eq!(
            handle.commands(),
            vec![
                BackendCommand::Load("/a.flac".into()),
                BackendCommand::Play,
                BackendCommand::SetTime(4.0),
                BackendCommand::Pause,
                BackendCommand::Unload,
            ]
        );
        assert_eq!(handle.current_token(), None);
    }

    #[test]
    fn test_host_reports_reach_engine_channel() {
        let (mut backend, handle) = ManualBackend::new();
        let events = BackendEvents::new();
        backend.load("/a.flac", events.notifier(LoadToken(7)));

        assert!(handle.finish_load(WaveformBuffer::new(vec![0.5; 4], 12.0)));
        assert!(handle.report_time(3.0));
        assert_eq!(backend.duration(), 12.0);
        assert_eq!(backend.current_time(), 3.0);

        let drained = events.drain();
        assert_eq!(drained.len(), 2);
        assert!(drained.iter().all(|e| e.token == LoadToken(7)));
        assert!(matches!(drained[0].kind, BackendEventKind::Ready(_)));
    }

    #[test]
    fn test_reports_without_load_are_dropped() {
        let (_backend, handle) = ManualBackend::new();
        assert!(!handle.fail_load("nothing loaded"));
        assert!(!handle.report_playing(true));
    }
}
