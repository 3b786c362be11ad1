//! Decode/playback collaborator contract
//!
//! The engine does not decode or play audio itself. It talks to a
//! [`PlaybackBackend`] through a handful of primitives and receives the
//! backend's notifications asynchronously over a channel. Every notification
//! carries the [`LoadToken`] of the load it belongs to, so the engine can
//! recognise and drop callbacks from a load that has since been superseded.
//!
//! Two implementations ship with the crate:
//!
//! - [`FileBackend`]: decodes local files on a worker thread and runs a
//!   wall-clock transport (no audio output)
//! - [`ManualBackend`]: records commands and lets the host fire the
//!   callbacks itself (bridges to an external audio engine, and tests)

pub mod decoder;
mod file;
mod manual;

pub use file::FileBackend;
pub use manual::{BackendCommand, ManualBackend, ManualHandle};

use std::fmt;

use crossbeam::channel::{unbounded, Receiver, Sender};

use crate::types::WaveformBuffer;

/// Generation token identifying one load request
///
/// Tokens increase monotonically per engine; a callback whose token differs
/// from the engine's current one is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LoadToken(pub u64);

impl LoadToken {
    pub fn next(self) -> Self {
        LoadToken(self.0 + 1)
    }
}

impl fmt::Display for LoadToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Notification payloads a backend can emit
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEventKind {
    /// Load finished; the buffer carries peaks and duration
    Ready(WaveformBuffer),
    /// Load failed (network, decode, or timeout)
    Error(String),
    /// Playback started (`true`) or stopped (`false`)
    PlayingChanged(bool),
    /// Current playback time in seconds
    TimeUpdate(f64),
}

/// A backend notification tagged with its load token
#[derive(Debug, Clone, PartialEq)]
pub struct BackendEvent {
    pub token: LoadToken,
    pub kind: BackendEventKind,
}

/// Sending half handed to a backend with each load
///
/// Bound to a single load token. Sending never blocks; if the engine has
/// gone away the event is dropped and the send reports `false`.
#[derive(Clone)]
pub struct BackendNotifier {
    token: LoadToken,
    tx: Sender<BackendEvent>,
}

impl BackendNotifier {
    pub fn token(&self) -> LoadToken {
        self.token
    }

    pub fn ready(&self, buffer: WaveformBuffer) -> bool {
        self.send(BackendEventKind::Ready(buffer))
    }

    pub fn error(&self, reason: impl Into<String>) -> bool {
        self.send(BackendEventKind::Error(reason.into()))
    }

    pub fn playing(&self, playing: bool) -> bool {
        self.send(BackendEventKind::PlayingChanged(playing))
    }

    pub fn time_update(&self, seconds: f64) -> bool {
        self.send(BackendEventKind::TimeUpdate(seconds))
    }

    fn send(&self, kind: BackendEventKind) -> bool {
        match self.tx.send(BackendEvent {
            token: self.token,
            kind,
        }) {
            Ok(()) => true,
            Err(_) => {
                log::debug!("Backend event for load {} dropped: engine gone", self.token);
                false
            }
        }
    }
}

impl fmt::Debug for BackendNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendNotifier")
            .field("token", &self.token)
            .finish()
    }
}

/// Engine-side end of the notification channel
pub struct BackendEvents {
    tx: Sender<BackendEvent>,
    rx: Receiver<BackendEvent>,
}

impl Default for BackendEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendEvents {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Notifier for one load
    pub fn notifier(&self, token: LoadToken) -> BackendNotifier {
        BackendNotifier {
            token,
            tx: self.tx.clone(),
        }
    }

    /// Take every pending notification without blocking
    pub fn drain(&self) -> Vec<BackendEvent> {
        self.rx.try_iter().collect()
    }
}

/// External decode/playback engine
///
/// All methods must return promptly; results of `load` and transport changes
/// are reported later through the notifier passed to `load`.
pub trait PlaybackBackend: Send {
    /// Start loading a source. Any previous load is superseded.
    fn load(&mut self, locator: &str, notifier: BackendNotifier);

    /// Duration of the loaded source in seconds (0 when nothing is loaded)
    fn duration(&self) -> f64;

    /// Current playback time in seconds
    fn current_time(&self) -> f64;

    fn play(&mut self);

    fn pause(&mut self);

    fn set_time(&mut self, seconds: f64);

    /// Drop the current source, cancel pending loads, stop timers
    fn unload(&mut self);
}
