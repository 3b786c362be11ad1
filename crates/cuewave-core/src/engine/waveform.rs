//! The waveform engine: state machine, zoom, regions, and render cache

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use super::EngineState;
use crate::backend::{
    BackendEventKind, BackendEvents, FileBackend, LoadToken, PlaybackBackend,
};
use crate::config::EngineConfig;
use crate::error::{check_time, EngineError, EngineResult};
use crate::events::{EngineEvent, Listeners, Subscription};
use crate::region::{Region, RegionEventKind, RegionKind, RegionStore};
use crate::render::{render, RenderFrame, RenderParams};
use crate::synthetic::{self, SyntheticPlayback, SyntheticTick};
use crate::time_axis::check_zoom;
use crate::types::{TrackId, TrackRef, WaveformBuffer};

/// Last rendered frame and the container size it was rendered for
struct CachedFrame {
    width: f32,
    height: f32,
    frame: Arc<RenderFrame>,
}

/// Waveform display engine for one track at a time
///
/// All methods run on the caller's thread and return immediately. Backend
/// notifications queue up on a channel and are applied by [`tick`], which
/// the host calls once per frame; the same call advances synthetic playback.
///
/// Every load gets a fresh [`LoadToken`]. Notifications carrying an older
/// token belong to a superseded load and are dropped.
///
/// [`tick`]: WaveformEngine::tick
pub struct WaveformEngine {
    config: EngineConfig,
    backend: Box<dyn PlaybackBackend>,
    events: BackendEvents,
    regions: Arc<RegionStore>,
    listeners: Listeners<EngineEvent>,

    token: LoadToken,
    state: EngineState,
    track: Option<TrackRef>,
    /// Track whose region changes are forwarded to our listeners
    shown_track: Arc<RwLock<Option<TrackId>>>,

    buffer: Option<WaveformBuffer>,
    synthetic: Option<WaveformBuffer>,
    synthetic_playback: SyntheticPlayback,

    zoom: f64,
    position: f64,
    duration: f64,

    dirty: Arc<AtomicBool>,
    cached: Option<CachedFrame>,
    _region_forward: Subscription,
}

impl WaveformEngine {
    /// Create an idle engine
    ///
    /// The region store may be shared with other engines; regions are keyed
    /// by track id, so each engine only sees the track it is showing.
    pub fn new(
        config: EngineConfig,
        backend: Box<dyn PlaybackBackend>,
        regions: Arc<RegionStore>,
    ) -> Self {
        let config = config.sanitized();
        let listeners = Listeners::new();
        let shown_track: Arc<RwLock<Option<TrackId>>> = Arc::new(RwLock::new(None));
        let dirty = Arc::new(AtomicBool::new(true));

        let region_forward = {
            let listeners = listeners.clone();
            let shown_track = Arc::clone(&shown_track);
            let dirty = Arc::clone(&dirty);
            regions.subscribe(move |event| {
                let shown = shown_track.read().unwrap_or_else(PoisonError::into_inner);
                if shown.as_ref() != Some(&event.track_id) {
                    return;
                }
                dirty.store(true, Ordering::Relaxed);
                listeners.emit(&match &event.kind {
                    RegionEventKind::Added(region) => EngineEvent::RegionAdded(region.clone()),
                    RegionEventKind::Updated(region) => EngineEvent::RegionUpdated(region.clone()),
                    RegionEventKind::Deleted(id) => EngineEvent::RegionDeleted(id.clone()),
                });
            })
        };

        Self {
            zoom: config.zoom.default,
            synthetic_playback: SyntheticPlayback::new(config.synthetic.progress_step),
            config,
            backend,
            events: BackendEvents::new(),
            regions,
            listeners,
            token: LoadToken::default(),
            state: EngineState::Idle,
            track: None,
            shown_track,
            buffer: None,
            synthetic: None,
            position: 0.0,
            duration: 0.0,
            dirty,
            cached: None,
            _region_forward: region_forward,
        }
    }

    /// Create an engine that decodes local files in the background
    pub fn with_file_backend(
        config: EngineConfig,
        regions: Arc<RegionStore>,
    ) -> std::io::Result<Self> {
        let backend = FileBackend::spawn(config.peaks_per_second)?;
        Ok(Self::new(config, Box::new(backend), regions))
    }

    /// Register a listener for engine notifications
    #[must_use = "dropping the subscription unregisters the listener immediately"]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Source lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Bind a new source and start loading it
    ///
    /// Valid in every state. Playback of the previous source stops, its
    /// buffer is discarded and zoom returns to the default. Regions of the
    /// previous track stay in the store.
    pub fn load_source(&mut self, track: TrackRef) -> LoadToken {
        self.stop_playback();

        self.token = self.token.next();
        log::debug!(
            "Loading {} ({}) as load {}",
            track.id,
            track.locator,
            self.token
        );

        self.reset_display();
        self.set_shown_track(Some(track.id.clone()));
        self.backend
            .load(&track.locator, self.events.notifier(self.token));
        self.track = Some(track);
        self.set_state(EngineState::Loading);
        self.token
    }

    /// Load the current source again after a failure
    pub fn retry_load(&mut self) -> EngineResult<LoadToken> {
        if self.state != EngineState::Error {
            return Err(self.invalid_state("retry load"));
        }
        let track = self
            .track
            .clone()
            .ok_or_else(|| self.invalid_state("retry load"))?;
        log::info!("Retrying load of {}", track.id);
        Ok(self.load_source(track))
    }

    /// Release the source and return to idle
    ///
    /// Pending loads are cancelled and late notifications for them ignored.
    pub fn unload(&mut self) {
        self.stop_playback();
        self.backend.unload();
        self.token = self.token.next();
        self.reset_display();
        self.set_shown_track(None);
        self.track = None;
        self.set_state(EngineState::Idle);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────────────

    /// Start playback
    ///
    /// In the error state this plays the synthetic display instead.
    pub fn play(&mut self) -> EngineResult<()> {
        match self.state {
            EngineState::Ready | EngineState::Paused => {
                self.backend.play();
                self.set_state(EngineState::Playing);
                self.listeners.emit(&EngineEvent::PlayStateChanged(true));
                Ok(())
            }
            EngineState::Playing => Ok(()),
            EngineState::Error => {
                if !self.synthetic_playback.is_playing() {
                    self.synthetic_playback.play();
                    self.listeners.emit(&EngineEvent::PlayStateChanged(true));
                }
                Ok(())
            }
            EngineState::Idle | EngineState::Loading => Err(self.invalid_state("play")),
        }
    }

    pub fn pause(&mut self) -> EngineResult<()> {
        match self.state {
            EngineState::Playing => {
                self.backend.pause();
                self.set_state(EngineState::Paused);
                self.listeners.emit(&EngineEvent::PlayStateChanged(false));
                Ok(())
            }
            EngineState::Ready | EngineState::Paused => Ok(()),
            EngineState::Error => {
                if self.synthetic_playback.is_playing() {
                    self.synthetic_playback.pause();
                    self.listeners.emit(&EngineEvent::PlayStateChanged(false));
                }
                Ok(())
            }
            EngineState::Idle | EngineState::Loading => Err(self.invalid_state("pause")),
        }
    }

    /// Play/pause key
    pub fn toggle_playback(&mut self) -> EngineResult<()> {
        if self.is_playing() {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Move the playback position
    ///
    /// Only valid with real audio loaded; times past the end are clamped.
    pub fn seek(&mut self, seconds: f64) -> EngineResult<()> {
        if !self.state.has_audio() {
            return Err(self.invalid_state("seek"));
        }
        let seconds = check_time(seconds, "seek time")?.min(self.duration);
        self.backend.set_time(seconds);
        self.set_position(seconds);
        Ok(())
    }

    /// Seek to a fraction of the track (click-to-seek)
    pub fn seek_to_progress(&mut self, progress: f64) -> EngineResult<()> {
        if !progress.is_finite() {
            return Err(EngineError::InvalidArgument(
                "seek progress is not finite".into(),
            ));
        }
        self.seek(progress.clamp(0.0, 1.0) * self.duration)
    }

    /// Move the cursor of the synthetic display shown after a load failure
    ///
    /// Only valid in the error state; [`seek`](Self::seek) keeps rejecting
    /// it there since no real audio is loaded.
    pub fn seek_synthetic(&mut self, progress: f64) -> EngineResult<()> {
        if self.state != EngineState::Error {
            return Err(self.invalid_state("seek synthetic display"));
        }
        if !progress.is_finite() {
            return Err(EngineError::InvalidArgument(
                "seek progress is not finite".into(),
            ));
        }
        self.synthetic_playback.seek(progress);
        self.mark_dirty();
        self.listeners.emit(&EngineEvent::TimeUpdate(self.position()));
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Zoom
    // ─────────────────────────────────────────────────────────────────────

    /// Set the zoom level, clamped to the configured range
    ///
    /// Returns the level actually applied.
    pub fn set_zoom(&mut self, level: f64) -> EngineResult<f64> {
        let level = check_zoom(level)?;
        Ok(self.apply_zoom(level))
    }

    pub fn zoom_in(&mut self) -> f64 {
        self.apply_zoom(self.zoom + self.config.zoom.step)
    }

    pub fn zoom_out(&mut self) -> f64 {
        self.apply_zoom(self.zoom - self.config.zoom.step)
    }

    pub fn zoom_reset(&mut self) -> f64 {
        self.apply_zoom(self.config.zoom.default)
    }

    fn apply_zoom(&mut self, level: f64) -> f64 {
        let level = self.config.zoom.clamp(level);
        if level != self.zoom {
            log::debug!("Zoom {} -> {} px/s", self.zoom, level);
            self.zoom = level;
            self.mark_dirty();
        }
        level
    }

    // ─────────────────────────────────────────────────────────────────────
    // Regions
    // ─────────────────────────────────────────────────────────────────────

    /// Drop a marker region at the playback position
    ///
    /// The region starts at the playback position and spans the configured
    /// marker length, cut short by the end of the track. Only a marker placed
    /// exactly at the end, where nothing is left to span, starts earlier.
    pub fn add_marker(&mut self, kind: RegionKind) -> EngineResult<Region> {
        if !self.state.has_audio() {
            return Err(self.invalid_state("add marker"));
        }
        let track_id = self.current_track_id("add marker")?;
        let span = self.config.marker_span_secs;

        let mut start = self.position;
        let end = (start + span).min(self.duration);
        if end <= start {
            start = (end - span).max(0.0);
        }
        self.regions.add_region(&track_id, start, end, kind)
    }

    /// Move a region of the current track
    pub fn update_region(&mut self, id: &str, start: f64, end: f64) -> EngineResult<Region> {
        let track_id = self.current_track_id("update region")?;
        self.regions.update_region(&track_id, id, start, end)
    }

    pub fn delete_region(&mut self, id: &str) -> EngineResult<()> {
        let track_id = self.current_track_id("delete region")?;
        self.regions.delete_region(&track_id, id)
    }

    /// Jump to a region's start and play from there
    pub fn play_region(&mut self, id: &str) -> EngineResult<()> {
        let track_id = self.current_track_id("play region")?;
        let region = self
            .regions
            .get_region(&track_id, id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        self.seek(region.start)?;
        self.play()
    }

    /// Regions of the current track, in insertion order
    pub fn regions(&self) -> Vec<Region> {
        self.track
            .as_ref()
            .map(|track| self.regions.list_regions(&track.id))
            .unwrap_or_default()
    }

    pub fn region_store(&self) -> &Arc<RegionStore> {
        &self.regions
    }

    // ─────────────────────────────────────────────────────────────────────
    // Backend notifications
    // ─────────────────────────────────────────────────────────────────────

    /// Apply queued backend notifications and advance synthetic playback
    ///
    /// Call once per frame. Returns `true` when the display needs a redraw.
    pub fn tick(&mut self) -> bool {
        for event in self.events.drain() {
            match event.kind {
                BackendEventKind::Ready(buffer) => {
                    self.on_ready(event.token, buffer);
                }
                BackendEventKind::Error(reason) => {
                    self.on_error(event.token, &reason);
                }
                BackendEventKind::PlayingChanged(playing) => {
                    self.on_playing_changed(event.token, playing);
                }
                BackendEventKind::TimeUpdate(seconds) => {
                    self.on_time_update(event.token, seconds);
                }
            }
        }

        if self.state == EngineState::Error {
            self.advance_synthetic();
        }

        self.dirty.load(Ordering::Relaxed)
    }

    /// The backend finished loading
    ///
    /// Returns `false` when the notification was stale or unexpected.
    pub fn on_ready(&mut self, token: LoadToken, buffer: WaveformBuffer) -> bool {
        if self.is_stale(token, "ready") {
            return false;
        }
        if self.state != EngineState::Loading {
            log::debug!("Ignoring ready for load {} while {}", token, self.state);
            return false;
        }

        self.duration = buffer.duration();
        self.position = 0.0;
        self.zoom = self.config.zoom.default;
        log::info!(
            "Load {} ready: {:.2}s, {} peaks",
            token,
            self.duration,
            buffer.len()
        );
        self.buffer = Some(buffer);
        self.mark_dirty();
        self.set_state(EngineState::Ready);
        self.listeners.emit(&EngineEvent::Ready {
            duration: self.duration,
        });
        true
    }

    /// The backend failed to load the source
    ///
    /// Switches the display to a synthetic waveform.
    pub fn on_error(&mut self, token: LoadToken, reason: &str) -> bool {
        if self.is_stale(token, "error") {
            return false;
        }
        if self.state == EngineState::Idle {
            return false;
        }

        let locator = self
            .track
            .as_ref()
            .map(|track| track.locator.as_str())
            .unwrap_or_default();
        log::warn!("Load {} of {} failed: {}", token, locator, reason);

        let was_playing = self.state == EngineState::Playing;
        self.buffer = None;
        self.position = 0.0;
        self.duration = 0.0;
        self.synthetic = Some(synthetic::generate(
            synthetic::seed_for(locator),
            self.config.synthetic.sample_count,
            self.config.synthetic.duration_secs,
        ));
        self.synthetic_playback = SyntheticPlayback::new(self.config.synthetic.progress_step);
        self.mark_dirty();

        self.set_state(EngineState::Error);
        if was_playing {
            self.listeners.emit(&EngineEvent::PlayStateChanged(false));
        }
        self.listeners.emit(&EngineEvent::LoadError {
            reason: EngineError::LoadFailure(reason.to_string()).to_string(),
        });
        true
    }

    /// The backend reported a playback time
    pub fn on_time_update(&mut self, token: LoadToken, seconds: f64) -> bool {
        if self.is_stale(token, "time update") || !self.state.has_audio() {
            return false;
        }
        if !seconds.is_finite() {
            return false;
        }
        self.set_position(seconds.clamp(0.0, self.duration));
        true
    }

    /// The backend started or stopped playing
    ///
    /// Transitions the engine already made optimistically are not repeated.
    pub fn on_playing_changed(&mut self, token: LoadToken, playing: bool) -> bool {
        if self.is_stale(token, "playing change") {
            return false;
        }
        match (self.state, playing) {
            (EngineState::Ready | EngineState::Paused, true) => {
                self.set_state(EngineState::Playing);
                self.listeners.emit(&EngineEvent::PlayStateChanged(true));
                true
            }
            (EngineState::Playing, false) => {
                self.set_state(EngineState::Paused);
                self.listeners.emit(&EngineEvent::PlayStateChanged(false));
                true
            }
            _ => false,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Display
    // ─────────────────────────────────────────────────────────────────────

    /// Frame for a container of the given size
    ///
    /// Re-rendered only when something visible changed since the last call
    /// or the size differs; otherwise the cached frame is returned.
    pub fn frame(&mut self, width: f32, height: f32) -> Arc<RenderFrame> {
        let dirty = self.dirty.swap(false, Ordering::Relaxed);
        if let Some(cached) = &self.cached {
            if !dirty && cached.width == width && cached.height == height {
                return Arc::clone(&cached.frame);
            }
        }

        let frame = Arc::new(self.render_frame(width, height));
        self.cached = Some(CachedFrame {
            width,
            height,
            frame: Arc::clone(&frame),
        });
        frame
    }

    fn render_frame(&self, width: f32, height: f32) -> RenderFrame {
        let Some(buffer) = self.display_buffer() else {
            return RenderFrame {
                width,
                height,
                ..RenderFrame::default()
            };
        };
        let params = RenderParams::new(self.zoom, self.progress(), width, height)
            .with_bar_style(self.config.style.bar_width, self.config.style.bar_gap);
        // Synthetic display has no real regions to show
        let regions = if self.state.has_audio() {
            self.regions()
        } else {
            Vec::new()
        };

        match render(buffer, &params, &regions) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Render failed: {}", e);
                RenderFrame {
                    width,
                    height,
                    ..RenderFrame::default()
                }
            }
        }
    }

    /// Buffer currently fed to the renderer
    ///
    /// Decoded peaks once loaded, the synthetic waveform after a load
    /// failure, nothing while idle or loading.
    pub fn display_buffer(&self) -> Option<&WaveformBuffer> {
        match self.state {
            EngineState::Error => self.synthetic.as_ref(),
            EngineState::Ready | EngineState::Playing | EngineState::Paused => {
                self.buffer.as_ref()
            }
            EngineState::Idle | EngineState::Loading => None,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn track(&self) -> Option<&TrackRef> {
        self.track.as_ref()
    }

    pub fn token(&self) -> LoadToken {
        self.token
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Zoom level in pixels per second
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Real or synthetic playback is running
    pub fn is_playing(&self) -> bool {
        self.state == EngineState::Playing || self.synthetic_playback.is_playing()
    }

    /// Displayed playback position in seconds
    ///
    /// Follows the synthetic clock while in the error state.
    pub fn position(&self) -> f64 {
        if self.state == EngineState::Error {
            self.synthetic_playback.progress() * self.duration()
        } else {
            self.position
        }
    }

    /// Displayed duration in seconds (the synthetic one in the error state)
    pub fn duration(&self) -> f64 {
        if self.state == EngineState::Error {
            self.synthetic
                .as_ref()
                .map(WaveformBuffer::duration)
                .unwrap_or(0.0)
        } else {
            self.duration
        }
    }

    /// Playback progress ratio in `[0, 1]`
    pub fn progress(&self) -> f64 {
        if self.state == EngineState::Error {
            return self.synthetic_playback.progress();
        }
        if self.duration > 0.0 {
            (self.position / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    fn set_state(&mut self, state: EngineState) {
        if self.state == state {
            return;
        }
        log::debug!("Engine state {} -> {}", self.state, state);
        self.state = state;
        self.mark_dirty();
        self.listeners.emit(&EngineEvent::StateChanged(state));
    }

    fn set_position(&mut self, seconds: f64) {
        if seconds != self.position {
            self.position = seconds;
            self.mark_dirty();
        }
        self.listeners.emit(&EngineEvent::TimeUpdate(seconds));
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Relaxed);
    }

    fn is_stale(&self, token: LoadToken, what: &str) -> bool {
        if token != self.token {
            log::debug!(
                "Dropping stale {} from load {} (current load {})",
                what,
                token,
                self.token
            );
            return true;
        }
        false
    }

    fn invalid_state(&self, command: &'static str) -> EngineError {
        log::debug!("Rejected {} while {}", command, self.state);
        EngineError::InvalidState {
            command,
            state: self.state.name(),
        }
    }

    fn current_track_id(&self, command: &'static str) -> EngineResult<TrackId> {
        self.track
            .as_ref()
            .map(|track| track.id.clone())
            .ok_or_else(|| self.invalid_state(command))
    }

    fn set_shown_track(&self, track_id: Option<TrackId>) {
        *self
            .shown_track
            .write()
            .unwrap_or_else(PoisonError::into_inner) = track_id;
    }

    /// Stop real and synthetic playback, notifying listeners once
    fn stop_playback(&mut self) {
        let was_playing = self.is_playing();
        if self.state == EngineState::Playing {
            self.backend.pause();
        }
        self.synthetic_playback.stop();
        if was_playing {
            self.listeners.emit(&EngineEvent::PlayStateChanged(false));
        }
    }

    fn reset_display(&mut self) {
        self.buffer = None;
        self.synthetic = None;
        self.synthetic_playback = SyntheticPlayback::new(self.config.synthetic.progress_step);
        self.position = 0.0;
        self.duration = 0.0;
        self.zoom = self.config.zoom.default;
        self.mark_dirty();
    }

    fn advance_synthetic(&mut self) {
        match self.synthetic_playback.advance_frame() {
            SyntheticTick::Idle => {}
            SyntheticTick::Advanced => {
                self.mark_dirty();
                self.listeners.emit(&EngineEvent::TimeUpdate(self.position()));
            }
            SyntheticTick::Finished => {
                log::debug!("Synthetic playback finished");
                self.mark_dirty();
                self.listeners.emit(&EngineEvent::PlayStateChanged(false));
                self.listeners.emit(&EngineEvent::TimeUpdate(0.0));
            }
        }
    }
}

impl Drop for WaveformEngine {
    fn drop(&mut self) {
        self.synthetic_playback.stop();
        self.backend.unload();
        self.listeners.clear();
        log::debug!("Waveform engine dropped at load {}", self.token);
    }
}
