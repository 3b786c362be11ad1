//! Playback, zoom, and marker controls
//!
//! [`ControlMessage`] is everything the controls (and the waveform canvas)
//! can ask of the engine. The host keeps it inside its own message type and
//! hands it back to [`apply`] in its update function:
//!
//! ```ignore
//! Message::Control(msg) => {
//!     if let Err(e) = cuewave_widgets::apply(&mut self.engine, msg) {
//!         log::warn!("{}", e);
//!     }
//! }
//! ```

use cuewave_core::time_axis::format_time;
use cuewave_core::{EngineResult, EngineState, Region, RegionKind, WaveformEngine};
use iced::widget::{button, column, row, text, Space};
use iced::{Alignment, Element, Length};

use crate::theme::region_edge_color;

/// A user request for the engine
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    PlayPause,
    ZoomIn,
    ZoomOut,
    ZoomReset,
    /// Drop a region of this kind at the playback position
    AddMarker(RegionKind),
    /// Seek to a fraction of the track
    Seek(f64),
    /// Move the cursor of the synthetic display after a failed load
    SeekSynthetic(f64),
    UpdateRegion { id: String, start: f64, end: f64 },
    DeleteRegion(String),
    /// Jump to a region and play it
    PlayRegion(String),
    RetryLoad,
}

/// Dispatch a control message onto the engine
pub fn apply(engine: &mut WaveformEngine, message: ControlMessage) -> EngineResult<()> {
    log::debug!("Control: {:?}", message);
    match message {
        ControlMessage::PlayPause => engine.toggle_playback(),
        ControlMessage::ZoomIn => {
            engine.zoom_in();
            Ok(())
        }
        ControlMessage::ZoomOut => {
            engine.zoom_out();
            Ok(())
        }
        ControlMessage::ZoomReset => {
            engine.zoom_reset();
            Ok(())
        }
        ControlMessage::AddMarker(kind) => engine.add_marker(kind).map(|_| ()),
        ControlMessage::Seek(progress) => engine.seek_to_progress(progress),
        ControlMessage::SeekSynthetic(progress) => engine.seek_synthetic(progress),
        ControlMessage::UpdateRegion { id, start, end } => {
            engine.update_region(&id, start, end).map(|_| ())
        }
        ControlMessage::DeleteRegion(id) => engine.delete_region(&id),
        ControlMessage::PlayRegion(id) => engine.play_region(&id),
        ControlMessage::RetryLoad => engine.retry_load().map(|_| ()),
    }
}

/// Snapshot of what the controls show
#[derive(Debug, Clone, PartialEq)]
pub struct ControlsState {
    pub state: EngineState,
    pub is_playing: bool,
    /// Zoom level in pixels per second
    pub zoom: f64,
    pub can_play: bool,
    pub can_zoom_in: bool,
    pub can_zoom_out: bool,
    pub can_add_marker: bool,
    /// `m:ss` read-outs
    pub current_time: String,
    pub total_time: String,
    /// Displayed duration in seconds
    pub duration: f64,
    pub regions: Vec<Region>,
}

impl ControlsState {
    pub fn from_engine(engine: &WaveformEngine) -> Self {
        let state = engine.state();
        let zoom = engine.zoom();
        let limits = &engine.config().zoom;
        Self {
            state,
            is_playing: engine.is_playing(),
            zoom,
            can_play: state.has_audio() || state == EngineState::Error,
            can_zoom_in: zoom < limits.max,
            can_zoom_out: zoom > limits.min,
            can_add_marker: state.has_audio(),
            current_time: format_time(engine.position()),
            total_time: format_time(engine.duration()),
            duration: engine.duration(),
            regions: engine.regions(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.state == EngineState::Loading
    }

    /// Load failed and the synthetic waveform is shown
    pub fn show_retry(&self) -> bool {
        self.state == EngineState::Error
    }
}

/// Transport, zoom, and marker buttons plus the region list
pub fn controls_view<'a, Message>(
    state: &'a ControlsState,
    on_message: impl Fn(ControlMessage) -> Message + 'a,
) -> Element<'a, Message>
where
    Message: Clone + 'a,
{
    let enabled = |enabled: bool, msg: ControlMessage| enabled.then(|| on_message(msg));

    let play_label = if state.is_playing { "Pause" } else { "Play" };
    let transport = row![
        button(text(play_label)).on_press_maybe(enabled(state.can_play, ControlMessage::PlayPause)),
        text(format!("{} / {}", state.current_time, state.total_time)),
    ]
    .spacing(8)
    .align_y(Alignment::Center);

    let zoom = row![
        button(text("-")).on_press_maybe(enabled(state.can_zoom_out, ControlMessage::ZoomOut)),
        text(format!("{:.0} px/s", state.zoom)),
        button(text("+")).on_press_maybe(enabled(state.can_zoom_in, ControlMessage::ZoomIn)),
        button(text("Reset")).on_press(on_message(ControlMessage::ZoomReset)),
    ]
    .spacing(4)
    .align_y(Alignment::Center);

    let markers = row![
        button(text("Add Intro")).on_press_maybe(enabled(
            state.can_add_marker,
            ControlMessage::AddMarker(RegionKind::Intro)
        )),
        button(text("Add Outro")).on_press_maybe(enabled(
            state.can_add_marker,
            ControlMessage::AddMarker(RegionKind::Outro)
        )),
    ]
    .spacing(4);

    let mut toolbar = row![transport, Space::new().width(Length::Fill), zoom, markers]
        .spacing(16)
        .align_y(Alignment::Center);

    if state.is_loading() {
        toolbar = toolbar.push(text("Loading..."));
    }
    if state.show_retry() {
        toolbar = toolbar.push(
            row![
                text("Audio unavailable"),
                button(text("Retry")).on_press(on_message(ControlMessage::RetryLoad)),
            ]
            .spacing(4)
            .align_y(Alignment::Center),
        );
    }

    let regions = state.regions.iter().fold(column![].spacing(2), |col, region| {
        col.push(region_row(region, &on_message))
    });

    column![toolbar, regions].spacing(8).into()
}

fn region_row<'a, Message>(
    region: &'a Region,
    on_message: &impl Fn(ControlMessage) -> Message,
) -> Element<'a, Message>
where
    Message: Clone + 'a,
{
    row![
        text(&region.label).color(region_edge_color(region.kind)),
        text(format!(
            "{} - {}",
            format_time(region.start),
            format_time(region.end)
        )),
        button(text("Play")).on_press(on_message(ControlMessage::PlayRegion(region.id.clone()))),
        button(text("Delete"))
            .on_press(on_message(ControlMessage::DeleteRegion(region.id.clone()))),
    ]
    .spacing(8)
    .align_y(Alignment::Center)
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cuewave_core::backend::{BackendCommand, ManualBackend, ManualHandle};
    use cuewave_core::config::EngineConfig;
    use cuewave_core::{EngineError, RegionStore, TrackRef, WaveformBuffer};
    use std::sync::Arc;

    fn ready_engine(duration: f64) -> (WaveformEngine, ManualHandle) {
        let (backend, handle) = ManualBackend::new();
        let mut engine = WaveformEngine::new(
            EngineConfig::default(),
            Box::new(backend),
            Arc::new(RegionStore::new()),
        );
        engine.load_source(TrackRef::new("t1", "/music/t1.flac"));
        handle.finish_load(WaveformBuffer::new(vec![0.5; 100], duration));
        engine.tick();
        (engine, handle)
    }

    #[test]
    fn test_apply_transport_and_zoom() {
        let (mut engine, handle) = ready_engine(120.0);
        handle.clear_commands();

        apply(&mut engine, ControlMessage::Seek(0.5)).unwrap();
        apply(&mut engine, ControlMessage::PlayPause).unwrap();
        assert!(engine.is_playing());
        apply(&mut engine, ControlMessage::PlayPause).unwrap();
        assert!(!engine.is_playing());
        assert_eq!(
            handle.commands(),
            vec![
                BackendCommand::SetTime(60.0),
                BackendCommand::Play,
                BackendCommand::Pause
            ]
        );

        apply(&mut engine, ControlMessage::ZoomIn).unwrap();
        assert_eq!(engine.zoom(), 100.0);
        apply(&mut engine, ControlMessage::ZoomReset).unwrap();
        assert_eq!(engine.zoom(), 50.0);
    }

    #[test]
    fn test_apply_region_messages() {
        let (mut engine, _handle) = ready_engine(120.0);
        apply(&mut engine, ControlMessage::AddMarker(RegionKind::Intro)).unwrap();
        let id = engine.regions()[0].id.clone();

        apply(
            &mut engine,
            ControlMessage::UpdateRegion {
                id: id.clone(),
                start: 8.0,
                end: 4.0,
            },
        )
        .unwrap();
        let region = &engine.regions()[0];
        assert_eq!((region.start, region.end), (4.0, 8.0));

        apply(&mut engine, ControlMessage::PlayRegion(id.clone())).unwrap();
        assert_eq!(engine.position(), 4.0);

        apply(&mut engine, ControlMessage::DeleteRegion(id.clone())).unwrap();
        assert_eq!(
            apply(&mut engine, ControlMessage::DeleteRegion(id.clone())),
            Err(EngineError::NotFound(id))
        );
    }

    #[test]
    fn test_apply_rejections_are_reported() {
        let (backend, _handle) = ManualBackend::new();
        let mut engine = WaveformEngine::new(
            EngineConfig::default(),
            Box::new(backend),
            Arc::new(RegionStore::new()),
        );
        assert!(matches!(
            apply(&mut engine, ControlMessage::Seek(0.2)),
            Err(EngineError::InvalidState { .. })
        ));
        assert!(apply(&mut engine, ControlMessage::RetryLoad).is_err());
    }

    #[test]
    fn test_controls_state_snapshot() {
        let (mut engine, handle) = ready_engine(200.0);
        handle.report_time(65.0);
        engine.tick();
        engine.add_marker(RegionKind::Outro).unwrap();

        let state = ControlsState::from_engine(&engine);
        assert_eq!(state.state, EngineState::Ready);
        assert!(state.can_play);
        assert!(state.can_add_marker);
        assert!(state.can_zoom_in);
        assert!(state.can_zoom_out);
        assert_eq!(state.current_time, "1:05");
        assert_eq!(state.total_time, "3:20");
        assert_eq!(state.regions.len(), 1);
        assert!(!state.show_retry());
    }

    #[test]
    fn test_controls_state_after_failure() {
        let (backend, handle) = ManualBackend::new();
        let mut engine = WaveformEngine::new(
            EngineConfig::default(),
            Box::new(backend),
            Arc::new(RegionStore::new()),
        );
        engine.load_source(TrackRef::new("t1", "https://cdn.example.com/t1.mp3"));
        assert!(ControlsState::from_engine(&engine).is_loading());

        handle.fail_load("unreachable");
        engine.tick();
        engine.zoom_out();

        apply(&mut engine, ControlMessage::SeekSynthetic(0.5)).unwrap();
        assert!(apply(&mut engine, ControlMessage::Seek(0.5)).is_err());

        let state = ControlsState::from_engine(&engine);
        assert!(state.show_retry());
        assert_eq!(state.current_time, "1:30");
        assert!(state.can_play, "synthetic playback stays available");
        assert!(!state.can_add_marker);
        assert!(!state.can_zoom_out);
        assert_eq!(state.total_time, "3:00");
    }
}
