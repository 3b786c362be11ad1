//! Canvas program drawing a rendered waveform frame
//!
//! The engine does the layout ([`RenderFrame`]); this program only paints it
//! and turns mouse input into [`ControlMessage`]s:
//!
//! - click on the waveform seeks (the synthetic display too)
//! - click inside a region plays it
//! - drag a region edge to resize it, or its body to move it (published on
//!   release)
//! - mouse wheel zooms

use cuewave_core::render::{BarFill, RenderFrame};
use cuewave_core::{EngineState, Region};
use iced::alignment::{Horizontal, Vertical};
use iced::widget::canvas::{self, Event, Frame, Geometry, Path, Program, Stroke, Text};
use iced::{mouse, Point, Rectangle, Size, Theme};

use crate::controls::ControlMessage;
use crate::theme::{
    region_color, region_edge_color, WaveformColors, FALLBACK_BANNER, LOADING_COLOR, RULER_COLOR,
};

/// How close (in pixels) the mouse must be to grab a region edge
pub const EDGE_GRAB_PX: f32 = 4.0;

/// Pointer travel (in pixels) that turns a press on a region into a drag
pub const DRAG_THRESHOLD_PX: f32 = 3.0;

const MAJOR_TICK_PX: f32 = 10.0;
const MINOR_TICK_PX: f32 = 5.0;

/// What the canvas is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayStatus {
    /// No source
    Empty,
    Loading,
    /// Decoded waveform
    Ready,
    /// Synthetic waveform after a failed load
    Fallback,
}

impl DisplayStatus {
    pub fn from_state(state: EngineState) -> Self {
        match state {
            EngineState::Idle => DisplayStatus::Empty,
            EngineState::Loading => DisplayStatus::Loading,
            EngineState::Ready | EngineState::Playing | EngineState::Paused => {
                DisplayStatus::Ready
            }
            EngineState::Error => DisplayStatus::Fallback,
        }
    }
}

/// Which end of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionEdge {
    Start,
    End,
}

/// Part of a region being dragged
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragMode {
    Edge(RegionEdge),
    /// The whole region, grabbed at this time
    Body { grab_time: f64 },
}

/// A region being resized or moved
#[derive(Debug, Clone, PartialEq)]
pub struct RegionDrag {
    pub id: String,
    pub mode: DragMode,
    pub start: f64,
    pub end: f64,
    /// Bounds when the drag began
    origin: (f64, f64),
    duration: f64,
    press_x: f32,
    moved: bool,
}

impl RegionDrag {
    pub fn new(region: &Region, mode: DragMode, duration: f64, press_x: f32) -> Self {
        Self {
            id: region.id.clone(),
            mode,
            start: region.start,
            end: region.end,
            origin: (region.start, region.end),
            duration,
            press_x,
            moved: false,
        }
    }

    /// Follow the pointer to `time` (seconds)
    ///
    /// An edge follows the pointer; a moved body keeps its length and stays
    /// inside `[0, duration]`.
    pub fn move_to(&mut self, time: f64) {
        match self.mode {
            DragMode::Edge(RegionEdge::Start) => self.start = time,
            DragMode::Edge(RegionEdge::End) => self.end = time,
            DragMode::Body { grab_time } => {
                let (start, end) = self.origin;
                let length = end - start;
                let latest = (self.duration - length).max(0.0);
                let start = (start + time - grab_time).clamp(0.0, latest);
                self.start = start;
                self.end = start + length;
            }
        }
    }

    /// Record pointer travel since the press
    pub fn track_pointer(&mut self, x: f32) {
        if (x - self.press_x).abs() > DRAG_THRESHOLD_PX {
            self.moved = true;
        }
    }

    pub fn has_moved(&self) -> bool {
        self.moved
    }

    /// Message to publish when the mouse is released
    ///
    /// A press on a body that never turned into a drag is a click and plays
    /// the region.
    pub fn finish(self) -> Option<ControlMessage> {
        match (self.mode, self.moved) {
            (_, true) => Some(ControlMessage::UpdateRegion {
                id: self.id,
                start: self.start,
                end: self.end,
            }),
            (DragMode::Body { .. }, false) => Some(ControlMessage::PlayRegion(self.id)),
            (DragMode::Edge(_), false) => None,
        }
    }
}

/// Mouse interaction state kept by iced between events
#[derive(Debug, Clone, Default)]
pub struct WaveformInteraction {
    pub drag: Option<RegionDrag>,
}

/// What lies under the mouse
#[derive(Debug, Clone, PartialEq)]
pub enum Hit<'a> {
    Edge(&'a Region, RegionEdge),
    Body(&'a Region),
    Waveform,
}

/// Find the region edge or body at a frame x position
///
/// Edges win over bodies so that a short region can still be resized.
pub fn hit_test<'a>(frame: &RenderFrame, regions: &'a [Region], x: f32) -> Hit<'a> {
    for region in regions {
        let start_x = frame.x_at(region.start);
        let end_x = frame.x_at(region.end);
        if (x - start_x).abs() <= EDGE_GRAB_PX {
            return Hit::Edge(region, RegionEdge::Start);
        }
        if (x - end_x).abs() <= EDGE_GRAB_PX {
            return Hit::Edge(region, RegionEdge::End);
        }
    }
    regions
        .iter()
        .find(|region| x >= frame.x_at(region.start) && x <= frame.x_at(region.end))
        .map(Hit::Body)
        .unwrap_or(Hit::Waveform)
}

/// Horizontal factor between the frame's layout width and the canvas
pub fn horizontal_scale(frame: &RenderFrame, bounds_width: f32) -> f32 {
    if frame.width > 0.0 && bounds_width > 0.0 {
        bounds_width / frame.width
    } else {
        1.0
    }
}

/// Track progress ratio under a frame x position
pub fn progress_at(frame: &RenderFrame, duration: f64, x: f32) -> f64 {
    if duration <= 0.0 {
        return 0.0;
    }
    (frame.time_at(x) / duration).clamp(0.0, 1.0)
}

/// Canvas program for one waveform display
pub struct WaveformCanvas<'a, Message, F>
where
    F: Fn(ControlMessage) -> Message,
{
    pub frame: &'a RenderFrame,
    /// Regions of the displayed track (full bounds, not clipped)
    pub regions: &'a [Region],
    pub colors: WaveformColors,
    pub status: DisplayStatus,
    /// Track duration in seconds
    pub duration: f64,
    pub on_message: F,
}

impl<'a, Message, F> WaveformCanvas<'a, Message, F>
where
    F: Fn(ControlMessage) -> Message,
{
    /// Regions are only interactive over decoded audio
    fn interactive_regions(&self) -> &'a [Region] {
        if self.status == DisplayStatus::Ready {
            self.regions
        } else {
            &[]
        }
    }
}

impl<'a, Message, F> Program<Message> for WaveformCanvas<'a, Message, F>
where
    Message: Clone,
    F: Fn(ControlMessage) -> Message,
{
    type State = WaveformInteraction;

    fn update(
        &self,
        interaction: &mut Self::State,
        event: &Event,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> Option<canvas::Action<Message>> {
        let scale = horizontal_scale(self.frame, bounds.width);

        match event {
            Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                let position = cursor.position_in(bounds)?;
                if self.frame.is_empty() {
                    return None;
                }
                let x = position.x / scale;
                let seek: fn(f64) -> ControlMessage = match self.status {
                    DisplayStatus::Ready => ControlMessage::Seek,
                    DisplayStatus::Fallback => ControlMessage::SeekSynthetic,
                    DisplayStatus::Empty | DisplayStatus::Loading => return None,
                };
                let (region, mode) = match hit_test(self.frame, self.interactive_regions(), x) {
                    Hit::Edge(region, edge) => (region, DragMode::Edge(edge)),
                    Hit::Body(region) => (
                        region,
                        DragMode::Body {
                            grab_time: self.frame.time_at(x),
                        },
                    ),
                    Hit::Waveform => {
                        let progress = progress_at(self.frame, self.duration, x);
                        return Some(canvas::Action::publish((self.on_message)(seek(progress))));
                    }
                };
                interaction.drag = Some(RegionDrag::new(region, mode, self.duration, x));
                Some(canvas::Action::request_redraw().and_capture())
            }
            Event::Mouse(mouse::Event::CursorMoved { .. }) => {
                let drag = interaction.drag.as_mut()?;
                let position = cursor.position_in(bounds)?;
                let x = position.x / scale;
                drag.track_pointer(x);
                if !drag.has_moved() {
                    return None;
                }
                drag.move_to(self.frame.time_at(x));
                Some(canvas::Action::request_redraw())
            }
            Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => {
                let drag = interaction.drag.take()?;
                match drag.finish() {
                    Some(message) => Some(canvas::Action::publish((self.on_message)(message))),
                    None => Some(canvas::Action::request_redraw()),
                }
            }
            Event::Mouse(mouse::Event::WheelScrolled { delta }) => {
                if !cursor.is_over(bounds) {
                    return None;
                }
                let y = match delta {
                    mouse::ScrollDelta::Lines { y, .. } => *y,
                    mouse::ScrollDelta::Pixels { y, .. } => *y,
                };
                let message = if y > 0.0 {
                    ControlMessage::ZoomIn
                } else if y < 0.0 {
                    ControlMessage::ZoomOut
                } else {
                    return None;
                };
                Some(canvas::Action::publish((self.on_message)(message)).and_capture())
            }
            _ => None,
        }
    }

    fn mouse_interaction(
        &self,
        interaction: &Self::State,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> mouse::Interaction {
        if let Some(drag) = &interaction.drag {
            return match drag.mode {
                DragMode::Edge(_) => mouse::Interaction::ResizingHorizontally,
                DragMode::Body { .. } => mouse::Interaction::Grabbing,
            };
        }
        let Some(position) = cursor.position_in(bounds) else {
            return mouse::Interaction::default();
        };
        if !matches!(self.status, DisplayStatus::Ready | DisplayStatus::Fallback) {
            return mouse::Interaction::default();
        }
        let x = position.x / horizontal_scale(self.frame, bounds.width);
        match hit_test(self.frame, self.interactive_regions(), x) {
            Hit::Edge(..) => mouse::Interaction::ResizingHorizontally,
            Hit::Body(_) => mouse::Interaction::Grab,
            Hit::Waveform => mouse::Interaction::Pointer,
        }
    }

    fn draw(
        &self,
        interaction: &Self::State,
        renderer: &iced::Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        frame.fill_rectangle(Point::ORIGIN, bounds.size(), self.colors.background);

        let width = bounds.width;
        let height = bounds.height;

        match self.status {
            DisplayStatus::Empty => return vec![frame.into_geometry()],
            DisplayStatus::Loading => {
                frame.fill_rectangle(
                    Point::new(width * 0.3, height / 2.0 - 2.0),
                    Size::new(width * 0.4, 4.0),
                    LOADING_COLOR,
                );
                return vec![frame.into_geometry()];
            }
            DisplayStatus::Ready | DisplayStatus::Fallback => {}
        }

        let sx = horizontal_scale(self.frame, width);
        let sy = if self.frame.height > 0.0 {
            height / self.frame.height
        } else {
            1.0
        };

        for tick in &self.frame.ticks {
            let x = tick.x * sx;
            let length = if tick.is_major() {
                MAJOR_TICK_PX
            } else {
                MINOR_TICK_PX
            };
            frame.stroke(
                &Path::line(Point::new(x, 0.0), Point::new(x, length)),
                Stroke::default().with_color(RULER_COLOR).with_width(1.0),
            );
            if let Some(label) = &tick.label {
                frame.fill_text(Text {
                    content: label.clone(),
                    position: Point::new(x + 2.0, MAJOR_TICK_PX),
                    size: 10.0.into(),
                    color: RULER_COLOR,
                    align_x: Horizontal::Left.into(),
                    align_y: Vertical::Top.into(),
                    ..Text::default()
                });
            }
        }

        for bar in &self.frame.bars {
            let color = match bar.fill {
                BarFill::Played => self.colors.progress,
                BarFill::Unplayed => self.colors.wave,
            };
            frame.fill_rectangle(
                Point::new(bar.x * sx, bar.y * sy),
                Size::new(bar.width * sx, bar.height * sy),
                color,
            );
        }

        for overlay in &self.frame.regions {
            let x = overlay.x * sx;
            let w = overlay.width * sx;
            frame.fill_rectangle(
                Point::new(x, 0.0),
                Size::new(w, height),
                region_color(overlay.kind),
            );
            frame.fill_text(Text {
                content: overlay.label.clone(),
                position: Point::new(x + 4.0, MAJOR_TICK_PX + 14.0),
                size: 12.0.into(),
                color: region_edge_color(overlay.kind),
                align_x: Horizontal::Left.into(),
                align_y: Vertical::Top.into(),
                ..Text::default()
            });
        }

        if let Some(drag) = &interaction.drag {
            let (start, end) = if drag.start <= drag.end {
                (drag.start, drag.end)
            } else {
                (drag.end, drag.start)
            };
            let x0 = self.frame.x_at(start) * sx;
            let x1 = self.frame.x_at(end) * sx;
            frame.stroke(
                &Path::rectangle(Point::new(x0, 1.0), Size::new(x1 - x0, height - 2.0)),
                Stroke::default()
                    .with_color(self.colors.cursor)
                    .with_width(1.0),
            );
        }

        if let Some(cursor_x) = self.frame.cursor_x {
            let x = cursor_x * sx;
            frame.stroke(
                &Path::line(Point::new(x, 0.0), Point::new(x, height)),
                Stroke::default()
                    .with_color(self.colors.cursor)
                    .with_width(2.0),
            );
        }

        if self.status == DisplayStatus::Fallback {
            frame.fill_text(Text {
                content: "Preview waveform (audio unavailable)".to_string(),
                position: Point::new(width / 2.0, height - 8.0),
                size: 12.0.into(),
                color: FALLBACK_BANNER,
                align_x: Horizontal::Center.into(),
                align_y: Vertical::Bottom.into(),
                ..Text::default()
            });
        }

        vec![frame.into_geometry()]
    }
}
