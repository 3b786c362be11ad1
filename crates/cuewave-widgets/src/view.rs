//! View functions
//!
//! Plain functions taking state references and a callback closure, returning
//! an `Element`:
//!
//! ```ignore
//! fn view(&self) -> Element<Message> {
//!     let controls = ControlsState::from_engine(&self.engine);
//!     editor_view(&controls, &self.frame, self.colors, Message::Control)
//! }
//! ```

use cuewave_core::render::RenderFrame;
use cuewave_core::Region;
use iced::widget::{column, Canvas};
use iced::{Element, Length};

use crate::canvas::{DisplayStatus, WaveformCanvas};
use crate::controls::{controls_view, ControlMessage, ControlsState};
use crate::theme::WaveformColors;

/// Waveform canvas with click-to-seek, region editing, and wheel zoom
///
/// `frame` should come from `WaveformEngine::frame` for roughly the width the
/// canvas gets; it is stretched to the actual bounds.
pub fn waveform_view<'a, Message>(
    frame: &'a RenderFrame,
    regions: &'a [Region],
    colors: WaveformColors,
    status: DisplayStatus,
    duration: f64,
    on_message: impl Fn(ControlMessage) -> Message + 'a,
) -> Element<'a, Message>
where
    Message: Clone + 'a,
{
    let height = if frame.height > 0.0 {
        frame.height
    } else {
        cuewave_core::WAVEFORM_HEIGHT
    };

    Canvas::new(WaveformCanvas {
        frame,
        regions,
        colors,
        status,
        duration,
        on_message,
    })
    .width(Length::Fill)
    .height(Length::Fixed(height))
    .into()
}

/// Controls above the waveform, as one editor
pub fn editor_view<'a, Message>(
    controls: &'a ControlsState,
    frame: &'a RenderFrame,
    colors: WaveformColors,
    on_message: impl Fn(ControlMessage) -> Message + Clone + 'a,
) -> Element<'a, Message>
where
    Message: Clone + 'a,
{
    let waveform = waveform_view(
        frame,
        &controls.regions,
        colors,
        DisplayStatus::from_state(controls.state),
        controls.duration,
        on_message.clone(),
    );

    column![controls_view(controls, on_message), waveform]
        .spacing(8)
        .into()
}
