//! iced front-end for the cuewave engine
//!
//! Follows the iced 0.14 split used across the workspace:
//!
//! - **State snapshots**: [`ControlsState`] is plain data read off the engine
//! - **View functions**: take state + a callback closure, return `Element`
//! - **Canvas program**: [`WaveformCanvas`] paints a `RenderFrame` and turns
//!   mouse input into [`ControlMessage`]s
//!
//! Messages go back to the engine through [`apply`].

pub mod canvas;
pub mod controls;
pub mod theme;
pub mod view;

pub use canvas::{DisplayStatus, WaveformCanvas, WaveformInteraction};
pub use controls::{apply, controls_view, ControlMessage, ControlsState};
pub use theme::{parse_hex_color, region_color, WaveformColors};
pub use view::{editor_view, waveform_view};
