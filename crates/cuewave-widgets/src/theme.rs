//! Colors for the waveform display
//!
//! Waveform colors come from the engine's style configuration as `#rrggbb`
//! strings; region overlay colors are fixed per region kind.

use cuewave_core::config::StyleConfig;
use cuewave_core::RegionKind;
use iced::Color;

/// Canvas background
pub const BACKGROUND: Color = Color::from_rgb(0.1, 0.1, 0.12);

/// Loading indicator bar
pub const LOADING_COLOR: Color = Color::from_rgba(0.6, 0.6, 0.6, 0.8);

/// Time ruler ticks and labels
pub const RULER_COLOR: Color = Color::from_rgba(0.7, 0.7, 0.75, 0.6);

/// Banner shown over the synthetic fallback waveform
pub const FALLBACK_BANNER: Color = Color::from_rgba(0.9, 0.7, 0.3, 0.9);

/// Parse a `#rrggbb` or `#rrggbbaa` color (the `#` is optional)
pub fn parse_hex_color(hex: &str) -> Option<Color> {
    let hex = hex.trim().trim_start_matches('#');
    if !hex.is_ascii() || (hex.len() != 6 && hex.len() != 8) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    let r = channel(0)?;
    let g = channel(2)?;
    let b = channel(4)?;
    let a = if hex.len() == 8 { channel(6)? } else { 255 };
    Some(Color::from_rgba8(r, g, b, a as f32 / 255.0))
}

/// Colors for one waveform display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveformColors {
    /// Bars after the cursor
    pub wave: Color,
    /// Bars before the cursor
    pub progress: Color,
    pub cursor: Color,
    pub background: Color,
}

impl Default for WaveformColors {
    fn default() -> Self {
        Self::from_style(&StyleConfig::default())
    }
}

impl WaveformColors {
    /// Colors from the style configuration
    ///
    /// A color that does not parse keeps the built-in value.
    pub fn from_style(style: &StyleConfig) -> Self {
        let parse = |value: &str, fallback: Color| {
            parse_hex_color(value).unwrap_or_else(|| {
                log::warn!("Invalid color {:?} in style config, using default", value);
                fallback
            })
        };
        Self {
            wave: parse(&style.wave_color, Color::from_rgb8(0xff, 0x6b, 0x35)),
            progress: parse(&style.progress_color, Color::from_rgb8(0x8b, 0x5c, 0xf6)),
            cursor: parse(&style.cursor_color, Color::WHITE),
            background: BACKGROUND,
        }
    }
}

/// Translucent fill of a region overlay
pub fn region_color(kind: RegionKind) -> Color {
    let solid = region_edge_color(kind);
    Color { a: 0.3, ..solid }
}

/// Opaque color for region edges and labels
pub fn region_edge_color(kind: RegionKind) -> Color {
    match kind {
        RegionKind::Intro => Color::from_rgb8(34, 197, 94),
        RegionKind::Outro => Color::from_rgb8(239, 68, 68),
        RegionKind::Loop => Color::from_rgb8(59, 130, 246),
        RegionKind::Custom => Color::from_rgb8(156, 163, 175),
    }
}
