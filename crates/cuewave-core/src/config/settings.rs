//! Engine configuration sections

use serde::{Deserialize, Serialize};

use crate::types::{
    BAR_GAP, BAR_WIDTH, DEFAULT_MARKER_SPAN, DEFAULT_ZOOM, MAX_ZOOM, MIN_ZOOM, WAVEFORM_HEIGHT,
    ZOOM_STEP,
};

/// Zoom levels, all in pixels per second
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    /// Level applied on load and by zoom reset
    pub default: f64,
    pub min: f64,
    pub max: f64,
    /// Change per zoom-in/zoom-out command
    pub step: f64,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            default: DEFAULT_ZOOM,
            min: MIN_ZOOM,
            max: MAX_ZOOM,
            step: ZOOM_STEP,
        }
    }
}

impl ZoomConfig {
    /// Clamp a zoom level into `[min, max]`
    pub fn clamp(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min, self.max)
    }
}

/// Waveform drawing style
///
/// Colours are `#rrggbb` strings, parsed by the front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    pub bar_width: f32,
    pub bar_gap: f32,
    /// Waveform height in pixels
    pub height: f32,
    /// Bars after the playback cursor
    pub wave_color: String,
    /// Bars before the playback cursor
    pub progress_color: String,
    pub cursor_color: String,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            bar_width: BAR_WIDTH,
            bar_gap: BAR_GAP,
            height: WAVEFORM_HEIGHT,
            wave_color: "#ff6b35".to_string(),
            progress_color: "#8b5cf6".to_string(),
            cursor_color: "#ffffff".to_string(),
        }
    }
}

/// Fallback waveform shown when the real audio cannot be loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Number of generated amplitudes
    pub sample_count: usize,
    /// Pretend duration in seconds
    pub duration_secs: f64,
    /// Progress added per frame of synthetic playback (0.005 = 0.5%)
    pub progress_step: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            sample_count: 400,
            duration_secs: 180.0,
            progress_step: 0.005,
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub zoom: ZoomConfig,
    /// Length of a region created by add-marker, in seconds
    pub marker_span_secs: f64,
    pub style: StyleConfig,
    pub synthetic: SyntheticConfig,
    /// Resolution of decoded waveform buffers
    pub peaks_per_second: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            zoom: ZoomConfig::default(),
            marker_span_secs: DEFAULT_MARKER_SPAN,
            style: StyleConfig::default(),
            synthetic: SyntheticConfig::default(),
            peaks_per_second: 100,
        }
    }
}

fn positive_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

fn positive_or_f32(value: f32, fallback: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

impl EngineConfig {
    /// Repair values a hand-edited file may have broken
    ///
    /// Non-positive numbers fall back to their defaults, swapped zoom limits
    /// are put back in order and the default zoom is clamped between them.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();

        let zoom = &mut self.zoom;
        zoom.min = positive_or(zoom.min, defaults.zoom.min);
        zoom.max = positive_or(zoom.max, defaults.zoom.max);
        if zoom.min > zoom.max {
            log::warn!(
                "Zoom limits reversed ({} > {}), swapping",
                zoom.min,
                zoom.max
            );
            std::mem::swap(&mut zoom.min, &mut zoom.max);
        }
        zoom.default = zoom.clamp(positive_or(zoom.default, defaults.zoom.default));
        zoom.step = positive_or(zoom.step, defaults.zoom.step);

        self.marker_span_secs = positive_or(self.marker_span_secs, defaults.marker_span_secs);

        let style = &mut self.style;
        style.bar_width = positive_or_f32(style.bar_width, defaults.style.bar_width);
        style.height = positive_or_f32(style.height, defaults.style.height);
        if !style.bar_gap.is_finite() || style.bar_gap < 0.0 {
            style.bar_gap = defaults.style.bar_gap;
        }

        let synthetic = &mut self.synthetic;
        if synthetic.sample_count == 0 {
            synthetic.sample_count = defaults.synthetic.sample_count;
        }
        synthetic.duration_secs =
            positive_or(synthetic.duration_secs, defaults.synthetic.duration_secs);
        synthetic.progress_step =
            positive_or(synthetic.progress_step, defaults.synthetic.progress_step).min(1.0);

        if self.peaks_per_second == 0 {
            self.peaks_per_second = defaults.peaks_per_second;
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_display_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.zoom.default, 50.0);
        assert_eq!(config.zoom.min, 10.0);
        assert_eq!(config.zoom.max, 1000.0);
        assert_eq!(config.zoom.step, 50.0);
        assert_eq!(config.marker_span_secs, 0.5);
        assert_eq!(config.synthetic.sample_count, 400);
        assert_eq!(config.style.wave_color, "#ff6b35");
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: EngineConfig = serde_yaml::from_str("zoom:\n  max: 600\n").unwrap();
        assert_eq!(config.zoom.max, 600.0);
        assert_eq!(config.zoom.min, 10.0);
        assert_eq!(config.style, StyleConfig::default());
    }

    #[test]
    fn test_sanitized_repairs_ranges() {
        let mut config = EngineConfig::default();
        config.zoom.min = 800.0;
        config.zoom.max = 20.0;
        config.zoom.default = 5000.0;
        config.zoom.step = -1.0;
        config.marker_span_secs = 0.0;
        config.synthetic.sample_count = 0;
        config.peaks_per_second = 0;

        let config = config.sanitized();
        assert_eq!((config.zoom.min, config.zoom.max), (20.0, 800.0));
        assert_eq!(config.zoom.default, 800.0);
        assert_eq!(config.zoom.step, 50.0);
        assert_eq!(config.marker_span_secs, 0.5);
        assert_eq!(config.synthetic.sample_count, 400);
        assert_eq!(config.peaks_per_second, 100);
    }

    #[test]
    fn test_sanitized_keeps_valid_config() {
        let config = EngineConfig::default();
        assert_eq!(config.clone().sanitized(), config);
    }
}
