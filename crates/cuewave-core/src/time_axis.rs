//! Mapping between track time and horizontal pixel space
//!
//! The zoom level is expressed in pixels per second. When the whole track at
//! the requested zoom is narrower than the container, the waveform is
//! stretched to fill the container instead, so the effective scale is
//! `max(zoom, container_width / duration)`. Both directions of the mapping use
//! the same effective scale and are therefore inverses of each other.

use crate::error::{check_time, EngineError, EngineResult};

/// Time axis for one track displayed in a container of a given width
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeAxis {
    duration: f64,
    container_width: f64,
}

impl TimeAxis {
    /// Negative or non-finite inputs are treated as zero.
    pub fn new(duration: f64, container_width: f32) -> Self {
        let sanitize = |v: f64| if v.is_finite() && v > 0.0 { v } else { 0.0 };
        Self {
            duration: sanitize(duration),
            container_width: sanitize(container_width as f64),
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn container_width(&self) -> f64 {
        self.container_width
    }

    /// Effective pixels per second at the given zoom level
    pub fn pixels_per_second(&self, zoom: f64) -> EngineResult<f64> {
        check_zoom(zoom)?;
        if self.duration > 0.0 {
            Ok(zoom.max(self.container_width / self.duration))
        } else {
            Ok(zoom)
        }
    }

    /// Width in pixels of the whole track at the given zoom level
    pub fn total_width(&self, zoom: f64) -> EngineResult<f64> {
        Ok(self.duration * self.pixels_per_second(zoom)?)
    }

    /// Pixel offset of a time, measured from the start of the track
    ///
    /// Times past the end of the track are clamped to the duration.
    pub fn to_pixels(&self, time_seconds: f64, zoom: f64) -> EngineResult<f64> {
        let time = check_time(time_seconds, "time")?.min(self.duration);
        Ok(time * self.pixels_per_second(zoom)?)
    }

    /// Time at a pixel offset, clamped to `[0, duration]`
    pub fn to_time(&self, pixel_offset: f64, zoom: f64) -> EngineResult<f64> {
        let pixels = check_pixels(pixel_offset)?;
        let pps = self.pixels_per_second(zoom)?;
        Ok((pixels / pps).clamp(0.0, self.duration))
    }
}

/// Validate a zoom level (must be positive and finite)
pub fn check_zoom(zoom: f64) -> EngineResult<f64> {
    if zoom.is_finite() && zoom > 0.0 {
        Ok(zoom)
    } else {
        Err(EngineError::InvalidArgument(format!(
            "zoom level must be positive (got {zoom})"
        )))
    }
}

fn check_pixels(pixels: f64) -> EngineResult<f64> {
    if !pixels.is_finite() {
        return Err(EngineError::InvalidArgument("pixel offset is not finite".into()));
    }
    if pixels < 0.0 {
        return Err(EngineError::InvalidArgument(format!(
            "pixel offset must not be negative (got {pixels})"
        )));
    }
    Ok(pixels)
}

/// Format seconds as `m:ss` for time read-outs
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}
