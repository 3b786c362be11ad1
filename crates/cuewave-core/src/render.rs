//! Waveform rendering into drawable bar descriptors
//!
//! The renderer is stateless: every call recomputes the frame from its
//! inputs. The visible window follows the playback cursor (kept centered once
//! the track is wider than the container) and each bar averages the buffer
//! amplitudes that fall inside its slice of time.
//!
//! The frame also carries the time ruler: labelled major ticks every second
//! and minor ticks every quarter second, both widened to coarser steps
//! whenever they would crowd together at low zoom.

use crate::error::EngineResult;
use crate::region::{Region, RegionKind};
use crate::time_axis::{format_time, TimeAxis};
use crate::types::{WaveformBuffer, BAR_GAP, BAR_WIDTH};

/// Which side of the playback cursor a bar is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarFill {
    /// Before the cursor (already played)
    Played,
    /// At or after the cursor
    Unplayed,
}

/// One vertical waveform bar, in container pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub fill: BarFill,
}

/// Visible part of a region, in container pixel coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct RegionOverlay {
    pub id: String,
    pub kind: RegionKind,
    pub label: String,
    pub x: f32,
    pub width: f32,
}

/// Candidate ruler steps in seconds, finest first
const RULER_STEPS: [f64; 11] = [0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0];

/// Finest minor tick step
pub const RULER_MINOR_SECS: f64 = 0.25;

/// Finest labelled tick step
pub const RULER_MAJOR_SECS: f64 = 1.0;

/// Minor ticks closer than this are thinned out
pub const MIN_TICK_SPACING_PX: f64 = 5.0;

/// Labelled ticks closer than this are thinned out
pub const MIN_LABEL_SPACING_PX: f64 = 40.0;

/// One ruler tick, in container pixel coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub x: f32,
    pub time: f64,
    /// `m:ss` label, only on major ticks
    pub label: Option<String>,
}

impl Tick {
    pub fn is_major(&self) -> bool {
        self.label.is_some()
    }
}

/// Inputs for one render pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderParams {
    /// Zoom level in pixels per second
    pub zoom: f64,
    /// Playback progress ratio (0..1)
    pub progress: f64,
    pub width: f32,
    pub height: f32,
    pub bar_width: f32,
    pub bar_gap: f32,
}

impl RenderParams {
    pub fn new(zoom: f64, progress: f64, width: f32, height: f32) -> Self {
        Self {
            zoom,
            progress,
            width,
            height,
            bar_width: BAR_WIDTH,
            bar_gap: BAR_GAP,
        }
    }

    pub fn with_bar_style(mut self, bar_width: f32, bar_gap: f32) -> Self {
        self.bar_width = bar_width;
        self.bar_gap = bar_gap;
        self
    }
}

/// A fully computed frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderFrame {
    pub bars: Vec<Bar>,
    pub regions: Vec<RegionOverlay>,
    /// Time ruler, sorted by x
    pub ticks: Vec<Tick>,
    /// Cursor x position within the container, `None` when nothing is drawn
    pub cursor_x: Option<f32>,
    /// Pixel offset of the container's left edge from the start of the track
    pub scroll_offset: f64,
    /// Effective pixels per second used for this frame
    pub pixels_per_second: f64,
    /// Visible time range (seconds)
    pub visible_start: f64,
    pub visible_end: f64,
    pub width: f32,
    pub height: f32,
}

impl RenderFrame {
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Time under a container x position, clamped to the visible range
    pub fn time_at(&self, x: f32) -> f64 {
        if self.pixels_per_second <= 0.0 {
            return 0.0;
        }
        let t = (self.scroll_offset + x.max(0.0) as f64) / self.pixels_per_second;
        t.clamp(self.visible_start, self.visible_end)
    }

    /// Container x position of a time (may fall outside the container)
    pub fn x_at(&self, time: f64) -> f32 {
        (time * self.pixels_per_second - self.scroll_offset) as f32
    }
}

/// Render a waveform buffer
///
/// An empty buffer, a zero duration, or a zero-sized container renders zero
/// bars without error. An invalid zoom level is rejected.
pub fn render(
    buffer: &WaveformBuffer,
    params: &RenderParams,
    regions: &[Region],
) -> EngineResult<RenderFrame> {
    let duration = buffer.duration();
    let axis = TimeAxis::new(duration, params.width);
    let pps = axis.pixels_per_second(params.zoom)?;

    let mut frame = RenderFrame {
        width: params.width.max(0.0),
        height: params.height.max(0.0),
        pixels_per_second: pps,
        ..RenderFrame::default()
    };

    let slot = params.bar_width + params.bar_gap;
    if buffer.is_empty()
        || duration <= 0.0
        || params.width <= 0.0
        || params.height <= 0.0
        || params.bar_width <= 0.0
        || slot <= 0.0
    {
        return Ok(frame);
    }

    let width = params.width as f64;
    let total_width = axis.total_width(params.zoom)?;
    let progress = if params.progress.is_finite() {
        params.progress.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let cursor_abs = progress * total_width;
    let scroll = (cursor_abs - width / 2.0).clamp(0.0, (total_width - width).max(0.0));
    let cursor_x = (cursor_abs - scroll) as f32;

    frame.scroll_offset = scroll;
    frame.cursor_x = Some(cursor_x);
    frame.visible_start = scroll / pps;
    frame.visible_end = ((scroll + width) / pps).min(duration);

    let samples = buffer.samples();
    let len = samples.len();
    let bar_count = (params.width / slot).floor() as usize;
    frame.bars.reserve(bar_count);

    for i in 0..bar_count {
        let x = i as f32 * slot;
        let t0 = (scroll + x as f64) / pps;
        if t0 >= duration {
            break;
        }
        let t1 = ((scroll + (x + slot) as f64) / pps).min(duration);

        let first = ((t0 / duration) * len as f64).floor() as usize;
        let first = first.min(len - 1);
        let last = (((t1 / duration) * len as f64).ceil() as usize).clamp(first + 1, len);

        let bucket = &samples[first..last];
        let amplitude = bucket.iter().sum::<f32>() / bucket.len() as f32;

        let height = amplitude * params.height;
        frame.bars.push(Bar {
            x,
            y: (params.height - height) / 2.0,
            width: params.bar_width,
            height,
            fill: if x < cursor_x {
                BarFill::Played
            } else {
                BarFill::Unplayed
            },
        });
    }

    frame.ticks = ruler_ticks(frame.visible_start, frame.visible_end, pps, scroll);

    for region in regions {
        let x0 = region.start * pps - scroll;
        let x1 = region.end.min(duration) * pps - scroll;
        if x1 <= 0.0 || x0 >= width {
            continue;
        }
        let left = x0.max(0.0);
        let right = x1.min(width);
        frame.regions.push(RegionOverlay {
            id: region.id.clone(),
            kind: region.kind,
            label: region.label.clone(),
            x: left as f32,
            width: (right - left) as f32,
        });
    }

    Ok(frame)
}

/// Smallest step not finer than `floor` that is at least `min_px` wide
fn ruler_step(floor: f64, pps: f64, min_px: f64) -> f64 {
    RULER_STEPS
        .iter()
        .copied()
        .filter(|step| *step >= floor)
        .find(|step| step * pps >= min_px)
        .unwrap_or(RULER_STEPS[RULER_STEPS.len() - 1])
}

fn ruler_ticks(start: f64, end: f64, pps: f64, scroll: f64) -> Vec<Tick> {
    if pps <= 0.0 || end <= start {
        return Vec::new();
    }
    let minor = ruler_step(RULER_MINOR_SECS, pps, MIN_TICK_SPACING_PX);
    let major = ruler_step(RULER_MAJOR_SECS.max(minor), pps, MIN_LABEL_SPACING_PX);
    let eps = 1e-9;

    let is_major = |t: f64| {
        let r = (t / major).round() * major;
        (t - r).abs() < eps
    };

    let mut ticks = Vec::new();
    let mut push = |t: f64, label: Option<String>| {
        ticks.push(Tick {
            x: (t * pps - scroll) as f32,
            time: t,
            label,
        });
    };

    let mut i = (start / minor - eps).ceil() as u64;
    let mut j = (start / major - eps).ceil() as u64;
    loop {
        let t_minor = i as f64 * minor;
        let t_major = j as f64 * major;
        if t_minor > end + eps && t_major > end + eps {
            break;
        }
        // Merge both grids in time order; a minor tick on a major one is skipped
        if t_major <= t_minor + eps && t_major <= end + eps {
            push(t_major, Some(format_time(t_major)));
            j += 1;
            if (t_major - t_minor).abs() < eps {
                i += 1;
            }
        } else if t_minor <= end + eps {
            if !is_major(t_minor) {
                push(t_minor, None);
            }
            i += 1;
        } else {
            j += 1;
        }
    }
    ticks
}
