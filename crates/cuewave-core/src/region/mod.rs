//! Annotated time ranges (intro/outro/loop cues) on a track
//!
//! Regions are what the mixing pipeline consumes as cue points. Overlap is
//! allowed; no merge or reject rules are applied.

mod store;

pub use store::{RegionEvent, RegionEventKind, RegionStore};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{check_time, EngineError, EngineResult};

/// Kind of annotation a region represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    Intro,
    Outro,
    Loop,
    Custom,
}

impl RegionKind {
    pub const ALL: [RegionKind; 4] = [
        RegionKind::Intro,
        RegionKind::Outro,
        RegionKind::Loop,
        RegionKind::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegionKind::Intro => "intro",
            RegionKind::Outro => "outro",
            RegionKind::Loop => "loop",
            RegionKind::Custom => "custom",
        }
    }

    /// Label given to new regions of this kind
    pub fn default_label(&self) -> &'static str {
        match self {
            RegionKind::Intro => "Intro",
            RegionKind::Outro => "Outro",
            RegionKind::Loop => "Loop",
            RegionKind::Custom => "Custom",
        }
    }

    /// Display hint given to new regions of this kind
    pub fn default_color(&self) -> &'static str {
        match self {
            RegionKind::Intro => "green",
            RegionKind::Outro => "red",
            RegionKind::Loop => "blue",
            RegionKind::Custom => "gray",
        }
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegionKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "intro" => Ok(RegionKind::Intro),
            "outro" => Ok(RegionKind::Outro),
            "loop" => Ok(RegionKind::Loop),
            "custom" => Ok(RegionKind::Custom),
            other => Err(EngineError::InvalidArgument(format!(
                "unknown region type: {other:?}"
            ))),
        }
    }
}

/// A labeled time interval on a track
///
/// Invariant: `0 <= start < end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub start: f64,
    pub end: f64,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: RegionKind,
    pub color: String,
}

impl Region {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time <= self.end
    }
}

/// Put bounds in order, rejecting what cannot be repaired
///
/// Reversed bounds are swapped. Negative or non-finite values and empty
/// spans are rejected.
pub fn normalize_bounds(start: f64, end: f64) -> EngineResult<(f64, f64)> {
    let start = check_time(start, "region start")?;
    let end = check_time(end, "region end")?;
    let (start, end) = if start <= end { (start, end) } else { (end, start) };
    if start == end {
        return Err(EngineError::InvalidArgument(format!(
            "region must span a positive duration (start = end = {start})"
        )));
    }
    Ok((start, end))
}

/// Loosely shaped region as produced by a plugin or a caller's persisted state
///
/// Only the bounds are mandatory. Everything else falls back to the kind's
/// defaults when absent. Turned into a [`Region`] by
/// [`RegionStore::insert_draft`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl RegionDraft {
    /// Validated kind; a missing type means `Custom`
    pub fn parsed_kind(&self) -> EngineResult<RegionKind> {
        match &self.kind {
            Some(kind) => kind.parse(),
            None => Ok(RegionKind::Custom),
        }
    }
}
