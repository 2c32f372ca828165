use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{BeatmapError, Result};
use crate::types::{optional, required, Sampleset};

const KIAI: i32 = 1;
const OMIT_FIRST_BARLINE: i32 = 1 << 3;

/// Variant tag of a [`TimingLine`], used to request filtered views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimingLineKind {
    Uninherited,
    Inherited,
}

/// The variant-specific part of a timing line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BeatLength {
    /// Red line: defines the beat length from its offset onwards.
    Uninherited { ms_per_beat: f64 },
    /// Green line: scales slider velocity relative to the active red line.
    Inherited { sv_mult: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingLine {
    pub offset: f64,
    pub meter: i32,
    pub sampleset: Sampleset,
    pub custom_index: i32,
    pub volume: i32,
    pub kiai: bool,
    pub omit_first_barline: bool,
    pub beat_length: BeatLength,
}

impl TimingLine {
    /// Builds a timing line from the comma-separated columns of one
    /// `[TimingPoints]` line:
    /// `offset,beatLength,meter,sampleSet,sampleIndex,volume,uninherited,effects`.
    ///
    /// Everything after `beatLength` may be missing in older files.
    pub fn parse(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split(',').collect();

        let offset: f64 = required(&parts, 0, "offset")?;
        let raw_beat_length: f64 = required(&parts, 1, "beat length")?;
        if raw_beat_length.is_nan() {
            return Err(invalid_beat_length(&parts));
        }
        let meter = optional(&parts, 2, "meter", 4)?;
        let sampleset: i32 = optional(&parts, 3, "sampleset", 0)?;
        let custom_index = optional(&parts, 4, "custom index", 0)?;
        let volume = optional(&parts, 5, "volume", 100)?;
        // Without the column, a negative beat length is what marks a green line.
        let uninherited_default = i32::from(raw_beat_length >= 0.0);
        let uninherited: i32 = optional(&parts, 6, "uninherited", uninherited_default)?;
        let effects: i32 = optional(&parts, 7, "effects", 0)?;

        let beat_length = if uninherited == 1 {
            if !(raw_beat_length > 0.0 && raw_beat_length.is_finite()) {
                return Err(invalid_beat_length(&parts));
            }
            BeatLength::Uninherited {
                ms_per_beat: raw_beat_length,
            }
        } else {
            let sv_mult = if raw_beat_length < 0.0 {
                -100.0 / raw_beat_length
            } else {
                1.0
            };
            BeatLength::Inherited { sv_mult }
        };

        Ok(Self {
            offset,
            meter,
            sampleset: Sampleset::from_id(sampleset),
            custom_index,
            volume,
            kiai: effects & KIAI != 0,
            omit_first_barline: effects & OMIT_FIRST_BARLINE != 0,
            beat_length,
        })
    }

    pub fn kind(&self) -> TimingLineKind {
        match self.beat_length {
            BeatLength::Uninherited { .. } => TimingLineKind::Uninherited,
            BeatLength::Inherited { .. } => TimingLineKind::Inherited,
        }
    }

    pub fn is_uninherited(&self) -> bool {
        self.kind() == TimingLineKind::Uninherited
    }

    /// Slider velocity multiplier; always 1 on uninherited lines.
    pub fn sv_mult(&self) -> f64 {
        match self.beat_length {
            BeatLength::Uninherited { .. } => 1.0,
            BeatLength::Inherited { sv_mult } => sv_mult,
        }
    }

    pub fn ms_per_beat(&self) -> Option<f64> {
        match self.beat_length {
            BeatLength::Uninherited { ms_per_beat } => Some(ms_per_beat),
            BeatLength::Inherited { .. } => None,
        }
    }

    pub fn bpm(&self) -> Option<f64> {
        self.ms_per_beat().map(|ms| 60_000.0 / ms)
    }
}

fn invalid_beat_length(parts: &[&str]) -> BeatmapError {
    BeatmapError::InvalidNumber {
        field: "beat length",
        value: parts[1].to_string(),
    }
}

/// Sorts by offset, placing uninherited lines before inherited ones on ties so
/// the inherited line is the one found active at that offset.
pub(crate) fn sort_timing_lines(lines: &mut [TimingLine]) {
    lines.sort_by(|a, b| {
        a.offset
            .total_cmp(&b.offset)
            .then_with(|| match (a.kind(), b.kind()) {
                (TimingLineKind::Uninherited, TimingLineKind::Inherited) => Ordering::Less,
                (TimingLineKind::Inherited, TimingLineKind::Uninherited) => Ordering::Greater,
                _ => Ordering::Equal,
            })
    });
}
