//! Error types for beatmap construction.

use thiserror::Error;

/// Errors that can occur while building a [`Beatmap`](crate::Beatmap) from
/// tokenized section lines.
#[derive(Error, Debug)]
pub enum BeatmapError {
    #[error("Missing required field `{field}` in line: {line}")]
    MissingField { field: &'static str, line: String },

    #[error("Invalid number for `{field}`: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Unknown hit object type bits: {0}")]
    UnknownObjectType(u32),

    #[error("Invalid slider curve: {0}")]
    InvalidCurve(String),

    #[error("Slider at {time}ms has no uninherited timing line to derive its speed from")]
    MissingTiming { time: f64 },

    #[error("Invalid value for setting `{key}`: {value:?}")]
    InvalidSetting { key: String, value: String },

    #[error("[{section}] line {index}: {source}")]
    Line {
        section: &'static str,
        index: usize,
        #[source]
        source: Box<BeatmapError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BeatmapError {
    /// Attaches the section name and line index the error came from.
    pub fn in_line(self, section: &'static str, index: usize) -> Self {
        Self::Line {
            section,
            index,
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, BeatmapError>;
