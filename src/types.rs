use std::ops::{Add, Mul, Sub};
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{BeatmapError, Result};

/// A position in osu!pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    pub fn length_squared(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    pub fn distance(self, other: Vec2) -> f64 {
        (other - self).length()
    }

    pub fn distance_squared(self, other: Vec2) -> f64 {
        (other - self).length_squared()
    }

    /// Linear interpolation towards `other`; `t = 0` is `self`, `t = 1` is `other`.
    pub fn lerp(self, other: Vec2, t: f64) -> Vec2 {
        self + (other - self) * t
    }

    /// Unit vector in the same direction, or zero for a zero vector.
    pub fn normalized(self) -> Vec2 {
        let length = self.length();
        if length > 0.0 {
            self * (1.0 / length)
        } else {
            Vec2::default()
        }
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

bitflags! {
    /// Type column of a hit object line.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct HitObjectType: u32 {
        const CIRCLE = 1;
        const SLIDER = 1 << 1;
        const NEW_COMBO = 1 << 2;
        const SPINNER = 1 << 3;
        const COMBO_SKIP_1 = 1 << 4;
        const COMBO_SKIP_2 = 1 << 5;
        const COMBO_SKIP_3 = 1 << 6;
        const HOLD_NOTE = 1 << 7;
    }
}

impl HitObjectType {
    pub fn is_new_combo(self) -> bool {
        self.contains(Self::NEW_COMBO)
    }

    /// Number of combo colours skipped when this object starts a new combo.
    pub fn combo_skip(self) -> u32 {
        (self.bits() >> 4) & 0b111
    }
}

bitflags! {
    /// Hit sound additions played on top of the hit normal.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct HitSound: u8 {
        const NORMAL = 1;
        const WHISTLE = 1 << 1;
        const FINISH = 1 << 2;
        const CLAP = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Sampleset {
    #[default]
    Auto,
    Normal,
    Soft,
    Drum,
}

impl Sampleset {
    /// Unknown ids fall back to `Auto`, as the game does.
    pub fn from_id(id: i32) -> Self {
        match id {
            1 => Sampleset::Normal,
            2 => Sampleset::Soft,
            3 => Sampleset::Drum,
            _ => Sampleset::Auto,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Standard,
    Taiko,
    Catch,
    Mania,
}

impl Mode {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Mode::Standard),
            1 => Some(Mode::Taiko),
            2 => Some(Mode::Catch),
            3 => Some(Mode::Mania),
            _ => None,
        }
    }
}

/// `[Difficulty]` section values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultySettings {
    pub hp_drain_rate: f64,
    pub circle_size: f64,
    pub overall_difficulty: f64,
    pub approach_rate: f64,
    pub slider_multiplier: f64,
    pub slider_tick_rate: f64,
}

impl Default for DifficultySettings {
    fn default() -> Self {
        Self {
            hp_drain_rate: 5.0,
            circle_size: 4.0,
            overall_difficulty: 5.0,
            approach_rate: 5.0,
            slider_multiplier: 1.4,
            slider_tick_rate: 1.0,
        }
    }
}

impl DifficultySettings {
    /// Time in ms between an object starting to fade in and its hit time.
    pub fn preempt_time(&self) -> f64 {
        let ar = self.approach_rate;
        if ar < 5.0 {
            1200.0 + 600.0 * (5.0 - ar) / 5.0
        } else {
            1200.0 - 750.0 * (ar - 5.0) / 5.0
        }
    }

    pub fn circle_radius(&self) -> f64 {
        54.4 - 4.48 * self.circle_size
    }
}

/// The subset of `[General]` values the engine reads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    pub mode: Mode,
    pub stack_leniency: f64,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            mode: Mode::Standard,
            stack_leniency: 0.7,
        }
    }
}

/// Parses a column that every format version carries.
pub(crate) fn required<T: FromStr>(parts: &[&str], index: usize, field: &'static str) -> Result<T> {
    let raw = parts.get(index).ok_or_else(|| BeatmapError::MissingField {
        field,
        line: parts.join(","),
    })?;
    parse_number(raw, field)
}

/// Parses a column that older format versions omit, falling back to `default`
/// only when the column is absent. A present but corrupt value is an error.
pub(crate) fn optional<T: FromStr>(
    parts: &[&str],
    index: usize,
    field: &'static str,
    default: T,
) -> Result<T> {
    match parts.get(index) {
        Some(raw) if !raw.trim().is_empty() => parse_number(raw, field),
        _ => Ok(default),
    }
}

pub(crate) fn parse_number<T: FromStr>(raw: &str, field: &'static str) -> Result<T> {
    raw.trim().parse().map_err(|_| BeatmapError::InvalidNumber {
        field,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combo_skip_bits() {
        let flags = HitObjectType::from_bits_truncate(1 | 4 | 32 | 64);
        assert!(flags.is_new_combo());
        assert_eq!(flags.combo_skip(), 6);
    }

    #[test]
    fn test_preempt_matches_approach_rate_curve() {
        let mut difficulty = DifficultySettings::default();
        assert_eq!(difficulty.preempt_time(), 1200.0);
        difficulty.approach_rate = 10.0;
        assert_eq!(difficulty.preempt_time(), 450.0);
        difficulty.approach_rate = 0.0;
        assert_eq!(difficulty.preempt_time(), 1800.0);
    }

    #[test]
    fn test_optional_distinguishes_absent_from_corrupt() {
        let parts = ["1", "", "x"];
        assert_eq!(optional::<i32>(&parts, 1, "meter", 4).unwrap(), 4);
        assert_eq!(optional::<i32>(&parts, 5, "meter", 4).unwrap(), 4);
        assert!(matches!(
            optional::<i32>(&parts, 2, "meter", 4),
            Err(BeatmapError::InvalidNumber { field: "meter", .. })
        ));
    }

    #[test]
    fn test_required_reports_missing_column() {
        let parts = ["256"];
        assert!(matches!(
            required::<f64>(&parts, 1, "y"),
            Err(BeatmapError::MissingField { field: "y", .. })
        ));
    }
}
