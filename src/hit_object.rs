use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::curve::{Curve, CurveType};
use crate::error::{BeatmapError, Result};
use crate::query;
use crate::timing::TimingLine;
use crate::types::{optional, parse_number, required, DifficultySettings, HitObjectType, HitSound, Sampleset, Vec2};

/// Ticks closer than this to the end of their span are dropped.
const TICK_END_LENIENCY_MS: f64 = 10.0;

/// Slider velocity range the game accepts from inherited lines, i.e. beat
/// lengths between -1000 and -10.
pub const MIN_SLIDER_VELOCITY: f64 = 0.1;
pub const MAX_SLIDER_VELOCITY: f64 = 10.0;

/// Tick lists longer than this are truncated.
pub const MAX_SLIDER_TICKS: usize = 100_000;

/// Variant tag of a [`HitObject`], used to request filtered views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HitObjectKind {
    Circle,
    Slider,
    Spinner,
    HoldNote,
}

/// Columns every hit object carries.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectCore {
    pub position: Vec2,
    pub time: f64,
    pub object_type: HitObjectType,
    pub hit_sound: HitSound,
    /// Trailing hit sample column, kept verbatim.
    pub extras: String,
    sequence_index: usize,
}

/// Visual stacking of a circle or slider head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StackState {
    pub index: i32,
    pub on_slider: bool,
}

/// Objects that take part in stacking.
pub trait Stackable {
    fn core(&self) -> &ObjectCore;
    fn stack(&self) -> StackState;
    fn stack_mut(&mut self) -> &mut StackState;

    fn unstacked_position(&self) -> Vec2 {
        self.core().position
    }

    /// Head position shifted up-left by the stack index.
    fn stacked_position(&self, circle_radius: f64) -> Vec2 {
        self.unstacked_position() + stack_offset(self.stack().index, circle_radius)
    }
}

/// Objects with a duration.
pub trait HasDuration {
    fn end_time(&self) -> f64;
}

pub fn stack_offset(stack_index: i32, circle_radius: f64) -> Vec2 {
    let shift = stack_index as f64 * circle_radius * -0.1;
    Vec2::new(shift, shift)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Circle {
    pub core: ObjectCore,
    pub stack: StackState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spinner {
    pub core: ObjectCore,
    pub end_time: f64,
}

/// A mania long note.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldNote {
    pub core: ObjectCore,
    pub end_time: f64,
}

/// Scalars derived once from the active timing when a slider is built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliderMetrics {
    /// osu!pixels per ms.
    pub speed: f64,
    /// Duration of one span in ms.
    pub curve_duration: f64,
    /// Arc length of one span, re-derived from the duration.
    pub curve_length: f64,
    pub ms_per_beat: f64,
}

impl SliderMetrics {
    pub fn new(pixel_length: f64, sv_mult: f64, ms_per_beat: f64, slider_multiplier: f64) -> Self {
        let speed = 100.0 * sv_mult * slider_multiplier / ms_per_beat;
        let curve_duration = pixel_length / speed;
        Self {
            speed,
            curve_duration,
            curve_length: curve_duration * speed,
            ms_per_beat,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Slider {
    pub core: ObjectCore,
    pub stack: StackState,
    pub edge_count: u32,
    pub pixel_length: f64,
    pub edge_sounds: Vec<HitSound>,
    pub edge_sets: Vec<(Sampleset, Sampleset)>,
    curve: Curve,
    metrics: SliderMetrics,
    tick_times: Vec<f64>,
}

impl Slider {
    pub fn curve(&self) -> &Curve {
        &self.curve
    }

    pub fn curve_type(&self) -> CurveType {
        self.curve.curve_type()
    }

    pub fn metrics(&self) -> SliderMetrics {
        self.metrics
    }

    pub fn slider_speed(&self) -> f64 {
        self.metrics.speed
    }

    pub fn curve_duration(&self) -> f64 {
        self.metrics.curve_duration
    }

    pub fn curve_length(&self) -> f64 {
        self.metrics.curve_length
    }

    /// Sampled polyline of one span.
    pub fn path(&self) -> &[Vec2] {
        self.curve.path()
    }

    pub fn red_anchors(&self) -> Vec<Vec2> {
        self.curve.red_anchors()
    }

    pub fn tick_times(&self) -> &[f64] {
        &self.tick_times
    }

    /// Start of every span, followed by the end time.
    pub fn edge_times(&self) -> Vec<f64> {
        (0..=self.edge_count)
            .map(|i| self.core.time + i as f64 * self.metrics.curve_duration)
            .collect()
    }

    /// Fraction along the path at `time`, already reversed on return spans.
    pub fn span_fraction(&self, time: f64) -> f64 {
        let duration = self.metrics.curve_duration;
        if !(duration > 0.0) {
            return 0.0;
        }

        let progress = ((time - self.core.time) / duration).max(0.0);
        let (span, fraction) = if progress >= self.edge_count as f64 {
            (self.edge_count.saturating_sub(1), 1.0)
        } else {
            (progress.floor() as u32, progress.fract())
        };

        if span % 2 == 1 {
            1.0 - fraction
        } else {
            fraction
        }
    }

    /// Unstacked ball position at `time`.
    pub fn position_at(&self, time: f64) -> Vec2 {
        self.curve.position_at(self.span_fraction(time))
    }

    pub fn stacked_position_at(&self, time: f64, circle_radius: f64) -> Vec2 {
        self.position_at(time) + stack_offset(self.stack.index, circle_radius)
    }

    pub fn end_position(&self) -> Vec2 {
        self.position_at(self.end_time())
    }

    /// Where the slider ends: the path end after an odd number of spans,
    /// otherwise back at the head.
    pub fn tail_anchor(&self) -> Vec2 {
        if self.edge_count % 2 == 1 {
            self.path().last().copied().unwrap_or(self.core.position)
        } else {
            self.core.position
        }
    }

    fn compute_tick_times(&self, tick_rate: f64) -> Vec<f64> {
        let tick_gap = self.metrics.ms_per_beat / tick_rate;
        let duration = self.metrics.curve_duration;
        if !(tick_gap > 0.0) || !tick_gap.is_finite() || !(duration > 0.0) {
            return Vec::new();
        }

        let offsets: Vec<f64> = (1..)
            .map(|k| k as f64 * tick_gap)
            .take_while(|&offset| offset < duration - TICK_END_LENIENCY_MS)
            .take(MAX_SLIDER_TICKS + 1)
            .collect();
        if offsets.is_empty() {
            return Vec::new();
        }

        let capacity = offsets
            .len()
            .checked_mul(self.edge_count as usize)
            .map_or(MAX_SLIDER_TICKS, |n| n.min(MAX_SLIDER_TICKS));
        let mut ticks = Vec::with_capacity(capacity);
        for span in 0..self.edge_count {
            let span_start = self.core.time + span as f64 * duration;
            if span % 2 == 0 {
                ticks.extend(offsets.iter().map(|offset| span_start + offset));
            } else {
                ticks.extend(offsets.iter().rev().map(|offset| span_start + duration - offset));
            }
            if ticks.len() > MAX_SLIDER_TICKS {
                tracing::warn!(time = self.core.time, limit = MAX_SLIDER_TICKS, "Too many slider ticks, truncating");
                ticks.truncate(MAX_SLIDER_TICKS);
                break;
            }
        }
        ticks
    }
}

impl Stackable for Circle {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn stack(&self) -> StackState {
        self.stack
    }

    fn stack_mut(&mut self) -> &mut StackState {
        &mut self.stack
    }
}

impl Stackable for Slider {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn stack(&self) -> StackState {
        self.stack
    }

    fn stack_mut(&mut self) -> &mut StackState {
        &mut self.stack
    }
}

impl HasDuration for Slider {
    fn end_time(&self) -> f64 {
        self.core.time + self.metrics.curve_duration * self.edge_count as f64
    }
}

impl HasDuration for Spinner {
    fn end_time(&self) -> f64 {
        self.end_time
    }
}

impl HasDuration for HoldNote {
    fn end_time(&self) -> f64 {
        self.end_time
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HitObject {
    Circle(Circle),
    Slider(Slider),
    Spinner(Spinner),
    HoldNote(HoldNote),
}

/// What a slider needs from the rest of the beatmap while it is built.
pub(crate) struct BuildContext<'a> {
    pub timing_lines: &'a [TimingLine],
    pub difficulty: &'a DifficultySettings,
    pub config: &'a EngineConfig,
}

impl BuildContext<'_> {
    /// Slider velocity of the active line, clamped to the range the game
    /// accepts, and beat length of the active uninherited line at `time`.
    fn slider_timing(&self, time: f64) -> Result<(f64, f64)> {
        let lines = self.timing_lines;
        let current = query::index_at(lines, time, |line| line.offset)
            .ok_or(BeatmapError::MissingTiming { time })?;
        let ms_per_beat = lines[..=current]
            .iter()
            .rev()
            .find_map(TimingLine::ms_per_beat)
            .or_else(|| lines.iter().find_map(TimingLine::ms_per_beat))
            .ok_or(BeatmapError::MissingTiming { time })?;
        let sv_mult = lines[current]
            .sv_mult()
            .clamp(MIN_SLIDER_VELOCITY, MAX_SLIDER_VELOCITY);
        Ok((sv_mult, ms_per_beat))
    }
}

impl HitObject {
    /// Builds a hit object from the comma-separated columns of one
    /// `[HitObjects]` line: `x,y,time,type,hitSound,...` followed by the
    /// type-specific columns.
    pub(crate) fn parse(line: &str, context: &BuildContext) -> Result<Self> {
        let parts: Vec<&str> = line.split(',').collect();

        let x: f64 = required(&parts, 0, "x")?;
        let y: f64 = required(&parts, 1, "y")?;
        let time: f64 = required(&parts, 2, "time")?;
        let type_bits: u32 = required(&parts, 3, "type")?;
        let hit_sound: u8 = optional(&parts, 4, "hit sound", 0)?;

        let object_type = HitObjectType::from_bits_truncate(type_bits);
        let core = |extras_index: usize| ObjectCore {
            position: Vec2::new(x, y),
            time,
            object_type,
            hit_sound: HitSound::from_bits_truncate(hit_sound),
            extras: parts.get(extras_index).map(|s| s.to_string()).unwrap_or_default(),
            sequence_index: 0,
        };

        if object_type.contains(HitObjectType::SLIDER) {
            parse_slider(&parts, core(10), context).map(HitObject::Slider)
        } else if object_type.contains(HitObjectType::SPINNER) {
            let end_time = required(&parts, 5, "end time")?;
            Ok(HitObject::Spinner(Spinner {
                core: core(6),
                end_time,
            }))
        } else if object_type.contains(HitObjectType::HOLD_NOTE) {
            // `endTime:hitSample` share a column.
            let column = parts.get(5).ok_or_else(|| BeatmapError::MissingField {
                field: "end time",
                line: line.to_string(),
            })?;
            let (end, extras) = column.split_once(':').unwrap_or((*column, ""));
            let mut core = core(6);
            core.extras = extras.to_string();
            Ok(HitObject::HoldNote(HoldNote {
                core,
                end_time: parse_number(end, "end time")?,
            }))
        } else if object_type.contains(HitObjectType::CIRCLE) {
            Ok(HitObject::Circle(Circle {
                core: core(5),
                stack: StackState::default(),
            }))
        } else {
            Err(BeatmapError::UnknownObjectType(type_bits))
        }
    }

    pub fn core(&self) -> &ObjectCore {
        match self {
            HitObject::Circle(o) => &o.core,
            HitObject::Slider(o) => &o.core,
            HitObject::Spinner(o) => &o.core,
            HitObject::HoldNote(o) => &o.core,
        }
    }

    pub fn kind(&self) -> HitObjectKind {
        match self {
            HitObject::Circle(_) => HitObjectKind::Circle,
            HitObject::Slider(_) => HitObjectKind::Slider,
            HitObject::Spinner(_) => HitObjectKind::Spinner,
            HitObject::HoldNote(_) => HitObjectKind::HoldNote,
        }
    }

    pub fn time(&self) -> f64 {
        self.core().time
    }

    /// Circles end where they start.
    pub fn end_time(&self) -> f64 {
        match self {
            HitObject::Circle(o) => o.core.time,
            HitObject::Slider(o) => o.end_time(),
            HitObject::Spinner(o) => o.end_time(),
            HitObject::HoldNote(o) => o.end_time(),
        }
    }

    pub fn position(&self) -> Vec2 {
        self.core().position
    }

    pub fn object_type(&self) -> HitObjectType {
        self.core().object_type
    }

    pub fn hit_sound(&self) -> HitSound {
        self.core().hit_sound
    }

    /// Position in the beatmap's time-sorted object list.
    pub fn sequence_index(&self) -> usize {
        self.core().sequence_index
    }

    pub(crate) fn set_sequence_index(&mut self, index: usize) {
        match self {
            HitObject::Circle(o) => o.core.sequence_index = index,
            HitObject::Slider(o) => o.core.sequence_index = index,
            HitObject::Spinner(o) => o.core.sequence_index = index,
            HitObject::HoldNote(o) => o.core.sequence_index = index,
        }
    }

    pub fn as_stackable(&self) -> Option<&dyn Stackable> {
        match self {
            HitObject::Circle(o) => Some(o),
            HitObject::Slider(o) => Some(o),
            HitObject::Spinner(_) | HitObject::HoldNote(_) => None,
        }
    }

    pub fn as_stackable_mut(&mut self) -> Option<&mut dyn Stackable> {
        match self {
            HitObject::Circle(o) => Some(o),
            HitObject::Slider(o) => Some(o),
            HitObject::Spinner(_) | HitObject::HoldNote(_) => None,
        }
    }

    pub fn as_slider(&self) -> Option<&Slider> {
        match self {
            HitObject::Slider(slider) => Some(slider),
            _ => None,
        }
    }

    /// Resolved stack state, `None` for objects that never stack.
    pub fn stack(&self) -> Option<StackState> {
        self.as_stackable().map(Stackable::stack)
    }

    /// Head position after stacking; non-stackable objects are unaffected.
    pub fn stacked_position(&self, circle_radius: f64) -> Vec2 {
        match self.as_stackable() {
            Some(stackable) => stackable.stacked_position(circle_radius),
            None => self.position(),
        }
    }
}

fn parse_slider(parts: &[&str], core: ObjectCore, context: &BuildContext) -> Result<Slider> {
    let curve_column: &str = parts.get(5).ok_or_else(|| BeatmapError::MissingField {
        field: "curve",
        line: parts.join(","),
    })?;
    let mut tokens = curve_column.split('|');
    let curve_type = tokens
        .next()
        .and_then(|token| token.chars().next())
        .map(CurveType::from_char)
        .ok_or_else(|| BeatmapError::InvalidCurve(curve_column.to_string()))?;

    let mut nodes = vec![core.position];
    for token in tokens {
        let (px, py) = token
            .split_once(':')
            .ok_or_else(|| BeatmapError::InvalidCurve(curve_column.to_string()))?;
        let point = px
            .trim()
            .parse()
            .and_then(|x| py.trim().parse().map(|y| Vec2::new(x, y)))
            .map_err(|_| BeatmapError::InvalidCurve(curve_column.to_string()))?;
        nodes.push(point);
    }

    let edge_count: u32 = optional(parts, 6, "slides", 1)?;
    let edge_count = edge_count.max(1);
    let pixel_length: f64 = optional(parts, 7, "pixel length", 0.0)?;

    let edge_sounds = match parts.get(8) {
        Some(column) if !column.is_empty() => column
            .split('|')
            .map(|s| parse_number::<u8>(s, "edge sound").map(HitSound::from_bits_truncate))
            .collect::<Result<Vec<_>>>()?,
        _ => Vec::new(),
    };
    let edge_sets = match parts.get(9) {
        Some(column) if !column.is_empty() => column
            .split('|')
            .map(|pair| {
                let (normal, addition) = pair.split_once(':').unwrap_or((pair, "0"));
                Ok((
                    Sampleset::from_id(parse_number(normal, "edge sampleset")?),
                    Sampleset::from_id(parse_number(addition, "edge addition set")?),
                ))
            })
            .collect::<Result<Vec<_>>>()?,
        _ => Vec::new(),
    };

    let (sv_mult, ms_per_beat) = context.slider_timing(core.time)?;
    let metrics = SliderMetrics::new(
        pixel_length,
        sv_mult,
        ms_per_beat,
        context.difficulty.slider_multiplier,
    );
    let curve = Curve::new(curve_type, nodes, pixel_length, metrics.curve_length, context.config);

    let mut slider = Slider {
        core,
        stack: StackState::default(),
        edge_count,
        pixel_length,
        edge_sounds,
        edge_sets,
        curve,
        metrics,
        tick_times: Vec::new(),
    };
    slider.tick_times = slider.compute_tick_times(context.difficulty.slider_tick_rate);
    Ok(slider)
}
