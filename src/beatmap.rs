use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::hit_object::{BuildContext, HitObject, HitObjectKind};
use crate::query::{self, ViewKind};
use crate::source::BeatmapSource;
use crate::stacking;
use crate::timing::{sort_timing_lines, TimingLine, TimingLineKind};
use crate::types::{DifficultySettings, GeneralSettings, Mode, Vec2};

static NEXT_IDENTITY: AtomicU64 = AtomicU64::new(0);

/// Hit objects and timing lines of one difficulty, sorted by time, with
/// stacking resolved.
///
/// Beatmaps built without a caller-chosen identity drop their cached views
/// when dropped. A clone shares the identity, so dropping either clone only
/// makes the other rebuild its views on the next query.
#[derive(Debug, Clone)]
pub struct Beatmap {
    identity: String,
    generated_identity: bool,
    difficulty: DifficultySettings,
    general: GeneralSettings,
    config: EngineConfig,
    hit_objects: Vec<HitObject>,
    timing_lines: Vec<TimingLine>,
}

impl Beatmap {
    /// Builds a beatmap from the lines of its `[TimingPoints]` and
    /// `[HitObjects]` sections.
    pub fn new<S: AsRef<str>>(
        timing_points: &[S],
        hit_objects: &[S],
        difficulty: DifficultySettings,
        general: GeneralSettings,
    ) -> Result<Self> {
        Self::with_config(timing_points, hit_objects, difficulty, general, EngineConfig::default())
    }

    pub fn with_config<S: AsRef<str>>(
        timing_points: &[S],
        hit_objects: &[S],
        difficulty: DifficultySettings,
        general: GeneralSettings,
        config: EngineConfig,
    ) -> Result<Self> {
        let mut beatmap = Self::build(generate_identity(), timing_points, hit_objects, difficulty, general, config)?;
        beatmap.generated_identity = true;
        Ok(beatmap)
    }

    /// Reads a `.osu` file. The path doubles as the cache identity, so call
    /// [`clear_cache`](crate::clear_cache) before reopening a path whose
    /// content changed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = BeatmapSource::read(path)?;
        Self::from_source(path.display().to_string(), &source, EngineConfig::default())
    }

    /// Parses `.osu` text held in memory.
    pub fn parse(text: &str) -> Result<Self> {
        let source = BeatmapSource::parse(text)?;
        let mut beatmap = Self::from_source(generate_identity(), &source, EngineConfig::default())?;
        beatmap.generated_identity = true;
        Ok(beatmap)
    }

    pub fn from_source(identity: String, source: &BeatmapSource, config: EngineConfig) -> Result<Self> {
        Self::build(
            identity,
            &source.timing_points,
            &source.hit_objects,
            source.difficulty,
            source.general,
            config,
        )
    }

    fn build<S: AsRef<str>>(
        identity: String,
        timing_points: &[S],
        hit_objects: &[S],
        difficulty: DifficultySettings,
        general: GeneralSettings,
        config: EngineConfig,
    ) -> Result<Self> {
        let mut timing_lines = timing_points
            .iter()
            .enumerate()
            .map(|(i, line)| TimingLine::parse(line.as_ref()).map_err(|e| e.in_line("TimingPoints", i)))
            .collect::<Result<Vec<_>>>()?;
        sort_timing_lines(&mut timing_lines);

        let context = BuildContext {
            timing_lines: &timing_lines,
            difficulty: &difficulty,
            config: &config,
        };
        let mut objects = hit_objects
            .iter()
            .enumerate()
            .map(|(i, line)| HitObject::parse(line.as_ref(), &context).map_err(|e| e.in_line("HitObjects", i)))
            .collect::<Result<Vec<_>>>()?;
        objects.sort_by(|a, b| a.time().total_cmp(&b.time()));
        for (i, object) in objects.iter_mut().enumerate() {
            object.set_sequence_index(i);
        }

        let mut beatmap = Self {
            identity,
            generated_identity: false,
            difficulty,
            general,
            config,
            hit_objects: objects,
            timing_lines,
        };

        if beatmap.general.mode == Mode::Standard {
            beatmap.resolve_stacking();
        }

        tracing::debug!(
            identity = %beatmap.identity,
            hit_objects = beatmap.hit_objects.len(),
            timing_lines = beatmap.timing_lines.len(),
            "Built beatmap"
        );
        Ok(beatmap)
    }

    /// Key of this beatmap's entries in the view cache.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn difficulty(&self) -> &DifficultySettings {
        &self.difficulty
    }

    pub fn general(&self) -> &GeneralSettings {
        &self.general
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn hit_objects(&self) -> &[HitObject] {
        &self.hit_objects
    }

    pub fn timing_lines(&self) -> &[TimingLine] {
        &self.timing_lines
    }

    /// Runs the stacking resolver over the beatmap and returns how many stack
    /// assignments it made. Construction already does this for standard
    /// beatmaps, so calling it again returns 0.
    pub fn resolve_stacking(&mut self) -> usize {
        stacking::resolve_stacking(&mut self.hit_objects, &self.difficulty, &self.general, &self.config)
    }

    pub fn stack_time_threshold(&self) -> f64 {
        stacking::stack_time_threshold(&self.difficulty, &self.general)
    }

    pub fn circle_radius(&self) -> f64 {
        self.difficulty.circle_radius()
    }

    pub fn stacked_position(&self, object: &HitObject) -> Vec2 {
        object.stacked_position(self.circle_radius())
    }

    fn object_view(&self, kind: HitObjectKind) -> Arc<[usize]> {
        query::cached_view(&self.identity, ViewKind::HitObject(kind), || {
            self.hit_objects
                .iter()
                .enumerate()
                .filter(|(_, object)| object.kind() == kind)
                .map(|(i, _)| i)
                .collect()
        })
    }

    fn line_view(&self, kind: TimingLineKind) -> Arc<[usize]> {
        query::cached_view(&self.identity, ViewKind::TimingLine(kind), || {
            self.timing_lines
                .iter()
                .enumerate()
                .filter(|(_, line)| line.kind() == kind)
                .map(|(i, _)| i)
                .collect()
        })
    }

    /// Objects of one variant, in time order.
    pub fn hit_objects_of(&self, kind: HitObjectKind) -> impl Iterator<Item = &HitObject> + '_ {
        let view = self.object_view(kind);
        (0..view.len()).filter_map(move |i| self.hit_objects.get(view[i]))
    }

    pub fn count(&self, kind: HitObjectKind) -> usize {
        self.object_view(kind).len()
    }

    /// The last object starting at or before `time`, or the first object when
    /// `time` precedes them all.
    pub fn hit_object_at(&self, time: f64, kind: Option<HitObjectKind>) -> Option<&HitObject> {
        self.object_index(time, kind, false).and_then(|i| self.hit_objects.get(i))
    }

    /// The object after [`hit_object_at`](Self::hit_object_at), if any.
    pub fn next_hit_object(&self, time: f64, kind: Option<HitObjectKind>) -> Option<&HitObject> {
        self.object_index(time, kind, true).and_then(|i| self.hit_objects.get(i))
    }

    fn object_index(&self, time: f64, kind: Option<HitObjectKind>, next: bool) -> Option<usize> {
        match kind {
            None => lookup(&self.hit_objects, time, next, HitObject::time),
            Some(kind) => {
                let view = self.object_view(kind);
                // A stale view may point past the end; such entries sort last.
                let time_of = |&i: &usize| self.hit_objects.get(i).map_or(f64::INFINITY, HitObject::time);
                lookup(&view[..], time, next, time_of).map(|k| view[k])
            }
        }
    }

    /// The last line at or before `time`, or the first line when `time`
    /// precedes them all.
    pub fn timing_line_at(&self, time: f64, kind: Option<TimingLineKind>) -> Option<&TimingLine> {
        self.line_index(time, kind, false).and_then(|i| self.timing_lines.get(i))
    }

    pub fn next_timing_line(&self, time: f64, kind: Option<TimingLineKind>) -> Option<&TimingLine> {
        self.line_index(time, kind, true).and_then(|i| self.timing_lines.get(i))
    }

    fn line_index(&self, time: f64, kind: Option<TimingLineKind>, next: bool) -> Option<usize> {
        match kind {
            None => lookup(&self.timing_lines, time, next, |line| line.offset),
            Some(kind) => {
                let view = self.line_view(kind);
                let offset_of = |&i: &usize| self.timing_lines.get(i).map_or(f64::INFINITY, |line| line.offset);
                lookup(&view[..], time, next, offset_of).map(|k| view[k])
            }
        }
    }

    pub fn previous_of(&self, object: &HitObject) -> Option<&HitObject> {
        object
            .sequence_index()
            .checked_sub(1)
            .and_then(|i| self.hit_objects.get(i))
    }

    pub fn next_of(&self, object: &HitObject) -> Option<&HitObject> {
        self.hit_objects.get(object.sequence_index() + 1)
    }

    /// Lowest and highest BPM over the uninherited lines.
    pub fn bpm_range(&self) -> Option<(f64, f64)> {
        self.timing_lines
            .iter()
            .filter_map(TimingLine::bpm)
            .fold(None, |range, bpm| match range {
                None => Some((bpm, bpm)),
                Some((low, high)) => Some((f64::min(low, bpm), f64::max(high, bpm))),
            })
    }

    /// Time from the first object's start to the latest object end.
    pub fn play_time(&self) -> f64 {
        let Some(first) = self.hit_objects.first() else {
            return 0.0;
        };
        let end = self
            .hit_objects
            .iter()
            .map(HitObject::end_time)
            .fold(f64::NEG_INFINITY, f64::max);
        end - first.time()
    }
}

impl Drop for Beatmap {
    fn drop(&mut self) {
        if self.generated_identity {
            query::invalidate(&self.identity);
        }
    }
}

fn generate_identity() -> String {
    format!("beatmap#{}", NEXT_IDENTITY.fetch_add(1, Ordering::Relaxed))
}

fn lookup<T>(list: &[T], time: f64, next: bool, key: impl Fn(&T) -> f64) -> Option<usize> {
    if next {
        query::next_index(list, time, key)
    } else {
        query::index_at(list, time, key)
    }
}
