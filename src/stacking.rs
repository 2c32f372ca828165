//! Stack index resolution.
//!
//! Circles and sliders placed on (almost) the same spot within a short time
//! window are drawn shifted so they stay distinguishable. The resolver runs
//! full passes over every pair in time order, applies the first pair that
//! should stack but isn't, and starts over until a pass finds nothing.

use crate::config::EngineConfig;
use crate::hit_object::{HitObject, StackState};
use crate::types::{DifficultySettings, GeneralSettings, Vec2};

/// Heads closer than 3 osu!pixels count as overlapping.
const STACK_DISTANCE_SQUARED: f64 = 9.0;

#[derive(Debug, Clone, Copy)]
struct StackEntry {
    object: usize,
    is_circle: bool,
    is_slider: bool,
    time: f64,
    end_time: f64,
    head: Vec2,
    /// Slider tail anchor; `None` for circles.
    tail: Option<Vec2>,
    state: StackState,
}

impl StackEntry {
    fn from_object(object: usize, hit_object: &HitObject) -> Option<Self> {
        let stackable = hit_object.as_stackable()?;
        let slider = hit_object.as_slider();
        Some(Self {
            object,
            is_circle: slider.is_none(),
            is_slider: slider.is_some(),
            time: hit_object.time(),
            end_time: hit_object.end_time(),
            head: stackable.unstacked_position(),
            tail: slider.map(|slider| slider.tail_anchor()),
            state: stackable.stack(),
        })
    }
}

/// Window after an object's end in which later objects may stack on it.
pub fn stack_time_threshold(difficulty: &DifficultySettings, general: &GeneralSettings) -> f64 {
    difficulty.preempt_time() * general.stack_leniency * 0.1
}

struct Resolver {
    entries: Vec<StackEntry>,
    threshold: f64,
}

impl Resolver {
    fn meets_stack_time(&self, earlier: &StackEntry, later: &StackEntry) -> bool {
        later.time - earlier.end_time <= self.threshold
    }

    /// The new state of the later object of the first pair that needs to
    /// change, if any.
    fn find_change(&self) -> Option<(usize, StackState)> {
        let entries = &self.entries;
        for (i, earlier) in entries.iter().enumerate() {
            for (j, later) in entries.iter().enumerate().skip(i + 1) {
                // Sorted by time, so every later candidate is out of range too.
                if !self.meets_stack_time(earlier, later) {
                    break;
                }

                let same_index = earlier.state.index == later.state.index;

                if (earlier.is_circle || later.is_circle)
                    && same_index
                    && earlier.head.distance_squared(later.head) < STACK_DISTANCE_SQUARED
                {
                    let mut state = later.state;
                    if earlier.state.index < 0 && !earlier.state.on_slider {
                        // Objects stacked under a slider tail keep stacking downwards.
                        state.index = earlier.state.index - 1;
                    } else {
                        state.index = earlier.state.index + 1;
                        if earlier.is_slider || earlier.state.on_slider {
                            state.on_slider = true;
                        }
                    }
                    return Some((j, state));
                }

                if let Some(tail) = earlier.tail {
                    if same_index && tail.distance_squared(later.head) < STACK_DISTANCE_SQUARED {
                        let mut state = later.state;
                        if later.is_slider {
                            state.index = earlier.state.index + 1;
                            state.on_slider = true;
                        } else {
                            state.index = earlier.state.index - 1;
                        }
                        return Some((j, state));
                    }
                }
            }
        }
        None
    }
}

/// Resolves stack indices of every circle and slider in `objects`, which must
/// be sorted by time. Returns the number of stack assignments made; running it
/// again on a resolved beatmap returns 0.
pub fn resolve_stacking(
    objects: &mut [HitObject],
    difficulty: &DifficultySettings,
    general: &GeneralSettings,
    config: &EngineConfig,
) -> usize {
    let entries: Vec<StackEntry> = objects
        .iter()
        .enumerate()
        .filter_map(|(i, object)| StackEntry::from_object(i, object))
        .collect();
    let mut resolver = Resolver {
        entries,
        threshold: stack_time_threshold(difficulty, general),
    };

    let mut changes = 0;
    loop {
        if changes >= config.max_stacking_changes {
            tracing::warn!(changes, "Stacking did not converge, giving up");
            break;
        }
        let Some((j, state)) = resolver.find_change() else {
            break;
        };
        let entry = &mut resolver.entries[j];
        tracing::trace!(time = entry.time, from = entry.state.index, to = state.index, "Stacked");
        entry.state = state;
        changes += 1;
    }

    for entry in &resolver.entries {
        if let Some(stackable) = objects[entry.object].as_stackable_mut() {
            *stackable.stack_mut() = entry.state;
        }
    }

    tracing::debug!(
        stackable = resolver.entries.len(),
        changes,
        threshold = resolver.threshold,
        "Resolved stacking"
    );
    changes
}
