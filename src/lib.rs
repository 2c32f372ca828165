//! Time-indexed hit objects and timing lines of osu! beatmaps, with stacking,
//! slider geometry and beat snapping.
//!
//! ```no_run
//! use osu_timeline::{Beatmap, HitObjectKind};
//!
//! let beatmap = Beatmap::open("map.osu")?;
//! if let Some(slider) = beatmap.hit_object_at(36515.0, Some(HitObjectKind::Slider)) {
//!     println!("{:?}", beatmap.stacked_position(slider));
//! }
//! # Ok::<(), osu_timeline::BeatmapError>(())
//! ```

mod beatmap;
mod config;
mod curve;
mod error;
mod hit_object;
mod query;
mod snap;
mod source;
mod stacking;
mod timing;
mod types;

#[cfg(feature = "python")]
mod python;

pub use beatmap::Beatmap;
pub use config::EngineConfig;
pub use curve::{Curve, CurveType};
pub use error::{BeatmapError, Result};
pub use hit_object::{
    stack_offset, Circle, HasDuration, HitObject, HitObjectKind, HoldNote, ObjectCore, Slider, SliderMetrics,
    Spinner, StackState, Stackable, MAX_SLIDER_TICKS, MAX_SLIDER_VELOCITY, MIN_SLIDER_VELOCITY,
};
pub use query::{clear_cache, index_at, invalidate, next_index, ViewKind};
pub use snap::{CLEAN_DIVISORS, PRIORITY_DIVISORS, UNSNAP_THRESHOLD_MS};
pub use source::BeatmapSource;
pub use stacking::stack_time_threshold;
pub use timing::{BeatLength, TimingLine, TimingLineKind};
pub use types::*;
