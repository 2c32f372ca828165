//! Beat snapping of object times.
//!
//! All offsets are relative to the uninherited line active at the queried
//! time. Every query returns `None` when the beatmap has no uninherited line.

use crate::beatmap::Beatmap;
use crate::timing::TimingLineKind;

/// Divisors tried, in order, when no divisor is given. On equal distance the
/// earlier divisor wins.
pub const PRIORITY_DIVISORS: [u32; 5] = [16, 12, 9, 7, 5];

/// Divisors checked, lowest first, for the cleanest snapping.
pub const CLEAN_DIVISORS: [u32; 11] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 12, 16];

/// Practical unsnaps from this many ms on are worth reporting.
pub const UNSNAP_THRESHOLD_MS: f64 = 2.0;

impl Beatmap {
    fn active_beat(&self, time: f64) -> Option<(f64, f64)> {
        let line = self.timing_line_at(time, Some(TimingLineKind::Uninherited))?;
        Some((line.offset, line.ms_per_beat()?))
    }

    /// Time since the most recent beat of the active uninherited line.
    pub fn offset_into_beat(&self, time: f64) -> Option<f64> {
        let (offset, ms_per_beat) = self.active_beat(time)?;
        Some((time - offset).rem_euclid(ms_per_beat))
    }

    /// How far `time` sits past the nearest `k / divisor` beat fraction, in ms.
    /// Negative when the object is early.
    ///
    /// Without a divisor, the smallest result over [`PRIORITY_DIVISORS`] is
    /// returned.
    pub fn theoretical_unsnap(&self, time: f64, divisor: Option<u32>) -> Option<f64> {
        match divisor {
            Some(divisor) => {
                let (_, ms_per_beat) = self.active_beat(time)?;
                let fraction = self.offset_into_beat(time)? / ms_per_beat;
                let desired = (fraction * divisor as f64).round() / divisor as f64;
                Some((fraction - desired) * ms_per_beat)
            }
            None => {
                let mut best: Option<f64> = None;
                for divisor in PRIORITY_DIVISORS {
                    let unsnap = self.theoretical_unsnap(time, Some(divisor))?;
                    if best.map_or(true, |b| unsnap.abs() < b.abs()) {
                        best = Some(unsnap);
                    }
                }
                best
            }
        }
    }

    /// Unsnap after rounding the snapped time to the whole millisecond the
    /// game would store: `round(time - theoretical) - time`.
    pub fn practical_unsnap(&self, time: f64, divisor: Option<u32>) -> Option<f64> {
        let theoretical = self.theoretical_unsnap(time, divisor)?;
        Some((time - theoretical).round() - time)
    }

    /// Smallest divisor in [`CLEAN_DIVISORS`] that `time` is practically
    /// snapped to, or `Some(0)` if none is close enough.
    pub fn lowest_divisor(&self, time: f64) -> Option<u32> {
        self.active_beat(time)?;
        let divisor = CLEAN_DIVISORS
            .into_iter()
            .find(|&divisor| {
                self.practical_unsnap(time, Some(divisor))
                    .is_some_and(|unsnap| unsnap.abs() < UNSNAP_THRESHOLD_MS)
            })
            .unwrap_or(0);
        Some(divisor)
    }

    /// The practical unsnap of `time`, only when it is large enough to report.
    pub fn unsnap_issue(&self, time: f64) -> Option<f64> {
        self.practical_unsnap(time, None)
            .filter(|unsnap| unsnap.abs() >= UNSNAP_THRESHOLD_MS)
    }
}
