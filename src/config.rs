use serde::{Deserialize, Serialize};

/// Fractional parameter step used when walking Bezier, Catmull and
/// passthrough curves.
pub const DEFAULT_CURVE_STEP: f64 = 0.0005;

/// Minimum arc length, in osu!pixels, between two retained path samples.
pub const DEFAULT_SAMPLE_SPACING: f64 = 2.0;

/// Cap on stack assignments before the resolver gives up.
pub const DEFAULT_MAX_STACKING_CHANGES: usize = 100_000;

/// Numerical tunables of the engine.
///
/// The defaults reproduce the game's own sampling; they only need changing when
/// trading path accuracy against construction cost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub curve_step: f64,
    pub sample_spacing: f64,
    pub max_stacking_changes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            curve_step: DEFAULT_CURVE_STEP,
            sample_spacing: DEFAULT_SAMPLE_SPACING,
            max_stacking_changes: DEFAULT_MAX_STACKING_CHANGES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{ "curve_step": 0.001 }"#).unwrap();
        assert_eq!(config.curve_step, 0.001);
        assert_eq!(config.sample_spacing, DEFAULT_SAMPLE_SPACING);
        assert_eq!(config.max_stacking_changes, DEFAULT_MAX_STACKING_CHANGES);
    }
}
