use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{BeatmapError, Result};
use crate::types::{parse_number, DifficultySettings, GeneralSettings, Mode};

/// The parts of a `.osu` file the engine consumes: settings plus the raw
/// `[TimingPoints]` and `[HitObjects]` lines.
#[derive(Debug, Clone, Default)]
pub struct BeatmapSource {
    pub general: GeneralSettings,
    pub difficulty: DifficultySettings,
    pub timing_points: Vec<String>,
    pub hit_objects: Vec<String>,
}

impl BeatmapSource {
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Reading beatmap: {}", path.display());
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines();

        // Skip version line
        lines.next();

        let mut sections: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut current_section = "";

        for line in lines {
            let line = line.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                current_section = &line[1..line.len() - 1];
                sections.entry(current_section).or_default();
            } else if !current_section.is_empty() {
                sections.entry(current_section).or_default().push(line);
            }
        }

        let mut source = BeatmapSource::default();

        for (key, value) in key_values(&sections, "General") {
            match key {
                "Mode" => {
                    let id: u8 = setting(key, value)?;
                    source.general.mode = Mode::from_id(id).ok_or_else(|| BeatmapError::InvalidSetting {
                        key: key.to_string(),
                        value: value.to_string(),
                    })?;
                }
                "StackLeniency" => source.general.stack_leniency = setting(key, value)?,
                _ => {}
            }
        }

        let difficulty = &mut source.difficulty;
        for (key, value) in key_values(&sections, "Difficulty") {
            match key {
                "HPDrainRate" => difficulty.hp_drain_rate = setting(key, value)?,
                "CircleSize" => difficulty.circle_size = setting(key, value)?,
                "OverallDifficulty" => {
                    difficulty.overall_difficulty = setting(key, value)?;
                    // Old files have no approach rate and use OD for it.
                    if !sections["Difficulty"].iter().any(|l| l.starts_with("ApproachRate")) {
                        difficulty.approach_rate = difficulty.overall_difficulty;
                    }
                }
                "ApproachRate" => difficulty.approach_rate = setting(key, value)?,
                "SliderMultiplier" => difficulty.slider_multiplier = setting(key, value)?,
                "SliderTickRate" => difficulty.slider_tick_rate = setting(key, value)?,
                _ => {}
            }
        }

        let owned = |name: &str| -> Vec<String> {
            sections
                .get(name)
                .map(|lines| lines.iter().map(|l| l.to_string()).collect())
                .unwrap_or_default()
        };
        source.timing_points = owned("TimingPoints");
        source.hit_objects = owned("HitObjects");

        Ok(source)
    }
}

fn key_values<'a>(
    sections: &'a HashMap<&str, Vec<&'a str>>,
    name: &str,
) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
    sections
        .get(name)
        .into_iter()
        .flatten()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim(), value.trim()))
}

fn setting<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    parse_number(value, "setting").map_err(|_| BeatmapError::InvalidSetting {
        key: key.to_string(),
        value: value.to_string(),
    })
}
