//! Match configuration.
//!
//! Everything tunable about a match lives in [`MatchConfig`]. It is plain
//! serde data so the binaries can read it from JSON and override single
//! fields from the command line.
//!
//! ```
//! use duel_2048::config::MatchConfig;
//!
//! let cfg = MatchConfig::from_json_str(r#"{ "cpu_level": 7, "player_loadout": ["guardian", "heal"] }"#).unwrap();
//! assert_eq!(cfg.cpu_level, 7);
//! assert_eq!(cfg.max_hp, 5);
//! assert_eq!(cfg.player_loadout.len(), 2);
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::board::DEFAULT_ATTACH_CHANCE;
use crate::combat::Side;
use crate::error::ConfigError;
use crate::skills::{SkillId, MAX_LOADOUT};

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 10;

/// How skills get activated during a match. Only one model is active.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TriggerMode {
    /// Spawned tiles may carry a skill that fires when the tile merges.
    AttachedTiles,
    /// A move with at least one merge fires a pool skill with probability `rate`.
    MergeChance { rate: f64 },
}

impl Default for TriggerMode {
    fn default() -> Self {
        TriggerMode::AttachedTiles
    }
}

/// Durations, in seconds of simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Delay before interference sent to the player lands.
    pub player_interference_delay: f32,
    /// Delay before interference sent to the CPU lands; 0 is immediate.
    pub enemy_interference_delay: f32,
    pub bomb_fuse: f32,
    pub freeze: f32,
    pub overflow: f32,
    pub anchor: f32,
}

impl Default for Timings {
    fn default() -> Self {
        Timings {
            player_interference_delay: 3.0,
            enemy_interference_delay: 0.0,
            bomb_fuse: 3.0,
            freeze: 3.0,
            overflow: 5.0,
            anchor: 8.0,
        }
    }
}

impl Timings {
    #[inline]
    pub fn interference_delay(&self, target: Side) -> f32 {
        match target {
            Side::Player => self.player_interference_delay,
            Side::Enemy => self.enemy_interference_delay,
        }
    }

    fn fields(&self) -> [(&'static str, f32); 6] {
        [
            ("player_interference_delay", self.player_interference_delay),
            ("enemy_interference_delay", self.enemy_interference_delay),
            ("bomb_fuse", self.bomb_fuse),
            ("freeze", self.freeze),
            ("overflow", self.overflow),
            ("anchor", self.anchor),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// RNG seed; `None` draws one from entropy.
    pub seed: Option<u64>,
    /// CPU difficulty, 1..=10.
    pub cpu_level: u8,
    pub max_hp: u32,
    /// Equipped skills, in order. Empty means the full catalog.
    pub player_loadout: Vec<SkillId>,
    pub enemy_loadout: Vec<SkillId>,
    pub trigger: TriggerMode,
    /// Chance that a normal spawn carries a skill (attached-tile mode).
    pub skill_attach_chance: f64,
    pub timings: Timings,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            seed: None,
            cpu_level: 3,
            max_hp: 5,
            player_loadout: Vec::new(),
            enemy_loadout: Vec::new(),
            trigger: TriggerMode::default(),
            skill_attach_chance: DEFAULT_ATTACH_CHANCE,
            timings: Timings::default(),
        }
    }
}

impl MatchConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let cfg: MatchConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_LEVEL..=MAX_LEVEL).contains(&self.cpu_level) {
            return Err(ConfigError::Level(self.cpu_level));
        }
        if self.max_hp == 0 {
            return Err(ConfigError::ZeroHp);
        }
        validate_loadout(&self.player_loadout)?;
        validate_loadout(&self.enemy_loadout)?;
        check_probability("skill_attach_chance", self.skill_attach_chance)?;
        if let TriggerMode::MergeChance { rate } = self.trigger {
            check_probability("trigger.rate", rate)?;
        }
        for (name, value) in self.timings.fields() {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Timing { name, value });
            }
        }
        Ok(())
    }

    pub fn loadout(&self, side: Side) -> &[SkillId] {
        match side {
            Side::Player => &self.player_loadout,
            Side::Enemy => &self.enemy_loadout,
        }
    }

    /// Spawn attach chance actually in effect; zero unless skills ride on tiles.
    pub fn effective_attach_chance(&self) -> f64 {
        match self.trigger {
            TriggerMode::AttachedTiles => self.skill_attach_chance,
            TriggerMode::MergeChance { .. } => 0.0,
        }
    }
}

fn validate_loadout(loadout: &[SkillId]) -> Result<(), ConfigError> {
    if loadout.len() > MAX_LOADOUT {
        return Err(ConfigError::LoadoutTooLarge(loadout.len()));
    }
    let mut seen = HashSet::new();
    for &id in loadout {
        if !seen.insert(id) {
            return Err(ConfigError::DuplicateSkill(id));
        }
    }
    Ok(())
}

fn check_probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Probability { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let cfg = MatchConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.timings.interference_delay(Side::Player), 3.0);
        assert_eq!(cfg.timings.interference_delay(Side::Enemy), 0.0);
        assert_eq!(cfg.effective_attach_chance(), 0.15);
    }

    #[test]
    fn rejects_bad_values() {
        let cfg = MatchConfig { cpu_level: 11, ..MatchConfig::default() };
        assert!(matches!(cfg.validate(), Err(ConfigError::Level(11))));

        let cfg = MatchConfig { max_hp: 0, ..MatchConfig::default() };
        assert!(matches!(cfg.validate(), Err(ConfigError::ZeroHp)));

        let cfg = MatchConfig { player_loadout: SkillId::ALL[..6].to_vec(), ..MatchConfig::default() };
        assert!(matches!(cfg.validate(), Err(ConfigError::LoadoutTooLarge(6))));

        let cfg = MatchConfig { enemy_loadout: vec![SkillId::Heal, SkillId::Heal], ..MatchConfig::default() };
        assert!(matches!(cfg.validate(), Err(ConfigError::DuplicateSkill(SkillId::Heal))));

        let cfg = MatchConfig { trigger: TriggerMode::MergeChance { rate: 1.5 }, ..MatchConfig::default() };
        assert!(matches!(cfg.validate(), Err(ConfigError::Probability { .. })));

        let mut cfg = MatchConfig::default();
        cfg.timings.freeze = f32::NAN;
        assert!(matches!(cfg.validate(), Err(ConfigError::Timing { name: "freeze", .. })));
    }

    #[test]
    fn parses_trigger_modes() {
        let cfg = MatchConfig::from_json_str(r#"{ "trigger": { "mode": "merge_chance", "rate": 0.05 } }"#).unwrap();
        assert_eq!(cfg.trigger, TriggerMode::MergeChance { rate: 0.05 });
        assert_eq!(cfg.effective_attach_chance(), 0.0);
        assert!(MatchConfig::from_json_str(r#"{ "player_loadout": ["nope"] }"#).is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "seed": 9, "cpu_level": 10, "timings": {{ "freeze": 1.5 }} }}"#).unwrap();
        let cfg = MatchConfig::from_path(file.path()).unwrap();
        assert_eq!(cfg.seed, Some(9));
        assert_eq!(cfg.cpu_level, 10);
        assert_eq!(cfg.timings.freeze, 1.5);
        assert_eq!(cfg.timings.anchor, 8.0);

        let missing = file.path().with_extension("missing");
        assert!(matches!(MatchConfig::from_path(missing), Err(ConfigError::Io(_))));
    }
}
