//! Error types.
//!
//! Gameplay never fails: rejected input and exhausted resources are reported
//! through outcome values. Only configuration loading and parsing of
//! textual identifiers produce errors.

use std::io;

use crate::skills::SkillId;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cpu level {0} is outside 1..=10")]
    Level(u8),
    #[error("loadout has {0} skills, at most 5 can be equipped")]
    LoadoutTooLarge(usize),
    #[error("skill {0} is equipped twice")]
    DuplicateSkill(SkillId),
    #[error("probability {name} = {value} is outside [0, 1]")]
    Probability { name: &'static str, value: f64 },
    #[error("max_hp must be at least 1")]
    ZeroHp,
    #[error("timing {name} = {value} must be finite and non-negative")]
    Timing { name: &'static str, value: f32 },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown direction: {0:?}")]
pub struct ParseDirectionError(pub String);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown skill id: {0:?}")]
pub struct ParseSkillError(pub String);
