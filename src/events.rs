//! Typed messages for whoever renders a match.
//!
//! The simulation never calls back into a UI. Every observable change is
//! pushed onto an outbox (`Vec<BattleEvent>`) owned by the match, and the
//! consumer drains it between ticks with
//! [`Battle::drain_events`](crate::battle::Battle::drain_events).

use serde::Serialize;

use crate::board::Cell;
use crate::combat::{BuffSet, Side};
use crate::skills::SkillId;

/// Coarse kind of a battle-log line, for colouring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    Attack,
    Damage,
    Interference,
    Skill,
    Stuck,
    Heal,
}

/// End-of-match numbers, always from the player's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MatchStats {
    pub final_score: u64,
    pub max_tile: u32,
    pub total_damage_dealt: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BattleEvent {
    HpChanged { side: Side, hp: u32, max_hp: u32 },
    ScoreChanged { side: Side, score: u64 },
    DamageDealt { target: Side, amount: u32 },
    /// Pending interference after any queue change.
    InterferenceQueue { total: u32, next_delay: Option<f32> },
    BoardReset { side: Side, cleared: usize },
    BombExploded { side: Side, cell: Cell, cleared: usize },
    Log { text: String, category: LogCategory, icon: Option<&'static str> },
    /// Both HP values after any HP change.
    MatchPoint { player_hp: u32, enemy_hp: u32 },
    FreezeChanged { side: Side, frozen: bool },
    /// A skill fired from a merge cell (the "bullet" animation).
    SkillEffect { caster: Side, skill: SkillId, cell: Cell, icon: &'static str },
    BuffsChanged { player: BuffSet, enemy: BuffSet },
    GameOver { winner: Side, stats: MatchStats },
}

impl BattleEvent {
    pub fn log(text: impl Into<String>, category: LogCategory) -> Self {
        BattleEvent::Log { text: text.into(), category, icon: None }
    }

    pub fn log_with_icon(text: impl Into<String>, category: LogCategory, icon: &'static str) -> Self {
        BattleEvent::Log { text: text.into(), category, icon: Some(icon) }
    }

    pub fn is_game_over(&self) -> bool {
        matches!(self, BattleEvent::GameOver { .. })
    }
}
