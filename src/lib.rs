//! duel-2048: a two-board 2048 battle engine
//!
//! Two 4x4 boards play at the same time: one for the player, one for a CPU
//! opponent. Building big tiles turns into attacks, skills ride on spawned
//! tiles and fire when they merge, and a jammed board costs HP.
//!
//! This crate provides:
//! - [`board::Board`]: slide/merge physics with per-cell metadata (bombs,
//!   attached skills, interference tiles) and the bulk mutations skills need
//! - [`engine::Bitboard`]: a packed board with table-driven shifts, used by
//!   the CPU search
//! - [`skills`]: the 30-entry skill catalog and weighted draws
//! - [`combat::Combat`]: HP, buffs, timers, the interference queue and every
//!   skill effect
//! - [`cpu::CpuPolicy`]: levels 1..=10, up to a sampled expectimax search
//! - [`battle::Battle`]: the tick-driven match loop that ties it together
//!
//! Quick start:
//! ```
//! use duel_2048::battle::Battle;
//! use duel_2048::config::MatchConfig;
//! use duel_2048::cpu::CpuPolicy;
//! use duel_2048::events::BattleEvent;
//!
//! let config = MatchConfig { seed: Some(7), cpu_level: 3, ..MatchConfig::default() };
//! let mut battle = Battle::new(&config).unwrap();
//! let mut pilot = CpuPolicy::new(3);
//!
//! // Ten simulated seconds at 60 Hz, the player moving twice a second
//! for frame in 0..600 {
//!     if frame % 30 == 0 {
//!         battle.autoplay(&mut pilot);
//!     }
//!     battle.tick(1.0 / 60.0);
//! }
//! let events = battle.drain_events();
//! assert!(events.iter().any(|e| matches!(e, BattleEvent::ScoreChanged { .. })));
//! ```
//!
//! All randomness flows through an injected [`rand::Rng`]; a seeded
//! [`config::MatchConfig`] replays the same match.

pub mod battle;
pub mod board;
pub mod combat;
pub mod config;
pub mod cpu;
pub mod engine;
pub mod error;
pub mod events;
pub mod scheduler;
pub mod skills;

pub use battle::{Battle, Submit};
pub use board::{Board, Cell};
pub use combat::{AttackResult, Combat, Side};
pub use config::MatchConfig;
pub use cpu::CpuPolicy;
pub use engine::Direction;
pub use error::ConfigError;
pub use events::BattleEvent;
pub use skills::SkillId;
