//! Static skill catalog and weighted selection.
//!
//! The catalog is a fixed table of 30 [`SkillDef`]s indexed by [`SkillId`].
//! Nothing here mutates at runtime; a match only narrows the table down to an
//! equipped loadout through [`SkillPool`].
//!
//! ```
//! use duel_2048::skills::{weighted_draw, SkillId, SkillPool};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(3);
//! assert_eq!(weighted_draw(&mut rng, &[SkillId::Freeze]), Some(SkillId::Freeze));
//! assert!(SkillPool::Catalog.draw(&mut rng).is_some());
//! assert_eq!(SkillId::Guardian.def().rarity, 5);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ParseSkillError;

/// Most skills a side may equip for a match.
pub const MAX_LOADOUT: usize = 5;
/// Cost budget the loadout screen works with.
pub const LOADOUT_COST_BUDGET: u32 = 20;

/// Identifier of one of the 30 catalog skills. Discriminants follow catalog
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillId {
    LastStand,
    Resurrection,
    Apocalypse,
    Double,
    Guardian,
    Cataclysm,
    Curse,
    Mirror,
    Heal,
    Boost,
    Weaken,
    Armor,
    Decay,
    Fusion,
    Reflect,
    Purify,
    Amplify,
    Swap,
    DoubleEdge,
    Overflow,
    TimeBomb,
    Vanish,
    Anchor,
    Scramble,
    Sweep,
    Freeze,
    Smash,
    Steal,
    Upgrade,
    Disrupt,
}

/// Broad role of a skill, used by loadout screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Attack,
    Defense,
    Effect,
}

/// Immutable catalog record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkillDef {
    pub id: SkillId,
    pub name: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
    /// Relative activation weight for weighted draws.
    pub weight: u32,
    pub cost: u32,
    /// Rarity tier, 1 (common) to 5.
    pub rarity: u8,
    pub category: Category,
}

impl SkillId {
    /// Every skill in catalog order.
    pub const ALL: [SkillId; 30] = [
        SkillId::LastStand,
        SkillId::Resurrection,
        SkillId::Apocalypse,
        SkillId::Double,
        SkillId::Guardian,
        SkillId::Cataclysm,
        SkillId::Curse,
        SkillId::Mirror,
        SkillId::Heal,
        SkillId::Boost,
        SkillId::Weaken,
        SkillId::Armor,
        SkillId::Decay,
        SkillId::Fusion,
        SkillId::Reflect,
        SkillId::Purify,
        SkillId::Amplify,
        SkillId::Swap,
        SkillId::DoubleEdge,
        SkillId::Overflow,
        SkillId::TimeBomb,
        SkillId::Vanish,
        SkillId::Anchor,
        SkillId::Scramble,
        SkillId::Sweep,
        SkillId::Freeze,
        SkillId::Smash,
        SkillId::Steal,
        SkillId::Upgrade,
        SkillId::Disrupt,
    ];

    /// Catalog entry for this id.
    #[inline]
    pub fn def(self) -> &'static SkillDef {
        &CATALOG[self as usize]
    }

    /// Stable string id, as used in configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            SkillId::LastStand => "last_stand",
            SkillId::Resurrection => "resurrection",
            SkillId::Apocalypse => "apocalypse",
            SkillId::Double => "double",
            SkillId::Guardian => "guardian",
            SkillId::Cataclysm => "cataclysm",
            SkillId::Curse => "curse",
            SkillId::Mirror => "mirror",
            SkillId::Heal => "heal",
            SkillId::Boost => "boost",
            SkillId::Weaken => "weaken",
            SkillId::Armor => "armor",
            SkillId::Decay => "decay",
            SkillId::Fusion => "fusion",
            SkillId::Reflect => "reflect",
            SkillId::Purify => "purify",
            SkillId::Amplify => "amplify",
            SkillId::Swap => "swap",
            SkillId::DoubleEdge => "double_edge",
            SkillId::Overflow => "overflow",
            SkillId::TimeBomb => "time_bomb",
            SkillId::Vanish => "vanish",
            SkillId::Anchor => "anchor",
            SkillId::Scramble => "scramble",
            SkillId::Sweep => "sweep",
            SkillId::Freeze => "freeze",
            SkillId::Smash => "smash",
            SkillId::Steal => "steal",
            SkillId::Upgrade => "upgrade",
            SkillId::Disrupt => "disrupt",
        }
    }
}

impl fmt::Display for SkillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkillId {
    type Err = ParseSkillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        SkillId::ALL
            .into_iter()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| ParseSkillError(s.to_string()))
    }
}

const fn skill(
    id: SkillId,
    name: &'static str,
    icon: &'static str,
    description: &'static str,
    rarity: u8,
    cost: u32,
    weight: u32,
    category: Category,
) -> SkillDef {
    SkillDef { id, name, icon, description, weight, cost, rarity, category }
}

use Category::{Attack, Defense, Effect};

/// The catalog. Weights fall with rarity: 35 / 30 / 20 / 10 / 3.
pub static CATALOG: [SkillDef; 30] = [
    skill(SkillId::LastStand, "Last Stand", "🔥", "Negate the next lethal hit of 2+ damage", 5, 10, 3, Defense),
    skill(SkillId::Resurrection, "Resurrection", "👼", "Revive once at 1 HP with a fresh board", 5, 10, 3, Defense),
    skill(SkillId::Apocalypse, "Apocalypse", "☄️", "Wipe every opponent tile of 64 or less", 5, 9, 3, Attack),
    skill(SkillId::Double, "Double", "⚡", "Next attack deals double damage", 5, 9, 3, Attack),
    skill(SkillId::Guardian, "Guardian", "🛡️", "Negate the next attack", 5, 9, 3, Defense),
    skill(SkillId::Cataclysm, "Cataclysm", "🌋", "Reset both boards", 5, 9, 3, Effect),
    skill(SkillId::Curse, "Curse", "💀", "Reflect the next damage taken back to the attacker", 4, 5, 10, Defense),
    skill(SkillId::Mirror, "Mirror", "🪩", "Copy the opponent's board", 4, 5, 10, Effect),
    skill(SkillId::Heal, "Heal", "💚", "Recover 2 HP", 4, 6, 10, Defense),
    skill(SkillId::Boost, "Boost", "🚀", "Double every tile of one random value", 4, 5, 10, Effect),
    skill(SkillId::Weaken, "Weaken", "🥀", "Halve the opponent's highest tile", 4, 5, 10, Attack),
    skill(SkillId::Armor, "Armor", "🦾", "Reduce the next damage taken by 1", 4, 5, 10, Defense),
    skill(SkillId::Decay, "Decay", "🍂", "Halve every opponent tile", 4, 5, 10, Attack),
    skill(SkillId::Fusion, "Fusion", "🧬", "Merge one adjacent pair instantly", 4, 5, 10, Effect),
    skill(SkillId::Reflect, "Reflect", "🪞", "Bounce the next interference back", 3, 4, 20, Defense),
    skill(SkillId::Purify, "Purify", "✨", "Cleanse own debuffs and strip opponent buffs", 3, 4, 20, Defense),
    skill(SkillId::Amplify, "Amplify", "📢", "Next interference sent is doubled", 3, 4, 20, Attack),
    skill(SkillId::Swap, "Swap", "🔀", "Exchange boards with the opponent", 3, 4, 20, Effect),
    skill(SkillId::DoubleEdge, "Double Edge", "🗡️", "Deal 2 damage, take 1", 3, 4, 20, Attack),
    skill(SkillId::Overflow, "Overflow", "🌊", "Opponent spawns two tiles per move for a while", 2, 3, 30, Attack),
    skill(SkillId::TimeBomb, "Time Bomb", "💣", "Plant a bomb on the opponent's board", 2, 3, 30, Attack),
    skill(SkillId::Vanish, "Vanish", "🎲", "Clear every own tile of one random value", 2, 3, 30, Effect),
    skill(SkillId::Anchor, "Anchor", "⚓", "Keep new tiles out of the corners for a while", 2, 3, 30, Defense),
    skill(SkillId::Scramble, "Scramble", "🌀", "Shuffle the opponent's tiles", 2, 3, 30, Attack),
    skill(SkillId::Sweep, "Sweep", "🧹", "Clear every own 2", 2, 3, 30, Effect),
    skill(SkillId::Freeze, "Freeze", "❄️", "Stop the opponent for 3 seconds", 1, 2, 35, Attack),
    skill(SkillId::Smash, "Smash", "🔨", "Destroy a random opponent tile", 1, 2, 35, Attack),
    skill(SkillId::Steal, "Steal", "🦝", "Take a small tile from the opponent", 1, 2, 35, Effect),
    skill(SkillId::Upgrade, "Upgrade", "⬆️", "Turn one own 2 into a 4", 1, 2, 35, Effect),
    skill(SkillId::Disrupt, "Disrupt", "📡", "Send one interference", 1, 2, 35, Attack),
];

/// Cumulative-weight draw over `candidates` in their given order.
///
/// A uniform value in `[0, total)` is reduced by each candidate's weight until
/// it drops to zero or below. Returns `None` for an empty list.
pub fn weighted_draw<R: Rng + ?Sized>(rng: &mut R, candidates: &[SkillId]) -> Option<SkillId> {
    let total: u32 = candidates.iter().map(|id| id.def().weight).sum();
    if total == 0 {
        return None;
    }
    let mut roll = rng.gen::<f64>() * f64::from(total);
    for &id in candidates {
        roll -= f64::from(id.def().weight);
        if roll <= 0.0 {
            return Some(id);
        }
    }
    candidates.last().copied()
}

/// Which skills a side can roll during a match.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SkillPool {
    /// The full 30-entry catalog.
    #[default]
    Catalog,
    /// An equipped loadout, in loadout order.
    Equipped(Vec<SkillId>),
}

impl SkillPool {
    /// Empty loadouts fall back to the catalog.
    pub fn from_loadout(loadout: &[SkillId]) -> Self {
        if loadout.is_empty() {
            SkillPool::Catalog
        } else {
            SkillPool::Equipped(loadout.to_vec())
        }
    }

    pub fn ids(&self) -> &[SkillId] {
        match self {
            SkillPool::Catalog => &SkillId::ALL,
            SkillPool::Equipped(ids) => ids,
        }
    }

    #[inline]
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<SkillId> {
        weighted_draw(rng, self.ids())
    }
}

/// Summed cost of a loadout.
pub fn loadout_cost(loadout: &[SkillId]) -> u32 {
    loadout.iter().map(|id| id.def().cost).sum()
}

/// Outcome of [`simulate_draws`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DrawReport {
    pub games: u32,
    pub triggers: u64,
    pub per_skill: BTreeMap<SkillId, u64>,
    /// Trigger counts by rarity, index 0 is rarity 1.
    pub per_rarity: [u64; 5],
    /// Games in which at least one rarity-5 skill fired.
    pub games_with_rarity5: u32,
}

impl DrawReport {
    pub fn average_triggers(&self) -> f64 {
        if self.games == 0 {
            0.0
        } else {
            self.triggers as f64 / f64::from(self.games)
        }
    }

    /// Share of triggers per rarity tier, in percent.
    pub fn rarity_shares(&self) -> [f64; 5] {
        let mut shares = [0.0; 5];
        if self.triggers > 0 {
            for (share, &count) in shares.iter_mut().zip(&self.per_rarity) {
                *share = count as f64 * 100.0 / self.triggers as f64;
            }
        }
        shares
    }
}

impl fmt::Display for DrawReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} games | {:.2} skills per game | rarity-5 in {:.1}% of games",
            self.games,
            self.average_triggers(),
            100.0 * f64::from(self.games_with_rarity5) / f64::from(self.games.max(1))
        )?;
        for (rarity, share) in self.rarity_shares().iter().enumerate() {
            writeln!(f, "  rarity {}: {share:>5.1}%", rarity + 1)?;
        }
        for (id, count) in &self.per_skill {
            writeln!(f, "  {:<14} {count}", id.def().name)?;
        }
        Ok(())
    }
}

/// Monte Carlo estimate of how often each loadout skill fires: every spawned
/// tile carries a skill with probability `attach_rate`, drawn by weight.
pub fn simulate_draws<R: Rng + ?Sized>(
    rng: &mut R,
    loadout: &[SkillId],
    games: u32,
    tiles_per_game: u32,
    attach_rate: f64,
) -> DrawReport {
    let pool = SkillPool::from_loadout(loadout);
    let mut report = DrawReport { games, ..DrawReport::default() };
    for _ in 0..games {
        let mut saw_rarity5 = false;
        for _ in 0..tiles_per_game {
            if !rng.gen_bool(attach_rate.clamp(0.0, 1.0)) {
                continue;
            }
            let Some(id) = pool.draw(rng) else { continue };
            let rarity = id.def().rarity;
            report.triggers += 1;
            *report.per_skill.entry(id).or_insert(0) += 1;
            report.per_rarity[usize::from(rarity - 1)] += 1;
            saw_rarity5 |= rarity == 5;
        }
        if saw_rarity5 {
            report.games_with_rarity5 += 1;
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn catalog_is_indexed_by_id() {
        for (idx, def) in CATALOG.iter().enumerate() {
            assert_eq!(def.id as usize, idx, "{} out of place", def.id);
            assert_eq!(SkillId::ALL[idx], def.id);
            assert!((1..=5).contains(&def.rarity));
            assert!(def.weight > 0);
        }
    }

    #[test]
    fn rarity_tiers_match_weights() {
        for def in CATALOG.iter() {
            let expected = match def.rarity {
                5 => 3,
                4 => 10,
                3 => 20,
                2 => 30,
                _ => 35,
            };
            assert_eq!(def.weight, expected, "{}", def.id);
        }
    }

    #[test]
    fn string_ids_round_trip() {
        for id in SkillId::ALL {
            assert_eq!(id.as_str().parse::<SkillId>().unwrap(), id);
        }
        assert_eq!("Double-Edge".parse::<SkillId>().unwrap(), SkillId::DoubleEdge);
        assert!("shield".parse::<SkillId>().is_err());
    }

    #[test]
    fn single_entry_draw_always_returns_it() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            assert_eq!(weighted_draw(&mut rng, &[SkillId::Heal]), Some(SkillId::Heal));
        }
    }

    #[test]
    fn empty_pool_draws_nothing() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(weighted_draw(&mut rng, &[]), None);
        assert_eq!(SkillPool::Equipped(Vec::new()).draw(&mut rng), None);
    }

    #[test]
    fn equal_weights_converge_to_uniform() {
        // all rarity-1 skills weigh 35
        let pool = [SkillId::Freeze, SkillId::Smash, SkillId::Steal, SkillId::Upgrade, SkillId::Disrupt];
        let mut rng = StdRng::seed_from_u64(2024);
        let n = 50_000;
        let mut counts = BTreeMap::new();
        for _ in 0..n {
            let id = weighted_draw(&mut rng, &pool).unwrap();
            *counts.entry(id).or_insert(0u32) += 1;
        }
        for id in pool {
            let share = f64::from(counts[&id]) / f64::from(n);
            assert!((share - 0.2).abs() < 0.015, "{id}: {share}");
        }
    }

    #[test]
    fn weighted_draw_follows_weights() {
        // 3 vs 35
        let pool = [SkillId::Double, SkillId::Freeze];
        let mut rng = StdRng::seed_from_u64(99);
        let n = 40_000;
        let doubles = (0..n).filter(|_| weighted_draw(&mut rng, &pool) == Some(SkillId::Double)).count();
        let share = doubles as f64 / n as f64;
        assert!((share - 3.0 / 38.0).abs() < 0.01, "{share}");
    }

    #[test]
    fn loadout_cost_sums_catalog_costs() {
        let balanced = [SkillId::Double, SkillId::Boost, SkillId::Sweep, SkillId::Scramble];
        assert_eq!(loadout_cost(&balanced), 20);
        assert!(loadout_cost(&balanced) <= LOADOUT_COST_BUDGET);
    }

    #[test]
    fn simulate_draws_counts_only_loadout_skills() {
        let loadout = [SkillId::Guardian, SkillId::Double, SkillId::Freeze];
        let mut rng = StdRng::seed_from_u64(5);
        let report = simulate_draws(&mut rng, &loadout, 200, 400, 0.05);
        assert!(report.triggers > 0);
        assert!(report.per_skill.keys().all(|id| loadout.contains(id)));
        assert_eq!(report.per_rarity.iter().sum::<u64>(), report.triggers);
        let shares: f64 = report.rarity_shares().iter().sum();
        assert!((shares - 100.0).abs() < 1e-6);
        assert!(report.games_with_rarity5 <= report.games);
    }

    #[test]
    fn draw_report_prints_shares_as_percent() {
        let report = DrawReport {
            games: 2,
            triggers: 5,
            per_skill: BTreeMap::from([(SkillId::Freeze, 2), (SkillId::Guardian, 3)]),
            per_rarity: [2, 0, 0, 0, 3],
            games_with_rarity5: 1,
        };
        let text = report.to_string();
        assert!(text.starts_with("2 games | 2.50 skills per game | rarity-5 in 50.0% of games\n"), "{text}");
        assert!(text.contains("  rarity 1:  40.0%\n"), "{text}");
        assert!(text.contains("  rarity 5:  60.0%\n"), "{text}");
        assert!(!text.contains("4000"), "{text}");
    }
}
