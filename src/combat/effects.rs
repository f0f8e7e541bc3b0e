//! The 30 skill effects.
//!
//! Every effect is written from the caster's point of view: `mine` is the
//! caster's side, `theirs` the opponent's. Boards an effect touches get a
//! stuck check afterwards, and both sides get a defeat check.

use rand::Rng;
use tracing::debug;

use super::{Buff, Combat, Side};
use crate::board::{Cell, SMALL_CLASSES};
use crate::events::{BattleEvent, LogCategory};
use crate::skills::{SkillDef, SkillId};

impl Combat {
    /// Cast `skill` for `caster`, e.g. from a UI test harness or a scripted
    /// scenario. Moves cast released skills on their own.
    pub fn cast_skill<R: Rng + ?Sized>(
        &mut self,
        caster: Side,
        skill: SkillId,
        rng: &mut R,
        out: &mut Vec<BattleEvent>,
    ) {
        let before = self.buff_snapshot();
        self.cast(caster, skill, None, rng, out);
        self.emit_buffs(before, out);
    }

    pub(crate) fn cast<R: Rng + ?Sized>(
        &mut self,
        caster: Side,
        skill: SkillId,
        origin: Option<Cell>,
        rng: &mut R,
        out: &mut Vec<BattleEvent>,
    ) {
        if self.is_over() {
            return;
        }
        let def = skill.def();
        let (mine, theirs) = (caster, caster.opponent());
        let who = caster.tag();
        let icon = def.icon;
        debug!(%caster, %skill, "skill cast");
        if let Some(cell) = origin {
            out.push(BattleEvent::SkillEffect { caster, skill, cell, icon });
        }

        let mut touched = [false; 2];
        let log = |text: String, out: &mut Vec<BattleEvent>| {
            out.push(BattleEvent::log_with_icon(format!("{icon} {who}{text}"), LogCategory::Skill, icon));
        };

        match skill {
            SkillId::LastStand => self.grant(mine, Buff::LastStand, def, out),
            SkillId::Resurrection => self.grant(mine, Buff::Resurrection, def, out),
            SkillId::Double => self.grant(mine, Buff::Double, def, out),
            SkillId::Guardian => self.grant(mine, Buff::Shield, def, out),
            SkillId::Curse => self.grant(mine, Buff::Curse, def, out),
            SkillId::Armor => self.grant(mine, Buff::Armor, def, out),
            SkillId::Reflect => self.grant(mine, Buff::Reflect, def, out),
            SkillId::Amplify => self.grant(mine, Buff::Amplify, def, out),
            SkillId::Apocalypse => {
                let n = self.boards[theirs.index()].clear_at_most(64);
                touched[theirs.index()] = true;
                log(format!("Apocalypse! {n} tiles wiped"), out);
            }
            SkillId::Cataclysm => {
                for side in Side::BOTH {
                    let cleared = self.boards[side.index()].reset(rng);
                    out.push(BattleEvent::BoardReset { side, cleared });
                }
                touched = [true; 2];
                log("Cataclysm! Both boards reset".to_string(), out);
            }
            SkillId::Mirror => {
                let (board, other) = self.pair_mut(mine);
                board.copy_from(other);
                touched[mine.index()] = true;
                log("Mirror! Board copied".to_string(), out);
            }
            SkillId::Heal => {
                let max_hp = self.max_hp;
                let fighter = &mut self.fighters[mine.index()];
                fighter.hp = (fighter.hp + 2).min(max_hp);
                self.emit_hp(mine, out);
                out.push(BattleEvent::log_with_icon(format!("{icon} {who}Heal! +2 HP"), LogCategory::Heal, icon));
            }
            SkillId::Boost => {
                if let Some(value) = self.boards[mine.index()].double_random_class(rng) {
                    touched[mine.index()] = true;
                    log(format!("Boost! {value}s doubled"), out);
                }
            }
            SkillId::Weaken => {
                if let Some((_, value)) = self.boards[theirs.index()].halve_max_tile() {
                    touched[theirs.index()] = true;
                    log(format!("Weaken! Highest tile cut to {value}"), out);
                }
            }
            SkillId::Decay => {
                let n = self.boards[theirs.index()].halve_all();
                touched[theirs.index()] = true;
                log(format!("Decay! {n} tiles halved"), out);
            }
            SkillId::Fusion => {
                if let Some(merge) = self.boards[mine.index()].merge_one_pair() {
                    touched[mine.index()] = true;
                    out.push(BattleEvent::ScoreChanged { side: mine, score: self.board(mine).score() });
                    log(format!("Fusion! {} formed", merge.value), out);
                }
            }
            SkillId::Purify => {
                let timers = &mut self.fighters[mine.index()].timers;
                let was_frozen = timers.freeze > 0.0;
                timers.freeze = 0.0;
                timers.overflow = 0.0;
                if was_frozen {
                    out.push(BattleEvent::FreezeChanged { side: mine, frozen: false });
                }
                let opponent = &mut self.fighters[theirs.index()];
                opponent.buffs.clear();
                opponent.timers.anchor = 0.0;
                log("Purify! Debuffs cleansed".to_string(), out);
            }
            SkillId::Swap => {
                let (board, other) = self.pair_mut(mine);
                board.swap_with(other);
                touched = [true; 2];
                log("Swap! Boards exchanged".to_string(), out);
            }
            SkillId::DoubleEdge => {
                log("Double Edge!".to_string(), out);
                self.deal_damage(mine, 2, out);
                let fighter = &mut self.fighters[mine.index()];
                if fighter.hp > 1 {
                    fighter.hp -= 1;
                    self.emit_hp(mine, out);
                }
            }
            SkillId::Overflow => {
                self.fighters[theirs.index()].timers.overflow = self.timings.overflow;
                log("Overflow! Double spawns incoming".to_string(), out);
            }
            SkillId::TimeBomb => {
                let fuse = self.timings.bomb_fuse;
                if let Some((_, value)) = self.boards[theirs.index()].plant_bomb(rng, fuse) {
                    touched[theirs.index()] = true;
                    log(format!("Time Bomb [{value}] planted! {fuse:.0}s"), out);
                }
            }
            SkillId::Vanish => {
                let value = SMALL_CLASSES[rng.gen_range(0..SMALL_CLASSES.len())];
                let n = self.boards[mine.index()].clear_value(value);
                touched[mine.index()] = true;
                log(format!("Vanish! {n} × {value} cleared"), out);
            }
            SkillId::Anchor => {
                self.fighters[mine.index()].timers.anchor = self.timings.anchor;
                log("Anchor! Corners sealed".to_string(), out);
            }
            SkillId::Scramble => {
                self.boards[theirs.index()].shuffle(rng);
                touched[theirs.index()] = true;
                log("Scramble!".to_string(), out);
            }
            SkillId::Sweep => {
                let n = self.boards[mine.index()].clear_twos();
                touched[mine.index()] = true;
                log(format!("Sweep! {n} × 2 cleared"), out);
            }
            SkillId::Freeze => {
                let secs = self.timings.freeze;
                self.fighters[theirs.index()].timers.freeze = secs;
                out.push(BattleEvent::FreezeChanged { side: theirs, frozen: true });
                log(format!("Freeze! {secs:.0}s stop"), out);
            }
            SkillId::Smash => {
                if let Some((_, value)) = self.boards[theirs.index()].remove_random(rng) {
                    touched[theirs.index()] = true;
                    log(format!("Smash! {value} destroyed"), out);
                }
            }
            SkillId::Steal => {
                // the tile needs somewhere to land before it is taken
                if self.boards[mine.index()].empty_cells().is_empty() {
                    log("Steal! No room to take a tile".to_string(), out);
                } else if let Some(value) = self.boards[theirs.index()].take_random_low(rng) {
                    self.boards[mine.index()].place_random(rng, value);
                    touched = [true; 2];
                    log(format!("Steal! Took a {value}"), out);
                }
            }
            SkillId::Upgrade => {
                if self.boards[mine.index()].convert_random_two(rng).is_some() {
                    touched[mine.index()] = true;
                    log("Upgrade! 2 → 4".to_string(), out);
                }
            }
            SkillId::Disrupt => {
                log("Disrupt! interference ×1".to_string(), out);
                self.send_interference(mine, 1, rng, out);
            }
        }

        for side in Side::BOTH {
            if touched[side.index()] {
                self.check_stuck(side, rng, out);
            }
        }
        self.check_defeat(theirs, rng, out);
        self.check_defeat(mine, rng, out);
    }

    fn grant(&mut self, side: Side, buff: Buff, def: &SkillDef, out: &mut Vec<BattleEvent>) {
        self.fighters[side.index()].buffs.insert(buff);
        out.push(BattleEvent::log_with_icon(
            format!("{} {}{} ready!", def.icon, side.tag(), def.name),
            LogCategory::Skill,
            def.icon,
        ));
    }
}
