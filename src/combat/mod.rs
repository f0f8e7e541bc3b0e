//! Combat resolution around the two boards.
//!
//! [`Combat`] owns both boards and everything that turns board activity into
//! HP changes: one-shot buffs, countdown timers, the interference queue and
//! the end-of-match check. Every public operation takes the match RNG and an
//! event outbox; nothing here reads a clock.
//!
//! ```
//! use duel_2048::board::{Board, Cell};
//! use duel_2048::combat::{AttackResult, Combat, Side};
//! use duel_2048::config::MatchConfig;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(1);
//! let player = Board::from_grid(&[[1024, 0, 0, 0], [0; 4], [0; 4], [0; 4]]);
//! let enemy = Board::from_grid(&[[2, 0, 0, 0], [0; 4], [0; 4], [0; 4]]);
//! let mut combat = Combat::from_boards(&MatchConfig::default(), player, enemy);
//! let mut events = Vec::new();
//!
//! let result = combat.attack(Side::Player, Cell::new(0, 0), &mut rng, &mut events);
//! assert_eq!(result, AttackResult::Resolved { value: 1024, damage: 4, interference: 0 });
//! assert_eq!(combat.hp(Side::Enemy), 1);
//! ```

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, info, trace};

use crate::board::{Board, Cell, MoveOutcome, Spawn};
use crate::config::{MatchConfig, Timings, TriggerMode};
use crate::engine::Direction;
use crate::events::{BattleEvent, LogCategory, MatchStats};
use crate::skills::SkillPool;

mod effects;

/// HP lost when a board can no longer slide.
pub const STUCK_PENALTY: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Player,
    Enemy,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Player, Side::Enemy];

    #[inline]
    pub fn opponent(self) -> Side {
        match self {
            Side::Player => Side::Enemy,
            Side::Enemy => Side::Player,
        }
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Prefix for battle-log lines.
    pub(crate) fn tag(self) -> &'static str {
        match self {
            Side::Player => "",
            Side::Enemy => "CPU ",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Player => "player",
            Side::Enemy => "enemy",
        })
    }
}

/// One-shot flags. Each is consumed by the first event that uses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Buff {
    Shield,
    Reflect,
    Double,
    Armor,
    Amplify,
    LastStand,
    Curse,
    Resurrection,
}

impl Buff {
    pub const ALL: [Buff; 8] = [
        Buff::Shield,
        Buff::Reflect,
        Buff::Double,
        Buff::Armor,
        Buff::Amplify,
        Buff::LastStand,
        Buff::Curse,
        Buff::Resurrection,
    ];

    #[inline]
    fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Compact set of [`Buff`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BuffSet(u8);

impl BuffSet {
    pub const EMPTY: BuffSet = BuffSet(0);

    #[inline]
    pub fn contains(self, buff: Buff) -> bool {
        self.0 & buff.bit() != 0
    }

    #[inline]
    pub fn insert(&mut self, buff: Buff) {
        self.0 |= buff.bit();
    }

    /// Remove `buff`, returning whether it was set.
    #[inline]
    pub fn take(&mut self, buff: Buff) -> bool {
        let had = self.contains(buff);
        self.0 &= !buff.bit();
        had
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Buff> {
        Buff::ALL.into_iter().filter(move |&b| self.contains(b))
    }
}

impl Serialize for BuffSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// Countdowns in seconds; zero means inactive.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Timers {
    /// Moves and attacks are refused while running.
    pub freeze: f32,
    /// Every move spawns a second tile while running.
    pub overflow: f32,
    /// Spawns avoid corners while running.
    pub anchor: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Fighter {
    pub hp: u32,
    pub buffs: BuffSet,
    pub timers: Timers,
    /// Damage this side inflicted, stuck penalties included.
    pub damage_dealt: u32,
}

/// Interference waiting to land on `target`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Interference {
    pub target: Side,
    pub count: u32,
    pub remaining: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackResult {
    /// The tile was spent. `damage` is what reached HP, `interference` what
    /// was sent after Amplify.
    Resolved { value: u32, damage: u32, interference: u32 },
    NotAttackable,
    /// The match is over.
    Ignored,
}

/// `(interference, damage)` bought by spending a tile of `value`.
pub fn attack_power(value: u32) -> Option<(u32, u32)> {
    match value {
        128 => Some((1, 0)),
        512 => Some((3, 1)),
        1024 => Some((0, 4)),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct Combat {
    boards: [Board; 2],
    fighters: [Fighter; 2],
    queue: Vec<Interference>,
    max_hp: u32,
    trigger: TriggerMode,
    timings: Timings,
    winner: Option<Side>,
}

impl Combat {
    /// Fresh two-tile boards for both sides, skill pools from the loadouts.
    pub fn new<R: Rng + ?Sized>(config: &MatchConfig, rng: &mut R) -> Self {
        let chance = config.effective_attach_chance();
        let boards = Side::BOTH.map(|side| Board::fresh(rng, chance, SkillPool::from_loadout(config.loadout(side))));
        let [player, enemy] = boards;
        Combat::from_boards(config, player, enemy)
    }

    /// Start from prepared boards. Board skill settings are kept as given.
    pub fn from_boards(config: &MatchConfig, player: Board, enemy: Board) -> Self {
        let fighter = Fighter { hp: config.max_hp, ..Fighter::default() };
        Combat {
            boards: [player, enemy],
            fighters: [fighter; 2],
            queue: Vec::new(),
            max_hp: config.max_hp,
            trigger: config.trigger,
            timings: config.timings,
            winner: None,
        }
    }

    #[inline]
    pub fn board(&self, side: Side) -> &Board {
        &self.boards[side.index()]
    }

    pub fn board_mut(&mut self, side: Side) -> &mut Board {
        &mut self.boards[side.index()]
    }

    #[inline]
    pub fn fighter(&self, side: Side) -> &Fighter {
        &self.fighters[side.index()]
    }

    pub fn fighter_mut(&mut self, side: Side) -> &mut Fighter {
        &mut self.fighters[side.index()]
    }

    pub fn hp(&self, side: Side) -> u32 {
        self.fighter(side).hp
    }

    pub fn max_hp(&self) -> u32 {
        self.max_hp
    }

    pub fn buffs(&self, side: Side) -> BuffSet {
        self.fighter(side).buffs
    }

    pub fn is_frozen(&self, side: Side) -> bool {
        self.fighter(side).timers.freeze > 0.0
    }

    pub fn queue(&self) -> &[Interference] {
        &self.queue
    }

    /// Interference still waiting to land on `side`.
    pub fn pending_interference(&self, side: Side) -> u32 {
        self.queue.iter().filter(|e| e.target == side).map(|e| e.count).sum()
    }

    pub fn winner(&self) -> Option<Side> {
        self.winner
    }

    #[inline]
    pub fn is_over(&self) -> bool {
        self.winner.is_some()
    }

    pub fn trigger(&self) -> TriggerMode {
        self.trigger
    }

    pub fn stats(&self) -> MatchStats {
        let board = self.board(Side::Player);
        MatchStats {
            final_score: board.score(),
            max_tile: board.max_tile(),
            total_damage_dealt: self.fighter(Side::Player).damage_dealt,
        }
    }

    /// (caster's board, opponent's board)
    fn pair_mut(&mut self, side: Side) -> (&mut Board, &mut Board) {
        let [player, enemy] = &mut self.boards;
        match side {
            Side::Player => (player, enemy),
            Side::Enemy => (enemy, player),
        }
    }

    fn buff_snapshot(&self) -> [BuffSet; 2] {
        self.fighters.map(|f| f.buffs)
    }

    fn emit_buffs(&self, before: [BuffSet; 2], out: &mut Vec<BattleEvent>) {
        let [player, enemy] = self.buff_snapshot();
        if [player, enemy] != before {
            out.push(BattleEvent::BuffsChanged { player, enemy });
        }
    }

    fn emit_hp(&self, side: Side, out: &mut Vec<BattleEvent>) {
        out.push(BattleEvent::HpChanged { side, hp: self.hp(side), max_hp: self.max_hp });
        out.push(BattleEvent::MatchPoint { player_hp: self.hp(Side::Player), enemy_hp: self.hp(Side::Enemy) });
    }

    fn emit_queue(&self, out: &mut Vec<BattleEvent>) {
        let total = self.queue.iter().map(|e| e.count).sum();
        let next_delay = self.queue.iter().map(|e| e.remaining).reduce(f32::min);
        out.push(BattleEvent::InterferenceQueue { total, next_delay });
    }

    /// Slide `side`'s board and resolve everything the move causes: the new
    /// spawn(s), released skills, 256 interference and the stuck check.
    ///
    /// The returned outcome has `moved == false` when nothing happened.
    pub fn apply_move<R: Rng + ?Sized>(
        &mut self,
        side: Side,
        dir: Direction,
        rng: &mut R,
        out: &mut Vec<BattleEvent>,
    ) -> MoveOutcome {
        if self.is_over() {
            return MoveOutcome::default();
        }
        let before = self.buff_snapshot();
        let outcome = self.boards[side.index()].slide(dir);
        if !outcome.moved {
            return outcome;
        }

        let timers = self.fighter(side).timers;
        let spawn = Spawn::RANDOM.avoiding_corners(timers.anchor > 0.0);
        let board = &mut self.boards[side.index()];
        board.spawn_random_tile(rng, spawn);
        if timers.overflow > 0.0 {
            board.spawn_random_tile(rng, spawn);
        }
        out.push(BattleEvent::ScoreChanged { side, score: board.score() });

        self.fire_skills(side, &outcome, rng, out);

        if !self.is_over() && outcome.created(256) {
            out.push(BattleEvent::log(
                format!("⚡ {}256! → interference ×1", side.tag()),
                LogCategory::Interference,
            ));
            self.send_interference(side, 1, rng, out);
        }
        self.check_stuck(side, rng, out);
        self.emit_buffs(before, out);
        outcome
    }

    fn fire_skills<R: Rng + ?Sized>(&mut self, side: Side, outcome: &MoveOutcome, rng: &mut R, out: &mut Vec<BattleEvent>) {
        match self.trigger {
            TriggerMode::AttachedTiles => {
                for released in &outcome.triggered {
                    if self.is_over() {
                        break;
                    }
                    self.cast(side, released.skill, Some(released.cell), rng, out);
                }
            }
            TriggerMode::MergeChance { rate } => {
                let Some(first) = outcome.merges.first() else { return };
                if rng.gen::<f64>() >= rate {
                    return;
                }
                if let Some(skill) = self.board(side).pool().draw(rng) {
                    self.cast(side, skill, Some(first.cell), rng, out);
                }
            }
        }
    }

    /// Spend the attack tile at `cell` on `side`'s board.
    pub fn attack<R: Rng + ?Sized>(
        &mut self,
        side: Side,
        cell: Cell,
        rng: &mut R,
        out: &mut Vec<BattleEvent>,
    ) -> AttackResult {
        if self.is_over() {
            return AttackResult::Ignored;
        }
        let value = self.board(side).value(cell);
        let Some((base_interference, base_damage)) = attack_power(value) else {
            return AttackResult::NotAttackable;
        };
        let before = self.buff_snapshot();
        self.boards[side.index()].remove_tile(cell);

        let (icon, text, category) = match value {
            128 => ("⚔️", "128! → interference ×1".to_string(), LogCategory::Interference),
            512 => ("💥", "512! → 1 DMG + interference ×3".to_string(), LogCategory::Attack),
            _ => ("🔥", "1024! → 4 DAMAGE!".to_string(), LogCategory::Damage),
        };
        out.push(BattleEvent::log_with_icon(format!("{icon} {}{text}", side.tag()), category, icon));
        debug!(%side, value, %cell, "attack");

        let damage = self.deal_damage(side, base_damage, out);
        let interference = self.send_interference(side, base_interference, rng, out);

        self.check_defeat(side.opponent(), rng, out);
        self.check_defeat(side, rng, out);
        self.emit_buffs(before, out);
        AttackResult::Resolved { value, damage, interference }
    }

    /// Run `base` damage from `attacker` through the defender's buffs.
    /// Returns the damage that reached HP.
    pub(crate) fn deal_damage(&mut self, attacker: Side, base: u32, out: &mut Vec<BattleEvent>) -> u32 {
        if base == 0 {
            return 0;
        }
        let defender = attacker.opponent();
        let (a, d) = (attacker.index(), defender.index());

        if self.fighters[d].buffs.take(Buff::Shield) {
            out.push(BattleEvent::log(format!("🛡️ {}Shield! Attack negated!", defender.tag()), LogCategory::Attack));
            return 0;
        }
        let mut damage = base;
        if self.fighters[a].buffs.take(Buff::Double) {
            damage *= 2;
            out.push(BattleEvent::log(format!("⚡ {}Double! {damage} DAMAGE!", attacker.tag()), LogCategory::Damage));
        }
        if self.fighters[d].buffs.take(Buff::Armor) {
            damage = damage.saturating_sub(1);
            out.push(BattleEvent::log(format!("🦾 {}Armor absorbed 1", defender.tag()), LogCategory::Attack));
        }
        if damage >= 2 && damage >= self.fighters[d].hp && self.fighters[d].buffs.take(Buff::LastStand) {
            damage = 0;
            out.push(BattleEvent::log(format!("🔥 {}Last Stand! Lethal hit negated!", defender.tag()), LogCategory::Attack));
        }
        if damage == 0 {
            return 0;
        }

        let target = &mut self.fighters[d];
        target.hp = target.hp.saturating_sub(damage);
        self.fighters[a].damage_dealt += damage;
        out.push(BattleEvent::DamageDealt { target: defender, amount: damage });
        self.emit_hp(defender, out);

        if self.fighters[d].buffs.take(Buff::Curse) {
            let source = &mut self.fighters[a];
            source.hp = source.hp.saturating_sub(damage);
            self.fighters[d].damage_dealt += damage;
            out.push(BattleEvent::log(format!("💀 {}Curse! {damage} damage returned", defender.tag()), LogCategory::Damage));
            out.push(BattleEvent::DamageDealt { target: attacker, amount: damage });
            self.emit_hp(attacker, out);
        }
        damage
    }

    /// Send `count` interference from `from` to its opponent, doubled once by
    /// Amplify. Returns the amount sent.
    pub(crate) fn send_interference<R: Rng + ?Sized>(
        &mut self,
        from: Side,
        count: u32,
        rng: &mut R,
        out: &mut Vec<BattleEvent>,
    ) -> u32 {
        if count == 0 {
            return 0;
        }
        let mut count = count;
        if self.fighters[from.index()].buffs.take(Buff::Amplify) {
            count *= 2;
            out.push(BattleEvent::log(format!("📢 {}Amplify! interference ×{count}", from.tag()), LogCategory::Interference));
        }
        self.enqueue(from.opponent(), count, rng, out);
        count
    }

    fn enqueue<R: Rng + ?Sized>(&mut self, target: Side, count: u32, rng: &mut R, out: &mut Vec<BattleEvent>) {
        let delay = self.timings.interference_delay(target);
        if delay <= 0.0 {
            self.deliver(target, count, rng, out);
        } else {
            trace!(%target, count, delay, "interference queued");
            self.queue.push(Interference { target, count, remaining: delay });
            self.emit_queue(out);
        }
    }

    fn deliver<R: Rng + ?Sized>(&mut self, target: Side, count: u32, rng: &mut R, out: &mut Vec<BattleEvent>) {
        if self.is_over() {
            return;
        }
        if self.fighters[target.index()].buffs.take(Buff::Reflect) {
            out.push(BattleEvent::log(format!("🪞 {}Reflect! Interference bounced!", target.tag()), LogCategory::Interference));
            self.enqueue(target.opponent(), count, rng, out);
            return;
        }
        trace!(%target, count, "interference landed");
        let board = &mut self.boards[target.index()];
        for _ in 0..count {
            board.spawn_random_tile(rng, Spawn::interference());
        }
        self.check_stuck(target, rng, out);
    }

    /// Advance queue, timers and bombs by `dt` seconds, in that order.
    pub fn tick<R: Rng + ?Sized>(&mut self, dt: f32, rng: &mut R, out: &mut Vec<BattleEvent>) {
        if self.is_over() {
            return;
        }
        let before = self.buff_snapshot();
        self.advance_queue(dt, rng, out);
        self.advance_timers(dt, out);
        self.advance_bombs(dt, rng, out);
        self.emit_buffs(before, out);
    }

    fn advance_queue<R: Rng + ?Sized>(&mut self, dt: f32, rng: &mut R, out: &mut Vec<BattleEvent>) {
        if self.queue.is_empty() {
            return;
        }
        for entry in &mut self.queue {
            entry.remaining -= dt;
        }
        let (due, pending): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.queue).into_iter().partition(|e| e.remaining <= 0.0);
        self.queue = pending;
        if due.is_empty() {
            return;
        }
        for entry in due {
            self.deliver(entry.target, entry.count, rng, out);
        }
        self.emit_queue(out);
    }

    fn advance_timers(&mut self, dt: f32, out: &mut Vec<BattleEvent>) {
        for side in Side::BOTH {
            let timers = &mut self.fighters[side.index()].timers;
            if timers.freeze > 0.0 {
                timers.freeze = (timers.freeze - dt).max(0.0);
                if timers.freeze == 0.0 {
                    out.push(BattleEvent::FreezeChanged { side, frozen: false });
                }
            }
            timers.overflow = (timers.overflow - dt).max(0.0);
            timers.anchor = (timers.anchor - dt).max(0.0);
        }
    }

    fn advance_bombs<R: Rng + ?Sized>(&mut self, dt: f32, rng: &mut R, out: &mut Vec<BattleEvent>) {
        for side in Side::BOTH {
            if self.is_over() {
                return;
            }
            let due = self.boards[side.index()].tick_bombs(dt);
            for cell in due {
                let cleared = self.boards[side.index()].explode(cell);
                out.push(BattleEvent::BombExploded { side, cell, cleared });
                out.push(BattleEvent::log_with_icon(
                    format!("💥 {}BOMB! {cleared} tiles destroyed!", side.tag()),
                    LogCategory::Damage,
                    "💥",
                ));
                self.check_stuck(side, rng, out);
            }
        }
    }

    /// Penalise `side` if its board cannot slide, then thin the board out.
    pub(crate) fn check_stuck<R: Rng + ?Sized>(&mut self, side: Side, rng: &mut R, out: &mut Vec<BattleEvent>) {
        if self.is_over() || self.board(side).can_slide() {
            return;
        }
        let fighter = &mut self.fighters[side.index()];
        if fighter.hp <= STUCK_PENALTY && fighter.buffs.take(Buff::LastStand) {
            out.push(BattleEvent::log(format!("🔥 {}Last Stand! Stuck penalty negated", side.tag()), LogCategory::Stuck));
        } else {
            fighter.hp = fighter.hp.saturating_sub(STUCK_PENALTY);
            let hp = fighter.hp;
            self.fighters[side.opponent().index()].damage_dealt += STUCK_PENALTY;
            out.push(BattleEvent::DamageDealt { target: side, amount: STUCK_PENALTY });
            self.emit_hp(side, out);
            let who = match side {
                Side::Player => "YOU",
                Side::Enemy => "CPU",
            };
            out.push(BattleEvent::log(format!("💀 {who} STUCK! HP-{STUCK_PENALTY}"), LogCategory::Stuck));
            debug!(%side, hp, "stuck");
            if hp == 0 {
                self.check_defeat(side, rng, out);
                return;
            }
        }

        let board = &mut self.boards[side.index()];
        let mut cleared = board.clear_twos();
        while !board.can_slide() {
            let Some(&smallest) = board.value_classes().first() else { break };
            cleared += board.clear_value(smallest);
        }
        out.push(BattleEvent::BoardReset { side, cleared });
    }

    /// Resolve a side at 0 HP: Resurrection revives it, otherwise the match
    /// ends.
    fn check_defeat<R: Rng + ?Sized>(&mut self, side: Side, rng: &mut R, out: &mut Vec<BattleEvent>) {
        if self.is_over() || self.hp(side) > 0 {
            return;
        }
        if self.fighters[side.index()].buffs.take(Buff::Resurrection) {
            self.fighters[side.index()].hp = 1;
            let cleared = self.boards[side.index()].reset(rng);
            out.push(BattleEvent::log(format!("👼 {}Resurrection! Back at 1 HP", side.tag()), LogCategory::Heal));
            self.emit_hp(side, out);
            out.push(BattleEvent::BoardReset { side, cleared });
            return;
        }
        self.finish(side.opponent(), out);
    }

    fn finish(&mut self, winner: Side, out: &mut Vec<BattleEvent>) {
        if self.is_over() {
            return;
        }
        self.winner = Some(winner);
        self.queue.clear();
        let stats = self.stats();
        info!(%winner, score = stats.final_score, max_tile = stats.max_tile, damage = stats.total_damage_dealt, "match over");
        out.push(BattleEvent::GameOver { winner, stats });
    }
}
