//! The match loop: one player, one CPU, one clock.
//!
//! [`Battle`] glues the pieces together. Input arrives through
//! [`submit_move`](Battle::submit_move) and
//! [`submit_attack`](Battle::submit_attack); time arrives through
//! [`tick`](Battle::tick). Each tick first advances [`Combat`] (interference
//! delivery, timed effects, bombs) and then the [`Scheduler`], which runs
//! any CPU turn that came due. Observable changes pile up as
//! [`BattleEvent`]s until [`drain_events`](Battle::drain_events).
//!
//! ```
//! use duel_2048::battle::{Battle, Submit};
//! use duel_2048::config::MatchConfig;
//! use duel_2048::engine::Direction;
//!
//! let config = MatchConfig { seed: Some(42), cpu_level: 2, ..MatchConfig::default() };
//! let mut battle = Battle::new(&config).unwrap();
//! for _ in 0..120 {
//!     battle.tick(1.0 / 60.0);
//! }
//! let _ = battle.submit_move(Direction::Left);
//! let events = battle.drain_events();
//! assert!(!events.is_empty());
//! assert!(battle.drain_events().is_empty());
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::board::{Board, Cell, MoveOutcome};
use crate::combat::{AttackResult, Combat, Side};
use crate::config::MatchConfig;
use crate::cpu::{CpuPolicy, OpponentView};
use crate::engine::Direction;
use crate::error::ConfigError;
use crate::events::BattleEvent;
use crate::scheduler::Scheduler;

/// Result of [`Battle::submit_move`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submit {
    Applied(MoveOutcome),
    /// The move is legal to submit but changes nothing.
    NoChange,
    /// Paused, stopped, frozen or over.
    Ignored,
}

impl Submit {
    pub fn is_applied(&self) -> bool {
        matches!(self, Submit::Applied(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Job {
    CpuTurn,
}

pub struct Battle {
    rng: StdRng,
    seed: u64,
    combat: Combat,
    cpu: CpuPolicy,
    scheduler: Scheduler<Job>,
    events: Vec<BattleEvent>,
    paused: bool,
    stopped: bool,
    elapsed: f64,
}

impl Battle {
    /// Validate `config`, deal both boards and schedule the first CPU turn.
    pub fn new(config: &MatchConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (seed, mut rng) = seeded_rng(config);
        let combat = Combat::new(config, &mut rng);
        Ok(Self::start(config, seed, rng, combat))
    }

    /// Like [`new`](Self::new) but starting from prepared boards.
    pub fn with_boards(config: &MatchConfig, player: Board, enemy: Board) -> Result<Self, ConfigError> {
        config.validate()?;
        let (seed, rng) = seeded_rng(config);
        let combat = Combat::from_boards(config, player, enemy);
        Ok(Self::start(config, seed, rng, combat))
    }

    fn start(config: &MatchConfig, seed: u64, mut rng: StdRng, combat: Combat) -> Self {
        let cpu = CpuPolicy::new(config.cpu_level);
        let mut scheduler = Scheduler::new();
        scheduler.schedule(cpu.thinking_delay(false, &mut rng), Job::CpuTurn);
        info!(seed, level = cpu.level(), max_hp = config.max_hp, "match start");
        Battle {
            rng,
            seed,
            combat,
            cpu,
            scheduler,
            events: Vec::new(),
            paused: false,
            stopped: false,
            elapsed: 0.0,
        }
    }

    /// Seed actually used, for replaying this match.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[inline]
    pub fn combat(&self) -> &Combat {
        &self.combat
    }

    #[inline]
    pub fn cpu(&self) -> &CpuPolicy {
        &self.cpu
    }

    pub fn board(&self, side: Side) -> &Board {
        self.combat.board(side)
    }

    pub fn winner(&self) -> Option<Side> {
        self.combat.winner()
    }

    pub fn is_over(&self) -> bool {
        self.combat.is_over()
    }

    /// Simulated seconds since the match started, excluding pauses.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// End the match without a winner. Nothing runs afterwards.
    pub fn stop(&mut self) {
        if !self.stopped {
            debug!(elapsed = self.elapsed, "match stopped");
        }
        self.stopped = true;
        self.scheduler.cancel_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Take every event produced since the last drain.
    pub fn drain_events(&mut self) -> Vec<BattleEvent> {
        std::mem::take(&mut self.events)
    }

    fn accepts_input(&self) -> bool {
        !self.paused && !self.stopped && !self.combat.is_over() && !self.combat.is_frozen(Side::Player)
    }

    /// Player slides the board.
    pub fn submit_move(&mut self, dir: Direction) -> Submit {
        if !self.accepts_input() {
            return Submit::Ignored;
        }
        let outcome = self.combat.apply_move(Side::Player, dir, &mut self.rng, &mut self.events);
        self.settle();
        if outcome.moved {
            Submit::Applied(outcome)
        } else {
            Submit::NoChange
        }
    }

    /// Player spends the attack tile at `cell`.
    pub fn submit_attack(&mut self, cell: Cell) -> AttackResult {
        if !self.accepts_input() {
            return AttackResult::Ignored;
        }
        let result = self.combat.attack(Side::Player, cell, &mut self.rng, &mut self.events);
        self.settle();
        result
    }

    /// Let `policy` take one turn for the player: an optional attack, then
    /// a move. Used by the headless binaries.
    pub fn autoplay(&mut self, policy: &mut CpuPolicy) -> Submit {
        if !self.accepts_input() {
            return Submit::Ignored;
        }
        let outcome = take_turn(&mut self.combat, Side::Player, policy, &mut self.rng, &mut self.events);
        self.settle();
        match outcome {
            Some(outcome) => Submit::Applied(outcome),
            None => Submit::NoChange,
        }
    }

    /// Advance the match by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        if self.paused || self.stopped || self.combat.is_over() {
            return;
        }
        self.elapsed += f64::from(dt);
        self.combat.tick(dt, &mut self.rng, &mut self.events);
        if self.settle() {
            return;
        }
        for job in self.scheduler.advance(dt) {
            match job {
                Job::CpuTurn => self.cpu_turn(),
            }
            if self.settle() {
                return;
            }
        }
    }

    fn cpu_turn(&mut self) {
        if !self.combat.is_frozen(Side::Enemy) {
            take_turn(&mut self.combat, Side::Enemy, &mut self.cpu, &mut self.rng, &mut self.events);
        }
        if !self.combat.is_over() {
            let delay = self.cpu.thinking_delay(self.combat.is_frozen(Side::Enemy), &mut self.rng);
            self.scheduler.schedule(delay, Job::CpuTurn);
        }
    }

    /// Cancel pending work once the match is decided. True if it is.
    fn settle(&mut self) -> bool {
        let over = self.combat.is_over();
        if over {
            self.scheduler.cancel_all();
        }
        over
    }
}

fn seeded_rng(config: &MatchConfig) -> (u64, StdRng) {
    let seed = config.seed.unwrap_or_else(|| rand::thread_rng().gen());
    (seed, StdRng::seed_from_u64(seed))
}

/// Attack if the policy wants to, then move. Returns the move outcome if
/// the board changed.
fn take_turn<R: Rng + ?Sized>(
    combat: &mut Combat,
    side: Side,
    policy: &mut CpuPolicy,
    rng: &mut R,
    out: &mut Vec<BattleEvent>,
) -> Option<MoveOutcome> {
    let tiles = combat.board(side).attackable_tiles();
    if !tiles.is_empty() {
        let opponent = side.opponent();
        let view = OpponentView { empty_cells: combat.board(opponent).empty_cells().len(), hp: combat.hp(opponent) };
        if let Some(cell) = policy.choose_attack(&tiles, view, rng) {
            combat.attack(side, cell, rng, out);
        }
    }
    if combat.is_over() {
        return None;
    }
    let dir = policy.choose_move(&combat.board(side).grid(), rng)?;
    let outcome = combat.apply_move(side, dir, rng, out);
    outcome.moved.then_some(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Grid;

    const STEP: f32 = 1.0 / 60.0;
    const ROOMY: Grid = [[2, 0, 0, 0], [0; 4], [0; 4], [0, 0, 0, 4]];

    fn seeded(seed: u64, level: u8) -> MatchConfig {
        MatchConfig { seed: Some(seed), cpu_level: level, ..MatchConfig::default() }
    }

    fn run(battle: &mut Battle, seconds: f32) {
        let frames = (seconds / STEP).round() as usize;
        for _ in 0..frames {
            battle.tick(STEP);
        }
    }

    #[test]
    fn rejects_invalid_config() {
        assert!(matches!(Battle::new(&seeded(1, 0)), Err(ConfigError::Level(0))));
        let bad = MatchConfig { max_hp: 0, ..MatchConfig::default() };
        assert!(Battle::with_boards(&bad, Board::new(), Board::new()).is_err());
    }

    #[test]
    fn seeded_matches_replay() {
        let play = || {
            let mut battle = Battle::new(&seeded(99, 4)).unwrap();
            for dir in [Direction::Left, Direction::Down, Direction::Right, Direction::Up].repeat(5) {
                battle.submit_move(dir);
                run(&mut battle, 0.5);
            }
            (battle.board(Side::Player).grid(), battle.board(Side::Enemy).grid(), battle.drain_events())
        };
        assert_eq!(play(), play());
    }

    #[test]
    fn entropy_seed_is_reported() {
        let config = MatchConfig::default();
        let battle = Battle::new(&config).unwrap();
        let replay = Battle::new(&MatchConfig { seed: Some(battle.seed()), ..config }).unwrap();
        assert_eq!(battle.board(Side::Player).grid(), replay.board(Side::Player).grid());
    }

    #[test]
    fn cpu_moves_on_its_own_schedule() {
        let mut battle = Battle::new(&seeded(5, 3)).unwrap();
        // Level 3 thinks for at least 450 ms
        run(&mut battle, 0.4);
        assert!(!battle.drain_events().iter().any(|e| matches!(e, BattleEvent::ScoreChanged { side: Side::Enemy, .. })));
        run(&mut battle, 3.0);
        let cpu_moves = battle
            .drain_events()
            .iter()
            .filter(|e| matches!(e, BattleEvent::ScoreChanged { side: Side::Enemy, .. }))
            .count();
        assert!(cpu_moves >= 3, "{cpu_moves}");
    }

    #[test]
    fn move_results() {
        let corner: Grid = [[2, 0, 0, 0], [0; 4], [0; 4], [0; 4]];
        let mut battle = Battle::with_boards(&seeded(1, 1), Board::from_grid(&corner), Board::from_grid(&ROOMY)).unwrap();
        assert_eq!(battle.submit_move(Direction::Up), Submit::NoChange);
        assert_eq!(battle.submit_move(Direction::Left), Submit::NoChange);
        assert!(battle.submit_move(Direction::Right).is_applied());
        assert_eq!(battle.submit_attack(Cell::new(3, 3)), AttackResult::NotAttackable);
    }

    #[test]
    fn pause_freezes_everything() {
        let mut battle = Battle::new(&seeded(8, 4)).unwrap();
        battle.drain_events();
        let enemy = battle.board(Side::Enemy).grid();
        battle.pause();
        assert_eq!(battle.submit_move(Direction::Left), Submit::Ignored);
        assert_eq!(battle.submit_attack(Cell::new(0, 0)), AttackResult::Ignored);
        run(&mut battle, 5.0);
        assert_eq!(battle.board(Side::Enemy).grid(), enemy);
        assert_eq!(battle.elapsed(), 0.0);
        assert!(battle.drain_events().is_empty());

        battle.resume();
        run(&mut battle, 1.0);
        assert_ne!(battle.board(Side::Enemy).grid(), enemy);
    }

    #[test]
    fn frozen_player_is_ignored() {
        let mut battle = Battle::with_boards(&seeded(2, 1), Board::from_grid(&ROOMY), Board::from_grid(&ROOMY)).unwrap();
        battle.combat.fighter_mut(Side::Player).timers.freeze = 1.0;
        assert_eq!(battle.submit_move(Direction::Right), Submit::Ignored);
        run(&mut battle, 1.1);
        assert!(!battle.combat().is_frozen(Side::Player));
        assert!(battle.submit_move(Direction::Right).is_applied());
    }

    #[test]
    fn frozen_cpu_skips_turns() {
        let mut battle = Battle::with_boards(&seeded(2, 2), Board::from_grid(&ROOMY), Board::from_grid(&ROOMY)).unwrap();
        battle.combat.fighter_mut(Side::Enemy).timers.freeze = 2.0;
        run(&mut battle, 1.5);
        assert_eq!(battle.board(Side::Enemy).grid(), ROOMY);
        run(&mut battle, 1.0);
        assert_ne!(battle.board(Side::Enemy).grid(), ROOMY);
    }

    #[test]
    fn frozen_cpu_holds_its_attack() {
        let mut enemy = ROOMY;
        enemy[1][1] = 1024;
        let mut battle = Battle::with_boards(&seeded(4, 3), Board::from_grid(&ROOMY), Board::from_grid(&enemy)).unwrap();
        battle.combat.fighter_mut(Side::Enemy).timers.freeze = 2.0;
        run(&mut battle, 1.5);
        assert_eq!(battle.combat().hp(Side::Player), 5);
        assert_eq!(battle.board(Side::Enemy).grid(), enemy);
        run(&mut battle, 1.0);
        assert_eq!(battle.combat().hp(Side::Player), 1);
        assert_eq!(battle.board(Side::Enemy).value(Cell::new(1, 1)), 0);
    }

    #[test]
    fn game_over_cancels_pending_work() {
        let mut player = ROOMY;
        player[1][1] = 1024;
        let mut battle = Battle::with_boards(&seeded(3, 5), Board::from_grid(&player), Board::from_grid(&ROOMY)).unwrap();
        battle.combat.fighter_mut(Side::Enemy).hp = 4;
        assert!(matches!(battle.submit_attack(Cell::new(1, 1)), AttackResult::Resolved { damage: 4, .. }));
        assert_eq!(battle.winner(), Some(Side::Player));
        assert!(battle.scheduler.is_empty());

        let enemy = battle.board(Side::Enemy).grid();
        run(&mut battle, 5.0);
        assert_eq!(battle.board(Side::Enemy).grid(), enemy);
        assert_eq!(battle.submit_move(Direction::Right), Submit::Ignored);
        let overs = battle.drain_events().iter().filter(|e| e.is_game_over()).count();
        assert_eq!(overs, 1);
    }

    #[test]
    fn stop_halts_the_match() {
        let mut battle = Battle::new(&seeded(4, 6)).unwrap();
        battle.stop();
        assert!(battle.is_stopped());
        battle.drain_events();
        let enemy = battle.board(Side::Enemy).grid();
        run(&mut battle, 3.0);
        assert_eq!(battle.board(Side::Enemy).grid(), enemy);
        assert_eq!(battle.submit_move(Direction::Left), Submit::Ignored);
        assert!(battle.winner().is_none());
    }

    #[test]
    fn autoplayed_match_ends_cleanly() {
        let mut battle = Battle::new(&seeded(21, 3)).unwrap();
        let mut pilot = CpuPolicy::new(3);
        let mut rng = StdRng::seed_from_u64(0);
        let mut cooldown = 0.0;
        let mut overs = 0;
        while !battle.is_over() && battle.elapsed() < 1800.0 {
            cooldown -= STEP;
            if cooldown <= 0.0 {
                battle.autoplay(&mut pilot);
                cooldown = pilot.thinking_delay(false, &mut rng);
            }
            battle.tick(STEP);
            overs += battle.drain_events().iter().filter(|e| e.is_game_over()).count();
        }
        if battle.is_over() {
            assert_eq!(overs, 1);
            assert!(battle.scheduler.is_empty());
            let loser = battle.winner().map(Side::opponent);
            assert_eq!(loser.map(|side| battle.combat().hp(side)), Some(0));
        } else {
            assert_eq!(overs, 0);
        }
    }
}
