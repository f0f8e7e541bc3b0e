//! CPU opponent, levels 1 through 10.
//!
//! Each level picks moves with a different algorithm:
//!
//! | level | move policy |
//! |-------|-------------|
//! | 1 | uniform over legal moves |
//! | 2 | first legal of down, left, right, up |
//! | 3 | first legal of left, down, right, up |
//! | 4 | greedy: merge gain plus board evaluation |
//! | 5..=10 | sampled expectimax, 1 to 4 chance layers |
//!
//! Evaluation weights, attack eagerness and thinking time all grow with
//! the level. The policy never touches a board; it reads a grid and
//! answers with a direction or a cell.
//!
//! ```
//! use duel_2048::cpu::CpuPolicy;
//! use duel_2048::engine::Direction;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(1);
//! let mut cpu = CpuPolicy::new(4);
//! let grid = [[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]];
//! assert_eq!(cpu.choose_move(&grid, &mut rng), Some(Direction::Left));
//! ```

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::trace;

use crate::board::{Cell, Grid};
use crate::config::{MAX_LEVEL, MIN_LEVEL};
use crate::engine::{self, Bitboard, Direction};

mod attack;
mod heuristic;
mod search;

pub use heuristic::{evaluate, Weights};

use search::{depth_for, samples_for, Search};

const LEVEL_TWO_ORDER: [Direction; 4] = [Direction::Down, Direction::Left, Direction::Right, Direction::Up];
const LEVEL_THREE_ORDER: [Direction; 4] = [Direction::Left, Direction::Down, Direction::Right, Direction::Up];

/// Thinking time range per level, in milliseconds.
const THINK_MS: [(f32, f32); 10] = [
    (800.0, 1200.0),
    (600.0, 1000.0),
    (450.0, 750.0),
    (350.0, 600.0),
    (250.0, 450.0),
    (180.0, 350.0),
    (120.0, 250.0),
    (80.0, 180.0),
    (50.0, 120.0),
    (30.0, 80.0),
];
const FROZEN_THINK_MS: f32 = 100.0;

/// Per-direction value as seen by the policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchEval {
    pub dir: Direction,
    pub ev: f64,
    pub legal: bool,
}

/// Counters from the last search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Chance and leaf nodes visited.
    pub nodes: u64,
    /// Largest `nodes` since the last reset.
    pub peak_nodes: u64,
    pub cache_hits: u64,
}

/// What the CPU knows about its opponent when deciding to attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpponentView {
    pub empty_cells: usize,
    pub hp: u32,
}

#[derive(Debug, Clone)]
pub struct CpuPolicy {
    level: u8,
    weights: Weights,
    stats: SearchStats,
}

impl CpuPolicy {
    /// Policy for `level`, clamped into 1..=10. Warms the lookup tables.
    pub fn new(level: u8) -> Self {
        engine::warm();
        heuristic::warm();
        let level = level.clamp(MIN_LEVEL, MAX_LEVEL);
        CpuPolicy { level, weights: Weights::for_level(level), stats: SearchStats::default() }
    }

    #[inline]
    pub fn level(&self) -> u8 {
        self.level
    }

    #[inline]
    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    /// Static evaluation of `grid` with this level's weights.
    pub fn evaluate(&self, grid: &Grid) -> f64 {
        evaluate(Bitboard::from_grid(grid), &self.weights)
    }

    /// Direction to play on `grid`, or `None` when nothing moves.
    pub fn choose_move<R: Rng + ?Sized>(&mut self, grid: &Grid, rng: &mut R) -> Option<Direction> {
        let board = Bitboard::from_grid(grid);
        let dir = match self.level {
            1 => {
                let legal: Vec<Direction> = board.legal_moves().collect();
                legal.choose(rng).copied()
            }
            2 => LEVEL_TWO_ORDER.into_iter().find(|&d| board.can_shift(d)),
            3 => LEVEL_THREE_ORDER.into_iter().find(|&d| board.can_shift(d)),
            level => {
                let mut search = Search::new(&self.weights, samples_for(level));
                let dir = search.best_move(board, depth_for(level));
                self.record(search.stats());
                dir
            }
        };
        trace!(level = self.level, ?dir, "cpu move");
        dir
    }

    /// Values of all four directions in `[Up, Down, Left, Right]` order.
    ///
    /// Levels below 4 have no evaluation of their own; they are scored as a
    /// one-ply greedy search. Illegal moves carry `legal: false` and `ev: 0`.
    pub fn branch_evals(&mut self, grid: &Grid) -> [BranchEval; 4] {
        let board = Bitboard::from_grid(grid);
        let mut search = Search::new(&self.weights, samples_for(self.level));
        let depth = depth_for(self.level);
        let out = Direction::ALL.map(|dir| match search.move_value(board, dir, depth) {
            Some(ev) => BranchEval { dir, ev, legal: true },
            None => BranchEval { dir, ev: 0.0, legal: false },
        });
        self.record(search.stats());
        out
    }

    /// Cell to attack with, if any. `tiles` are the CPU's attackable
    /// tiles; larger values are considered first and the first accepted
    /// one wins.
    pub fn choose_attack<R: Rng + ?Sized>(
        &self,
        tiles: &[(Cell, u32)],
        opponent: OpponentView,
        rng: &mut R,
    ) -> Option<Cell> {
        let mut ordered = tiles.to_vec();
        ordered.sort_by(|a, b| b.1.cmp(&a.1));
        ordered
            .into_iter()
            .find(|&(_, value)| attack::should_attack(self.level, value, opponent, rng))
            .map(|(cell, _)| cell)
    }

    /// Seconds until the next CPU turn.
    pub fn thinking_delay<R: Rng + ?Sized>(&self, frozen: bool, rng: &mut R) -> f32 {
        if frozen {
            return FROZEN_THINK_MS / 1000.0;
        }
        let (min, max) = THINK_MS[usize::from(self.level - 1)];
        rng.gen_range(min..max) / 1000.0
    }

    /// Statistics from the last [`choose_move`](Self::choose_move) or
    /// [`branch_evals`](Self::branch_evals) that ran a search.
    #[inline]
    pub fn last_stats(&self) -> SearchStats {
        self.stats
    }

    #[inline]
    pub fn reset_stats(&mut self) {
        self.stats = SearchStats::default();
    }

    fn record(&mut self, stats: SearchStats) {
        self.stats.nodes = stats.nodes;
        self.stats.cache_hits = stats.cache_hits;
        self.stats.peak_nodes = self.stats.peak_nodes.max(stats.nodes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn level_is_clamped() {
        assert_eq!(CpuPolicy::new(0).level(), 1);
        assert_eq!(CpuPolicy::new(42).level(), 10);
        assert_eq!(CpuPolicy::new(7).weights(), &Weights::for_level(7));
    }

    #[test]
    fn fixed_priority_levels() {
        let mut rng = StdRng::seed_from_u64(3);
        // Down and Left are blocked
        let grid = [[0, 0, 0, 0], [0; 4], [0; 4], [2, 0, 0, 0]];
        assert_eq!(CpuPolicy::new(2).choose_move(&grid, &mut rng), Some(Direction::Right));
        let grid = [[0, 0, 0, 2], [0; 4], [0; 4], [0; 4]];
        assert_eq!(CpuPolicy::new(2).choose_move(&grid, &mut rng), Some(Direction::Down));
        assert_eq!(CpuPolicy::new(3).choose_move(&grid, &mut rng), Some(Direction::Left));
    }

    #[test]
    fn random_level_stays_legal() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut cpu = CpuPolicy::new(1);
        let grid = [[2, 0, 0, 0], [0; 4], [0; 4], [0; 4]];
        for _ in 0..50 {
            let dir = cpu.choose_move(&grid, &mut rng).unwrap();
            assert!(matches!(dir, Direction::Down | Direction::Right));
        }
    }

    #[test]
    fn stuck_board_has_no_move() {
        let mut rng = StdRng::seed_from_u64(0);
        let grid = [[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]];
        for level in 1..=10 {
            assert_eq!(CpuPolicy::new(level).choose_move(&grid, &mut rng), None, "level {level}");
        }
    }

    #[test]
    fn greedy_takes_the_big_merge() {
        let mut rng = StdRng::seed_from_u64(0);
        let grid = [[256, 256, 8, 2], [0; 4], [0; 4], [0; 4]];
        assert_eq!(CpuPolicy::new(4).choose_move(&grid, &mut rng), Some(Direction::Left));
    }

    #[test]
    fn search_levels_pick_a_legal_move() {
        let mut rng = StdRng::seed_from_u64(0);
        // Only Right and Down change this board
        let grid = [[2, 4, 8, 16], [4, 8, 16, 32], [8, 16, 32, 64], [16, 32, 64, 0]];
        for level in 5..=10 {
            let dir = CpuPolicy::new(level).choose_move(&grid, &mut rng);
            assert!(matches!(dir, Some(Direction::Right | Direction::Down)), "level {level}: {dir:?}");
        }
    }

    #[test]
    fn branch_evals_agree_with_choice() {
        let mut rng = StdRng::seed_from_u64(5);
        let grid = [[4, 2, 0, 0], [2, 0, 0, 0], [0; 4], [0, 0, 0, 2]];
        let mut cpu = CpuPolicy::new(7);
        let evals = cpu.branch_evals(&grid);
        assert_eq!(evals.map(|b| b.dir), Direction::ALL);
        assert!(evals.iter().all(|b| b.legal));
        let best = evals.iter().fold(None::<BranchEval>, |acc, b| match acc {
            Some(a) if a.ev >= b.ev => Some(a),
            _ => Some(*b),
        });
        assert!(cpu.last_stats().nodes > 0);
        assert_eq!(cpu.choose_move(&grid, &mut rng), best.map(|b| b.dir));

        let peak = cpu.last_stats().peak_nodes;
        assert!(peak >= cpu.last_stats().nodes);
        cpu.reset_stats();
        assert_eq!(cpu.last_stats(), SearchStats::default());
    }

    #[test]
    fn attack_prefers_largest_tile() {
        let mut rng = StdRng::seed_from_u64(0);
        let cpu = CpuPolicy::new(10);
        let tiles = [(Cell::new(0, 0), 128), (Cell::new(1, 1), 1024), (Cell::new(2, 2), 512)];
        let view = OpponentView { empty_cells: 16, hp: 5 };
        assert_eq!(cpu.choose_attack(&tiles, view, &mut rng), Some(Cell::new(1, 1)));
        assert_eq!(cpu.choose_attack(&[], view, &mut rng), None);

        // Level 6 holds a 128 while the opponent has room
        let cpu = CpuPolicy::new(6);
        assert_eq!(cpu.choose_attack(&tiles[..1], view, &mut rng), None);
        let cramped = OpponentView { empty_cells: 3, hp: 5 };
        assert_eq!(cpu.choose_attack(&tiles[..1], cramped, &mut rng), Some(Cell::new(0, 0)));
    }

    #[test]
    fn thinking_time_ranges() {
        let mut rng = StdRng::seed_from_u64(8);
        for level in 1..=10 {
            let cpu = CpuPolicy::new(level);
            let (min, max) = THINK_MS[usize::from(level - 1)];
            for _ in 0..20 {
                let d = cpu.thinking_delay(false, &mut rng) * 1000.0;
                assert!(d >= min - 0.01 && d < max + 0.01, "level {level}: {d}");
            }
            assert_eq!(cpu.thinking_delay(true, &mut rng), 0.1);
        }
    }
}
