use std::collections::HashMap;

use crate::engine::{Bitboard, Direction};

use super::heuristic::{evaluate, Weights};
use super::SearchStats;

/// Lookahead depth (chance layers) for a level; 0 means one-ply greedy.
pub(crate) fn depth_for(level: u8) -> u32 {
    match level {
        5 => 1,
        6 | 7 => 2,
        8 | 9 => 3,
        10 => 4,
        _ => 0,
    }
}

/// Empty cells sampled at each chance node.
pub(crate) fn samples_for(level: u8) -> usize {
    if level >= 8 {
        6
    } else {
        4
    }
}

/// Sampled expectimax over packed boards.
///
/// Chance nodes place a 2 into the first `samples` empty cells in row-major
/// order and average the best reply. Values are memoized per
/// `(board, remaining depth)` for the lifetime of one decision.
pub(crate) struct Search<'a> {
    weights: &'a Weights,
    samples: usize,
    cache: HashMap<(Bitboard, u32), f64>,
    nodes: u64,
    cache_hits: u64,
}

impl<'a> Search<'a> {
    pub(crate) fn new(weights: &'a Weights, samples: usize) -> Self {
        Search { weights, samples: samples.max(1), cache: HashMap::new(), nodes: 0, cache_hits: 0 }
    }

    /// Best direction from `board`, ties going to the earlier of
    /// [`Direction::ALL`]. `None` when no move changes the board.
    pub(crate) fn best_move(&mut self, board: Bitboard, depth: u32) -> Option<Direction> {
        let mut best: Option<(Direction, f64)> = None;
        for dir in Direction::ALL {
            if let Some(value) = self.move_value(board, dir, depth) {
                if best.map_or(true, |(_, b)| value > b) {
                    best = Some((dir, value));
                }
            }
        }
        best.map(|(dir, _)| dir)
    }

    /// Merge gain of `dir` plus the expected value of the resulting board.
    pub(crate) fn move_value(&mut self, board: Bitboard, dir: Direction, depth: u32) -> Option<f64> {
        let (after, gain) = board.slide_gain(dir)?;
        Some(gain as f64 + self.chance(after, depth))
    }

    pub(crate) fn stats(&self) -> SearchStats {
        SearchStats { nodes: self.nodes, peak_nodes: self.nodes, cache_hits: self.cache_hits }
    }

    fn chance(&mut self, after: Bitboard, depth: u32) -> f64 {
        self.nodes += 1;
        if depth == 0 {
            return evaluate(after, self.weights);
        }
        if let Some(&value) = self.cache.get(&(after, depth)) {
            self.cache_hits += 1;
            return value;
        }

        let slots: Vec<usize> = after.empty_slots().take(self.samples).collect();
        let value = if slots.is_empty() {
            evaluate(after, self.weights)
        } else {
            let mut total = 0.0;
            for &idx in &slots {
                // A dead sample contributes nothing to the average.
                total += self.max_value(after.with_exponent(idx, 1), depth - 1).unwrap_or(0.0);
            }
            total / slots.len() as f64
        };
        self.cache.insert((after, depth), value);
        value
    }

    fn max_value(&mut self, board: Bitboard, depth: u32) -> Option<f64> {
        let mut best: Option<f64> = None;
        for dir in Direction::ALL {
            if let Some(value) = self.move_value(board, dir, depth) {
                best = Some(best.map_or(value, |b| b.max(value)));
            }
        }
        best
    }
}
