use std::sync::OnceLock;

use crate::engine::{extract_line, transpose, Bitboard};

/// Per-level weights of the board evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub empty: f64,
    pub max_tile: f64,
    pub corner: f64,
    pub monotonicity: f64,
    pub pairs: f64,
    /// Zero below level 9.
    pub snake: f64,
}

impl Weights {
    pub fn for_level(level: u8) -> Self {
        Weights {
            empty: if level >= 7 { 20.0 } else { 15.0 },
            max_tile: 10.0,
            corner: if level >= 6 { 80.0 } else { 50.0 },
            monotonicity: if level >= 8 { 8.0 } else { 5.0 },
            pairs: 10.0,
            snake: if level >= 9 { 15.0 } else { 0.0 },
        }
    }
}

/// Features of a single 4-cell line that add up across rows and columns.
#[derive(Debug, Clone, Copy, Default)]
struct LineFeatures {
    empty: u8,
    /// max(non-decreasing steps, non-increasing steps)
    monotonicity: u8,
    pairs: u8,
}

static LINE_FEATURES: OnceLock<Box<[LineFeatures]>> = OnceLock::new();

pub(crate) fn warm() {
    let _ = line_features();
}

fn line_features() -> &'static [LineFeatures] {
    LINE_FEATURES
        .get_or_init(|| (0..0x1_0000u64).map(calc_line_features).collect::<Vec<_>>().into_boxed_slice())
        .as_ref()
}

fn calc_line_features(line: u64) -> LineFeatures {
    let tiles: [u64; 4] = [(line >> 12) & 0xf, (line >> 8) & 0xf, (line >> 4) & 0xf, line & 0xf];
    let (mut inc, mut dec, mut pairs) = (0u8, 0u8, 0u8);
    for pair in tiles.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if a <= b {
            inc += 1;
        }
        if a >= b {
            dec += 1;
        }
        if a != 0 && a == b {
            pairs += 1;
        }
    }
    LineFeatures {
        empty: tiles.iter().filter(|&&t| t == 0).count() as u8,
        monotonicity: inc.max(dec),
        pairs,
    }
}

const CORNERS: [usize; 4] = [0, 3, 12, 15];

/// Boustrophedon path from the top-left corner.
const SNAKE: [usize; 16] = [0, 1, 2, 3, 7, 6, 5, 4, 8, 9, 10, 11, 15, 14, 13, 12];

/// Cells along the snake path that do not exceed the last non-empty cell.
fn snake_score(board: Bitboard) -> u32 {
    let mut prev = u8::MAX;
    let mut score = 0;
    for &idx in &SNAKE {
        let exp = board.exponent(idx);
        if exp > 0 {
            if exp <= prev {
                score += 1;
            }
            prev = exp;
        }
    }
    score
}

/// Static evaluation of a board for the CPU. Higher is better.
pub fn evaluate(board: Bitboard, weights: &Weights) -> f64 {
    let table = line_features();
    let raw = board.raw();
    let cols = transpose(raw);
    let (mut empty, mut mono, mut pairs) = (0u32, 0u32, 0u32);
    for idx in 0..4 {
        let row = table[extract_line(raw, idx) as usize];
        let col = table[extract_line(cols, idx) as usize];
        empty += u32::from(row.empty);
        mono += u32::from(row.monotonicity) + u32::from(col.monotonicity);
        pairs += u32::from(row.pairs) + u32::from(col.pairs);
    }

    let max_exp = (0..16).map(|idx| board.exponent(idx)).max().unwrap_or(0);
    let mut score = f64::from(empty) * weights.empty
        + f64::from(max_exp) * weights.max_tile
        + f64::from(mono) * weights.monotonicity
        + f64::from(pairs) * weights.pairs;
    if CORNERS.iter().any(|&idx| board.exponent(idx) == max_exp) {
        score += weights.corner;
    }
    if weights.snake > 0.0 {
        score += f64::from(snake_score(board)) * weights.snake;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_two() -> Bitboard {
        Bitboard::from_grid(&[[2, 0, 0, 0], [0; 4], [0; 4], [0; 4]])
    }

    #[test]
    fn lone_corner_tile() {
        // 15 empty, log2(2), corner, monotonicity 24, no pairs
        assert_eq!(evaluate(single_two(), &Weights::for_level(3)), 225.0 + 10.0 + 50.0 + 120.0);
        assert_eq!(evaluate(single_two(), &Weights::for_level(9)), 300.0 + 10.0 + 80.0 + 192.0 + 15.0);
    }

    #[test]
    fn line_features_match_by_hand() {
        // 2 2 4 0
        let f = calc_line_features(0x1120);
        assert_eq!(f.empty, 1);
        assert_eq!(f.pairs, 1);
        assert_eq!(f.monotonicity, 2);
        let f = calc_line_features(0x0000);
        assert_eq!((f.empty, f.pairs, f.monotonicity), (4, 0, 3));
    }

    #[test]
    fn snake_counts_descending_path() {
        let board = Bitboard::from_grid(&[[64, 32, 16, 8], [0, 0, 2, 4], [0; 4], [0; 4]]);
        assert_eq!(snake_score(board), 6);
        let broken = Bitboard::from_grid(&[[2, 4, 8, 16], [0; 4], [0; 4], [0; 4]]);
        assert_eq!(snake_score(broken), 1);
    }

    #[test]
    fn corner_max_beats_centre_max() {
        let w = Weights::for_level(6);
        let corner = Bitboard::from_grid(&[[64, 0, 0, 0], [0, 2, 0, 0], [0; 4], [0; 4]]);
        let centre = Bitboard::from_grid(&[[2, 0, 0, 0], [0, 64, 0, 0], [0; 4], [0; 4]]);
        assert!(evaluate(corner, &w) > evaluate(centre, &w));
    }
}
