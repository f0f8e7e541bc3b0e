//! Packed 4x4 board used by the CPU search.
//!
//! A [`Bitboard`] stores the 16 cells as 4-bit exponents in a `u64`, so a
//! slide is four table lookups. The battle [`Board`](crate::board::Board)
//! converts its grid into a `Bitboard` whenever the CPU needs to look ahead;
//! the packed form carries no metadata (bombs, skills) and is never written
//! back.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::board::{Grid, SIZE};
use crate::error::ParseDirectionError;

/// A direction to slide/merge tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Stable order used everywhere a tie has to be broken.
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    /// `(row, col)` step of a tile travelling in this direction.
    #[inline]
    pub(crate) fn vector(self) -> (isize, isize) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        };
        f.write_str(s)
    }
}

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "u" | "w" => Ok(Direction::Up),
            "down" | "d" | "s" => Ok(Direction::Down),
            "left" | "l" | "a" => Ok(Direction::Left),
            "right" | "r" => Ok(Direction::Right),
            other => Err(ParseDirectionError(other.to_string())),
        }
    }
}

const LINE_TABLE_SIZE: usize = 0x1_0000; // 65,536 possible 16-bit lines
const MAX_EXPONENT: u64 = 0xf;

struct Tables {
    shift_left: Box<[u64]>,
    shift_right: Box<[u64]>,
    shift_up: Box<[u64]>,
    shift_down: Box<[u64]>,
    score: Box<[u64]>,
}

type Line = u64;
type Exponent = u64;

/// Packed 4x4 board as 16 exponent nibbles in a `u64` (row-major, cell 0 in
/// the most significant nibble).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Bitboard(u64);

impl Bitboard {
    /// A board with no tiles.
    pub const EMPTY: Bitboard = Bitboard(0);

    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Bitboard(raw)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Pack a value grid. Values must be 0 or powers of two; anything above
    /// 2^15 saturates.
    pub fn from_grid(grid: &Grid) -> Self {
        let mut raw = 0u64;
        for (row, cells) in grid.iter().enumerate() {
            for (col, &value) in cells.iter().enumerate() {
                let exp = value_to_exponent(value);
                raw |= exp << ((15 - (row * SIZE + col)) * 4);
            }
        }
        Bitboard(raw)
    }

    /// Unpack into a value grid.
    pub fn to_grid(self) -> Grid {
        let mut grid = [[0u32; SIZE]; SIZE];
        for (idx, value) in (0..16).map(|idx| (idx, self.tile_value(idx))) {
            grid[idx / SIZE][idx % SIZE] = value;
        }
        grid
    }

    /// Board after sliding/merging in `dir`. No tile is inserted.
    ///
    /// ```
    /// use duel_2048::engine::{Bitboard, Direction};
    /// let b = Bitboard::from_grid(&[[2, 2, 4, 4], [0; 4], [0; 4], [0; 4]]);
    /// assert_eq!(b.shift(Direction::Left).to_grid()[0], [4, 8, 0, 0]);
    /// ```
    #[inline]
    pub fn shift(self, dir: Direction) -> Self {
        match dir {
            Direction::Left | Direction::Right => shift_rows(self, dir),
            Direction::Up | Direction::Down => shift_cols(self, dir),
        }
    }

    /// True if `dir` changes the board.
    #[inline]
    pub fn can_shift(self, dir: Direction) -> bool {
        self.shift(dir) != self
    }

    /// Directions that change the board, in [`Direction::ALL`] order.
    pub fn legal_moves(self) -> impl Iterator<Item = Direction> {
        Direction::ALL.into_iter().filter(move |&dir| self.can_shift(dir))
    }

    /// True if no direction changes the board.
    #[inline]
    pub fn is_stuck(self) -> bool {
        Direction::ALL.iter().all(|&dir| !self.can_shift(dir))
    }

    /// Total value of all merges needed to build this board from 2s.
    ///
    /// The difference between two consecutive boards is exactly the sum of
    /// merge results produced by the slide between them.
    #[inline]
    pub fn score(self) -> u64 {
        let table = &tables().score;
        (0..4).fold(0, |acc, idx| acc + table[extract_line(self.0, idx) as usize])
    }

    /// Merge value produced by sliding `self` in `dir`, with the resulting
    /// board. `None` if the move is illegal.
    #[inline]
    pub fn slide_gain(self, dir: Direction) -> Option<(Bitboard, u64)> {
        let next = self.shift(dir);
        (next != self).then(|| (next, next.score() - self.score()))
    }

    /// Number of empty cells.
    #[inline]
    pub fn count_empty(self) -> u32 {
        16 - count_non_empty(self.0)
    }

    /// Row-major indices of empty cells.
    pub fn empty_slots(self) -> impl Iterator<Item = usize> {
        (0..16).filter(move |&idx| self.exponent(idx) == 0)
    }

    /// Raw exponent at `idx` (0 when empty).
    #[inline]
    pub fn exponent(self, idx: usize) -> u8 {
        ((self.0 >> ((15 - idx) * 4)) & 0xf) as u8
    }

    /// Board with exponent `exp` written into `idx` (which should be empty).
    #[inline]
    pub fn with_exponent(self, idx: usize, exp: u8) -> Self {
        let shift = (15 - idx) * 4;
        Bitboard((self.0 & !(0xf << shift)) | ((exp as u64 & 0xf) << shift))
    }

    /// Tile value at `idx` (0 when empty).
    #[inline]
    pub fn tile_value(self, idx: usize) -> u32 {
        match self.exponent(idx) {
            0 => 0,
            exp => 1 << exp,
        }
    }

    /// Highest tile value, 0 on an empty board.
    pub fn highest_tile(self) -> u32 {
        (0..16).map(|idx| self.tile_value(idx)).max().unwrap_or(0)
    }
}

impl fmt::Debug for Bitboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bitboard({:#018x})", self.0)
    }
}

impl fmt::Display for Bitboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_grid(f, &self.to_grid())
    }
}

impl From<&Grid> for Bitboard {
    fn from(grid: &Grid) -> Self {
        Bitboard::from_grid(grid)
    }
}

/// Shared pretty-printer for value grids.
pub(crate) fn write_grid(f: &mut fmt::Formatter<'_>, grid: &Grid) -> fmt::Result {
    writeln!(f)?;
    for (row, cells) in grid.iter().enumerate() {
        if row > 0 {
            writeln!(f, "-------------------------------")?;
        }
        let line: Vec<String> = cells.iter().map(|&v| format_val(v)).collect();
        writeln!(f, "{}", line.join("|"))?;
    }
    Ok(())
}

fn format_val(val: u32) -> String {
    match val {
        0 => " ".repeat(7),
        v => format!("{:^7}", v),
    }
}

/// Initialize the lookup tables. Safe to call repeatedly; every entry point
/// also initializes lazily.
pub fn warm() {
    let _ = tables();
}

static TABLES: OnceLock<Tables> = OnceLock::new();

#[inline(always)]
fn tables() -> &'static Tables {
    TABLES.get_or_init(create_tables)
}

fn create_tables() -> Tables {
    // Heap allocated to keep stack frames small
    let mut shift_left = vec![0u64; LINE_TABLE_SIZE];
    let mut shift_right = vec![0u64; LINE_TABLE_SIZE];
    let mut shift_up = vec![0u64; LINE_TABLE_SIZE];
    let mut shift_down = vec![0u64; LINE_TABLE_SIZE];
    let mut score = vec![0u64; LINE_TABLE_SIZE];

    for val in 0..LINE_TABLE_SIZE {
        let line = val as Line;
        shift_left[val] = shift_line(line, Direction::Left);
        shift_right[val] = shift_line(line, Direction::Right);
        shift_up[val] = shift_line(line, Direction::Up);
        shift_down[val] = shift_line(line, Direction::Down);
        score[val] = calc_score(line);
    }

    Tables {
        shift_left: shift_left.into_boxed_slice(),
        shift_right: shift_right.into_boxed_slice(),
        shift_up: shift_up.into_boxed_slice(),
        shift_down: shift_down.into_boxed_slice(),
        score: score.into_boxed_slice(),
    }
}

fn value_to_exponent(value: u32) -> Exponent {
    if value == 0 {
        0
    } else {
        (value.trailing_zeros() as Exponent).min(MAX_EXPONENT)
    }
}

// Credit to Nneonneo
pub(crate) fn transpose(x: u64) -> u64 {
    let a1 = x & 0xF0F00F0FF0F00F0F;
    let a2 = x & 0x0000F0F00000F0F0;
    let a3 = x & 0x0F0F00000F0F0000;
    let a = a1 | (a2 << 12) | (a3 >> 12);
    let b1 = a & 0xFF00FF0000FF00FF;
    let b2 = a & 0x00FF00FF00000000;
    let b3 = a & 0x00000000FF00FF00;
    b1 | (b2 >> 24) | (b3 << 24)
}

#[inline]
pub(crate) fn extract_line(board: u64, line_idx: u64) -> Line {
    (board >> ((3 - line_idx) * 16)) & 0xffff
}

fn line_to_vec(line: Line) -> Vec<Exponent> {
    (0..4).map(|tile_idx| (line >> ((3 - tile_idx) * 4)) & 0xf).collect()
}

fn shift_rows(board: Bitboard, dir: Direction) -> Bitboard {
    let t = tables();
    let table: &[u64] = if dir == Direction::Left { &t.shift_left } else { &t.shift_right };
    let res = (0..4).fold(0, |new_board, row_idx| {
        let row_val = extract_line(board.0, row_idx) as usize;
        new_board | (table[row_val] << (48 - (16 * row_idx)))
    });
    Bitboard(res)
}

fn shift_cols(board: Bitboard, dir: Direction) -> Bitboard {
    let transposed = transpose(board.0);
    let t = tables();
    let table: &[u64] = if dir == Direction::Up { &t.shift_up } else { &t.shift_down };
    let res = (0..4).fold(0, |new_board, col_idx| {
        let col_val = extract_line(transposed, col_idx) as usize;
        new_board | (table[col_val] << (12 - (4 * col_idx)))
    });
    Bitboard(res)
}

fn shift_line(line: Line, dir: Direction) -> Line {
    let tiles = line_to_vec(line);
    match dir {
        Direction::Left => vec_to_row(&shift_vec_left(tiles)),
        Direction::Right => vec_to_row(&shift_vec_right(tiles)),
        Direction::Up => vec_to_col(&shift_vec_left(tiles)),
        Direction::Down => vec_to_col(&shift_vec_right(tiles)),
    }
}

fn vec_to_row(tiles: &[Exponent]) -> Line {
    tiles[0] << 12 | tiles[1] << 8 | tiles[2] << 4 | tiles[3]
}

fn vec_to_col(tiles: &[Exponent]) -> Line {
    tiles[0] << 48 | tiles[1] << 32 | tiles[2] << 16 | tiles[3]
}

fn shift_vec_right(vec: Vec<Exponent>) -> Vec<Exponent> {
    let rev: Vec<Exponent> = vec.into_iter().rev().collect();
    shift_vec_left(rev).into_iter().rev().collect()
}

fn shift_vec_left(mut vec: Vec<Exponent>) -> Vec<Exponent> {
    for i in 0..4 {
        calculate_left_shift(&mut vec[i..]);
    }
    vec
}

fn calculate_left_shift(slice: &mut [Exponent]) {
    let mut acc = 0;
    for idx in 0..slice.len() {
        let val = slice[idx];
        if acc != 0 && acc == val {
            slice[idx] = 0;
            acc = (acc + 1).min(MAX_EXPONENT);
            break;
        } else if acc != 0 && val != 0 && acc != val {
            break;
        } else if acc == 0 && val != 0 {
            slice[idx] = 0;
            acc = val;
        }
    }
    slice[0] = acc;
}

// Credit to Nneonneo
fn calc_score(line: Line) -> u64 {
    line_to_vec(line)
        .into_iter()
        .filter(|&exp| exp >= 2)
        // sum of the tile and every intermediate merge that built it
        .map(|exp| (exp - 1) * (1 << exp))
        .sum()
}

fn count_non_empty(raw: u64) -> u32 {
    let mut x = raw;
    x |= x >> 1;
    x |= x >> 2;
    x &= 0x1111111111111111;
    x.count_ones()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_shift_vec_left() {
        assert_eq!(shift_vec_left(vec![0, 0, 0, 0]), vec![0, 0, 0, 0]);
        assert_eq!(shift_vec_left(vec![1, 2, 1, 2]), vec![1, 2, 1, 2]);
        assert_eq!(shift_vec_left(vec![1, 1, 2, 2]), vec![2, 3, 0, 0]);
        assert_eq!(shift_vec_left(vec![1, 0, 0, 1]), vec![2, 0, 0, 0]);
    }

    #[test]
    fn it_shift_vec_right() {
        assert_eq!(shift_vec_right(vec![1, 1, 2, 2]), vec![0, 0, 2, 3]);
        assert_eq!(shift_vec_right(vec![5, 0, 0, 5]), vec![0, 0, 0, 6]);
        assert_eq!(shift_vec_right(vec![0, 2, 2, 2]), vec![0, 0, 2, 3]);
    }

    #[test]
    fn test_shift_rows() {
        assert_eq!(Bitboard::from_raw(0x0002).shift(Direction::Left), Bitboard::from_raw(0x2000));
        assert_eq!(Bitboard::from_raw(0x2020).shift(Direction::Left), Bitboard::from_raw(0x3000));
        assert_eq!(Bitboard::from_raw(0x1332).shift(Direction::Left), Bitboard::from_raw(0x1420));
        assert_eq!(Bitboard::from_raw(0x1332).shift(Direction::Right), Bitboard::from_raw(0x0142));
        assert_eq!(Bitboard::from_raw(0x1234).shift(Direction::Right), Bitboard::from_raw(0x1234));
    }

    #[test]
    fn test_shift_cols() {
        let game = Bitboard::from_raw(0x1121230033004222);
        assert_eq!(game.shift(Direction::Up), Bitboard::from_raw(0x1131240232004000));
        assert_eq!(game.shift(Direction::Down), Bitboard::from_raw(0x1000210034014232));
    }

    #[test]
    fn grid_conversion_keeps_values() {
        let grid = [[2, 0, 4, 8], [0, 1024, 0, 0], [16, 32, 64, 128], [256, 512, 0, 2]];
        let packed = Bitboard::from_grid(&grid);
        assert_eq!(packed.to_grid(), grid);
        assert_eq!(packed.count_empty(), 4);
        assert_eq!(packed.highest_tile(), 1024);
    }

    #[test]
    fn slide_gain_is_sum_of_merges() {
        let packed = Bitboard::from_grid(&[[2, 2, 4, 4], [8, 8, 0, 0], [0; 4], [0; 4]]);
        let (next, gain) = packed.slide_gain(Direction::Left).unwrap();
        assert_eq!(gain, 4 + 8 + 16);
        assert_eq!(next.to_grid()[0], [4, 8, 0, 0]);
        assert!(Bitboard::EMPTY.slide_gain(Direction::Up).is_none());
    }

    #[test]
    fn stuck_board_has_no_legal_moves() {
        let packed = Bitboard::from_grid(&[[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]);
        assert!(packed.is_stuck());
        assert_eq!(packed.legal_moves().count(), 0);
        assert!(Bitboard::EMPTY.is_stuck());
    }

    #[test]
    fn parses_directions() {
        assert_eq!("Left".parse::<Direction>().unwrap(), Direction::Left);
        assert_eq!("w".parse::<Direction>().unwrap(), Direction::Up);
        assert!("north".parse::<Direction>().is_err());
    }
}
