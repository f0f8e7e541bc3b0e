//! The battle board: a 4x4 value grid plus per-tile metadata.
//!
//! Metadata (disruption flag, bomb, attached skill) lives on the [`Tile`]
//! itself, so it travels with the tile through a slide and disappears with it
//! when the tile is merged, cleared or rewritten.
//!
//! ```
//! use duel_2048::board::Board;
//! use duel_2048::engine::Direction;
//!
//! let mut board = Board::from_grid(&[[2, 2, 4, 4], [0; 4], [0; 4], [0; 4]]);
//! let outcome = board.slide(Direction::Left);
//! assert!(outcome.moved);
//! assert_eq!(board.grid()[0], [4, 8, 0, 0]);
//! assert_eq!(board.score(), 12);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::engine::{write_grid, Direction};
use crate::skills::{SkillId, SkillPool};

pub const SIZE: usize = 4;

/// Plain value grid, row-major. 0 is an empty cell.
pub type Grid = [[u32; SIZE]; SIZE];

/// Tile values that can be spent on an attack.
pub const ATTACK_VALUES: [u32; 3] = [128, 512, 1024];

/// Value classes a random single-class clear picks from.
pub const SMALL_CLASSES: [u32; 7] = [2, 4, 8, 16, 32, 64, 128];

pub const DEFAULT_ATTACH_CHANCE: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    #[inline]
    pub const fn new(row: usize, col: usize) -> Self {
        Cell { row, col }
    }

    /// Row-major index, 0..16.
    #[inline]
    pub fn index(self) -> usize {
        self.row * SIZE + self.col
    }

    pub fn is_corner(self) -> bool {
        (self.row == 0 || self.row == SIZE - 1) && (self.col == 0 || self.col == SIZE - 1)
    }

    /// All cells in row-major order.
    pub fn all() -> impl Iterator<Item = Cell> {
        (0..SIZE * SIZE).map(|idx| Cell::new(idx / SIZE, idx % SIZE))
    }

    fn step(self, dir: Direction) -> Option<Cell> {
        let (dr, dc) = dir.vector();
        let row = self.row.checked_add_signed(dr)?;
        let col = self.col.checked_add_signed(dc)?;
        (row < SIZE && col < SIZE).then_some(Cell { row, col })
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// A pending bomb. It only stays armed while its tile still holds `value`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bomb {
    pub fuse: f32,
    pub value: u32,
}

/// One cell's content.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Tile {
    pub value: u32,
    /// Set on 2s that arrived as interference.
    pub disruption: bool,
    pub bomb: Option<Bomb>,
    pub skill: Option<SkillId>,
}

impl Tile {
    pub const EMPTY: Tile = Tile { value: 0, disruption: false, bomb: None, skill: None };

    #[inline]
    pub fn plain(value: u32) -> Self {
        Tile { value, ..Tile::EMPTY }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.value == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Merge {
    pub cell: Cell,
    /// Value of the merged tile.
    pub value: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TriggeredSkill {
    pub skill: SkillId,
    pub cell: Cell,
}

/// Result of [`Board::slide`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveOutcome {
    pub moved: bool,
    pub merges: Vec<Merge>,
    /// Skills released by merging tiles, in merge order.
    pub triggered: Vec<TriggeredSkill>,
}

impl MoveOutcome {
    /// Score gained by the slide.
    pub fn gained(&self) -> u64 {
        self.merges.iter().map(|m| u64::from(m.value)).sum()
    }

    /// True if some merge produced `value`.
    pub fn created(&self, value: u32) -> bool {
        self.merges.iter().any(|m| m.value == value)
    }
}

/// Parameters for [`Board::spawn_random_tile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Spawn {
    /// Fixed value; `None` rolls 2 (90%) or 4 (10%).
    pub value: Option<u32>,
    pub disruption: bool,
    /// Prefer non-corner cells when one is free.
    pub avoid_corners: bool,
}

impl Spawn {
    pub const RANDOM: Spawn = Spawn { value: None, disruption: false, avoid_corners: false };

    /// A forced 2 carrying the disruption flag.
    pub const fn interference() -> Self {
        Spawn { value: Some(2), disruption: true, avoid_corners: false }
    }

    pub const fn avoiding_corners(mut self, avoid: bool) -> Self {
        self.avoid_corners = avoid;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    cells: [[Tile; SIZE]; SIZE],
    score: u64,
    attach_chance: f64,
    pool: SkillPool,
}

impl Default for Board {
    fn default() -> Self {
        Board::new()
    }
}

impl Board {
    /// An empty board that never attaches skills to spawns.
    pub fn new() -> Self {
        Board {
            cells: [[Tile::EMPTY; SIZE]; SIZE],
            score: 0,
            attach_chance: 0.0,
            pool: SkillPool::Catalog,
        }
    }

    /// A board holding `grid` with no metadata.
    pub fn from_grid(grid: &Grid) -> Self {
        let mut board = Board::new();
        board.set_grid(grid);
        board
    }

    /// Enable skill attachment on spawned tiles.
    pub fn with_skills(mut self, attach_chance: f64, pool: SkillPool) -> Self {
        self.attach_chance = attach_chance.clamp(0.0, 1.0);
        self.pool = pool;
        self
    }

    /// Empty board with two random tiles.
    pub fn fresh<R: Rng + ?Sized>(rng: &mut R, attach_chance: f64, pool: SkillPool) -> Self {
        let mut board = Board::new().with_skills(attach_chance, pool);
        board.spawn_random_tile(rng, Spawn::RANDOM);
        board.spawn_random_tile(rng, Spawn::RANDOM);
        board
    }

    pub fn grid(&self) -> Grid {
        let mut grid = [[0; SIZE]; SIZE];
        for cell in Cell::all() {
            grid[cell.row][cell.col] = self.value(cell);
        }
        grid
    }

    /// Overwrite every value, dropping all metadata. Score is kept.
    pub fn set_grid(&mut self, grid: &Grid) {
        for cell in Cell::all() {
            *self.tile_mut(cell) = Tile::plain(grid[cell.row][cell.col]);
        }
    }

    #[inline]
    pub fn tile(&self, cell: Cell) -> &Tile {
        &self.cells[cell.row][cell.col]
    }

    /// Overwrite one cell, metadata included.
    pub fn set_tile(&mut self, cell: Cell, tile: Tile) {
        *self.tile_mut(cell) = tile;
    }

    #[inline]
    fn tile_mut(&mut self, cell: Cell) -> &mut Tile {
        &mut self.cells[cell.row][cell.col]
    }

    #[inline]
    pub fn value(&self, cell: Cell) -> u32 {
        self.tile(cell).value
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn attach_chance(&self) -> f64 {
        self.attach_chance
    }

    pub fn pool(&self) -> &SkillPool {
        &self.pool
    }

    /// Attach a skill to an occupied cell.
    pub fn attach_skill(&mut self, cell: Cell, skill: SkillId) -> bool {
        let tile = self.tile_mut(cell);
        if tile.is_empty() {
            return false;
        }
        tile.skill = Some(skill);
        true
    }

    /// Cells carrying an armed bomb.
    pub fn bombs(&self) -> BTreeMap<Cell, Bomb> {
        Cell::all().filter_map(|c| self.tile(c).bomb.map(|b| (c, b))).collect()
    }

    pub fn disruption_cells(&self) -> Vec<Cell> {
        Cell::all().filter(|&c| self.tile(c).disruption).collect()
    }

    pub fn attached_skills(&self) -> BTreeMap<Cell, SkillId> {
        Cell::all().filter_map(|c| self.tile(c).skill.map(|s| (c, s))).collect()
    }

    fn occupied(&self) -> impl Iterator<Item = Cell> + '_ {
        Cell::all().filter(|&c| !self.tile(c).is_empty())
    }

    pub fn empty_cells(&self) -> Vec<Cell> {
        Cell::all().filter(|&c| self.tile(c).is_empty()).collect()
    }

    pub fn max_tile(&self) -> u32 {
        Cell::all().map(|c| self.value(c)).max().unwrap_or(0)
    }

    pub fn count_value(&self, value: u32) -> usize {
        Cell::all().filter(|&c| self.value(c) == value).count()
    }

    pub fn tile_count(&self) -> usize {
        self.occupied().count()
    }

    /// Cells holding 128, 512 or 1024, row-major.
    pub fn attackable_tiles(&self) -> Vec<(Cell, u32)> {
        self.occupied()
            .map(|c| (c, self.value(c)))
            .filter(|(_, v)| ATTACK_VALUES.contains(v))
            .collect()
    }

    /// True iff an empty cell exists or two axis-adjacent tiles are equal.
    pub fn can_slide(&self) -> bool {
        Cell::all().any(|cell| {
            let value = self.value(cell);
            value == 0
                || [Direction::Right, Direction::Down]
                    .into_iter()
                    .filter_map(|dir| cell.step(dir))
                    .any(|next| self.value(next) == value)
        })
    }

    fn traversal(dir: Direction) -> Vec<Cell> {
        let forward: Vec<usize> = (0..SIZE).collect();
        let backward: Vec<usize> = (0..SIZE).rev().collect();
        let rows = if dir == Direction::Down { &backward } else { &forward };
        let cols = if dir == Direction::Right { &backward } else { &forward };
        rows.iter()
            .flat_map(|&row| cols.iter().map(move |&col| Cell::new(row, col)))
            .collect()
    }

    /// Slide and merge every tile toward `dir`.
    ///
    /// Cells closest to the target edge move first, and a cell takes part in
    /// at most one merge per slide. Skills attached to either merge source are
    /// released into the outcome.
    pub fn slide(&mut self, dir: Direction) -> MoveOutcome {
        let mut outcome = MoveOutcome::default();
        let mut merged = [[false; SIZE]; SIZE];

        for from in Board::traversal(dir) {
            let tile = *self.tile(from);
            if tile.is_empty() {
                continue;
            }

            let mut to = from;
            let mut merge_into = None;
            while let Some(next) = to.step(dir) {
                let ahead = self.tile(next);
                if ahead.is_empty() {
                    to = next;
                } else {
                    if ahead.value == tile.value && !merged[next.row][next.col] {
                        merge_into = Some(next);
                    }
                    break;
                }
            }

            if let Some(target) = merge_into {
                let value = tile.value * 2;
                let target_skill = self.tile(target).skill;
                *self.tile_mut(from) = Tile::EMPTY;
                *self.tile_mut(target) = Tile::plain(value);
                merged[target.row][target.col] = true;
                self.score += u64::from(value);
                outcome.moved = true;
                outcome.merges.push(Merge { cell: target, value });
                if let Some(skill) = tile.skill {
                    outcome.triggered.push(TriggeredSkill { skill, cell: target });
                }
                if let Some(skill) = target_skill.filter(|&s| Some(s) != tile.skill) {
                    outcome.triggered.push(TriggeredSkill { skill, cell: target });
                }
            } else if to != from {
                let mut moving = tile;
                moving.bomb = moving.bomb.filter(|b| b.value == moving.value);
                *self.tile_mut(from) = Tile::EMPTY;
                *self.tile_mut(to) = moving;
                outcome.moved = true;
            }
        }
        outcome
    }

    /// Place a tile on a random empty cell. `None` when the board is full.
    pub fn spawn_random_tile<R: Rng + ?Sized>(&mut self, rng: &mut R, spawn: Spawn) -> Option<Cell> {
        let empty = self.empty_cells();
        let candidates = if spawn.avoid_corners {
            let inner: Vec<Cell> = empty.iter().copied().filter(|c| !c.is_corner()).collect();
            if inner.is_empty() {
                empty
            } else {
                inner
            }
        } else {
            empty
        };
        let cell = *candidates.choose(rng)?;
        let value = spawn.value.unwrap_or_else(|| if rng.gen::<f64>() < 0.9 { 2 } else { 4 });
        let disruption = spawn.disruption && value == 2;
        let skill = if !disruption && rng.gen::<f64>() < self.attach_chance {
            self.pool.draw(rng)
        } else {
            None
        };
        *self.tile_mut(cell) = Tile { value, disruption, bomb: None, skill };
        Some(cell)
    }

    /// Put a bomb tile (2, 4 or 8) on a random empty cell.
    pub fn plant_bomb<R: Rng + ?Sized>(&mut self, rng: &mut R, fuse: f32) -> Option<(Cell, u32)> {
        let cell = *self.empty_cells().choose(rng)?;
        let value = *[2, 4, 8].choose(rng)?;
        *self.tile_mut(cell) = Tile { bomb: Some(Bomb { fuse, value }), ..Tile::plain(value) };
        Some((cell, value))
    }

    /// Burn `dt` off every fuse. Bombs whose tile changed value are disarmed
    /// silently; the cells of bombs that ran out are returned (and disarmed).
    pub fn tick_bombs(&mut self, dt: f32) -> Vec<Cell> {
        let mut due = Vec::new();
        for cell in Cell::all() {
            let tile = self.tile_mut(cell);
            let Some(mut bomb) = tile.bomb.take() else { continue };
            if tile.value != bomb.value {
                continue;
            }
            bomb.fuse -= dt;
            if bomb.fuse <= 0.0 {
                due.push(cell);
            } else {
                tile.bomb = Some(bomb);
            }
        }
        due
    }

    /// Clear the 3x3 block centred on `center`. Returns the tiles removed.
    pub fn explode(&mut self, center: Cell) -> usize {
        let mut cleared = 0;
        for row in center.row.saturating_sub(1)..=(center.row + 1).min(SIZE - 1) {
            for col in center.col.saturating_sub(1)..=(center.col + 1).min(SIZE - 1) {
                let tile = self.tile_mut(Cell::new(row, col));
                if !tile.is_empty() {
                    *tile = Tile::EMPTY;
                    cleared += 1;
                }
            }
        }
        cleared
    }

    fn clear_where(&mut self, pred: impl Fn(u32) -> bool) -> usize {
        let mut cleared = 0;
        for cell in Cell::all() {
            let tile = self.tile_mut(cell);
            if !tile.is_empty() && pred(tile.value) {
                *tile = Tile::EMPTY;
                cleared += 1;
            }
        }
        cleared
    }

    pub fn clear_value(&mut self, value: u32) -> usize {
        self.clear_where(|v| v == value)
    }

    pub fn clear_twos(&mut self) -> usize {
        self.clear_value(2)
    }

    pub fn clear_at_most(&mut self, threshold: u32) -> usize {
        self.clear_where(|v| v <= threshold)
    }

    /// Halve every tile; 2s vanish. Returns the number of tiles touched.
    pub fn halve_all(&mut self) -> usize {
        let mut touched = 0;
        for cell in Cell::all() {
            let tile = self.tile_mut(cell);
            if tile.is_empty() {
                continue;
            }
            *tile = if tile.value <= 2 { Tile::EMPTY } else { Tile::plain(tile.value / 2) };
            touched += 1;
        }
        touched
    }

    /// Distinct tile values present, ascending.
    pub fn value_classes(&self) -> Vec<u32> {
        let mut classes: Vec<u32> = self.occupied().map(|c| self.value(c)).collect();
        classes.sort_unstable();
        classes.dedup();
        classes
    }

    /// Double every tile of one random value class below 1024.
    pub fn double_random_class<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<u32> {
        let classes: Vec<u32> = self.value_classes().into_iter().filter(|&v| v < 1024).collect();
        let class = *classes.choose(rng)?;
        for cell in Cell::all() {
            if self.value(cell) == class {
                *self.tile_mut(cell) = Tile::plain(class * 2);
            }
        }
        Some(class)
    }

    fn random_cell_where<R: Rng + ?Sized>(&self, rng: &mut R, pred: impl Fn(u32) -> bool) -> Option<Cell> {
        let cells: Vec<Cell> = self.occupied().filter(|&c| pred(self.value(c))).collect();
        cells.choose(rng).copied()
    }

    /// Turn a random 2 into a 4.
    pub fn convert_random_two<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Cell> {
        let cell = self.random_cell_where(rng, |v| v == 2)?;
        *self.tile_mut(cell) = Tile::plain(4);
        Some(cell)
    }

    /// Remove a random tile worth 8 or less and return its value.
    pub fn take_random_low<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<u32> {
        let cell = self.random_cell_where(rng, |v| v <= 8)?;
        self.remove_tile(cell)
    }

    /// Place a plain tile of `value` on a random empty cell.
    pub fn place_random<R: Rng + ?Sized>(&mut self, rng: &mut R, value: u32) -> Option<Cell> {
        let cell = *self.empty_cells().choose(rng)?;
        *self.tile_mut(cell) = Tile::plain(value);
        Some(cell)
    }

    pub fn remove_random<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<(Cell, u32)> {
        let cell = self.random_cell_where(rng, |_| true)?;
        self.remove_tile(cell).map(|v| (cell, v))
    }

    /// Empty `cell`, returning the value it held.
    pub fn remove_tile(&mut self, cell: Cell) -> Option<u32> {
        let tile = std::mem::take(self.tile_mut(cell));
        (!tile.is_empty()).then_some(tile.value)
    }

    /// Exchange values with `other`. Metadata on both boards is dropped.
    pub fn swap_with(&mut self, other: &mut Board) {
        let (mine, theirs) = (self.grid(), other.grid());
        self.set_grid(&theirs);
        other.set_grid(&mine);
    }

    /// Copy `other`'s values onto this board.
    pub fn copy_from(&mut self, other: &Board) {
        self.set_grid(&other.grid());
    }

    /// Clear the board and seed two fresh tiles. Returns the tiles removed.
    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        let cleared = self.tile_count();
        self.cells = [[Tile::EMPTY; SIZE]; SIZE];
        self.spawn_random_tile(rng, Spawn::RANDOM);
        self.spawn_random_tile(rng, Spawn::RANDOM);
        cleared
    }

    /// Merge the first adjacent equal pair (row-major, right then down) into
    /// its upper-left tile.
    pub fn merge_one_pair(&mut self) -> Option<Merge> {
        let (keep, gone) = Cell::all().find_map(|cell| {
            let value = self.value(cell);
            if value == 0 {
                return None;
            }
            [Direction::Right, Direction::Down]
                .into_iter()
                .filter_map(|dir| cell.step(dir))
                .find(|&next| self.value(next) == value)
                .map(|next| (cell, next))
        })?;
        let value = self.value(keep) * 2;
        *self.tile_mut(keep) = Tile::plain(value);
        *self.tile_mut(gone) = Tile::EMPTY;
        self.score += u64::from(value);
        Some(Merge { cell: keep, value })
    }

    /// Halve the highest tile (first in row-major order on ties); a 2
    /// vanishes.
    pub fn halve_max_tile(&mut self) -> Option<(Cell, u32)> {
        let max = self.max_tile();
        let cell = self.occupied().find(|&c| self.value(c) == max)?;
        *self.tile_mut(cell) = if max <= 2 { Tile::EMPTY } else { Tile::plain(max / 2) };
        Some((cell, max / 2))
    }

    /// Redistribute the current values over random positions.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut values: Vec<u32> = Cell::all().map(|c| self.value(c)).collect();
        values.shuffle(rng);
        for (cell, value) in Cell::all().zip(values) {
            *self.tile_mut(cell) = Tile::plain(value);
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_grid(f, &self.grid())
    }
}
