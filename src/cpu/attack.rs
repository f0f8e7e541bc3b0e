use rand::Rng;

use super::OpponentView;

/// Whether a CPU of `level` spends a tile of `value` on an attack.
///
/// Random draws happen only when a rule actually needs one, so a seeded
/// match replays identically.
pub(crate) fn should_attack<R: Rng + ?Sized>(level: u8, value: u32, view: OpponentView, rng: &mut R) -> bool {
    let empty = view.empty_cells;
    let hp = view.hp;
    match (level, value) {
        (1, 1024) => rng.gen::<f64>() < 0.3,
        (1, _) => false,
        (2, 1024) => rng.gen::<f64>() < 0.7,
        (2, 512) => rng.gen::<f64>() < 0.3,
        (2, _) => false,
        (3, 1024) => true,
        (3, 512) => rng.gen::<f64>() < 0.4,
        (3, _) => empty < 6 && rng.gen::<f64>() < 0.3,
        (4, 1024) => true,
        (4, 512) => hp <= 3 || rng.gen::<f64>() < 0.5,
        (4, _) => empty < 5 && rng.gen::<f64>() < 0.4,
        (5, 1024) => true,
        (5, 512) => hp <= 2 || empty < 4 || rng.gen::<f64>() < 0.3,
        (5, _) => empty < 5,
        (6, 1024) => true,
        (6, 512) => hp <= 3 || empty < 5,
        (6, _) => empty < 6,
        (7, 128) => empty < 7,
        (8, 128) => empty < 8,
        _ => true,
    }
}
