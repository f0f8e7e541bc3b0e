use criterion::{criterion_group, criterion_main, Criterion};
use duel_2048::board::{Board, Spawn, DEFAULT_ATTACH_CHANCE};
use duel_2048::engine::{self, Bitboard, Direction};
use duel_2048::skills::SkillPool;
use rand::{rngs::StdRng, SeedableRng};
use std::hint::black_box;

const SEQ: [Direction; 4] = [Direction::Left, Direction::Up, Direction::Right, Direction::Down];

fn corpus() -> Vec<Board> {
    let mut rng = StdRng::seed_from_u64(1337);
    let mut boards = Vec::new();
    let mut b = Board::fresh(&mut rng, DEFAULT_ATTACH_CHANCE, SkillPool::Catalog);
    boards.push(b.clone());
    for i in 0..48 {
        if b.slide(SEQ[i % SEQ.len()]).moved {
            b.spawn_random_tile(&mut rng, Spawn::RANDOM);
        }
        boards.push(b.clone());
    }
    boards
}

fn bench_slide(c: &mut Criterion) {
    let boards = corpus();
    c.bench_function("board/slide_all_dirs", |bch| {
        bch.iter(|| {
            let mut merges = 0usize;
            for b in &boards {
                for dir in Direction::ALL {
                    let mut copy = b.clone();
                    merges += copy.slide(dir).merges.len();
                }
            }
            black_box(merges)
        })
    });

    c.bench_function("board/spawn", |bch| {
        let mut rng = StdRng::seed_from_u64(9);
        bch.iter(|| {
            let mut placed = 0usize;
            for b in &boards {
                let mut copy = b.clone();
                placed += usize::from(copy.spawn_random_tile(&mut rng, Spawn::RANDOM).is_some());
            }
            black_box(placed)
        })
    });
}

fn bench_bitboard(c: &mut Criterion) {
    engine::warm();
    let packed: Vec<Bitboard> = corpus().iter().map(|b| Bitboard::from_grid(&b.grid())).collect();
    c.bench_function("bitboard/shift_all_dirs", |bch| {
        bch.iter(|| {
            let mut acc = 0u64;
            for &bd in &packed {
                for dir in Direction::ALL {
                    acc ^= bd.shift(dir).raw();
                }
            }
            black_box(acc)
        })
    });
}

criterion_group!(board_ops, bench_slide, bench_bitboard);
criterion_main!(board_ops);
