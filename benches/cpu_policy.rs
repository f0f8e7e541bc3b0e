use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use duel_2048::board::Grid;
use duel_2048::cpu::CpuPolicy;
use duel_2048::engine::{Bitboard, Direction};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::hint::black_box;

fn corpus() -> Vec<Grid> {
    let mut rng = StdRng::seed_from_u64(7777);
    let mut grids = Vec::new();
    let mut b = Bitboard::EMPTY.with_exponent(0, 1).with_exponent(5, 1);
    let seq = [Direction::Left, Direction::Up, Direction::Right, Direction::Down];
    for i in 0..32 {
        if let Some((next, _)) = b.slide_gain(seq[i % seq.len()]) {
            let empty: Vec<usize> = next.empty_slots().collect();
            b = match empty.len() {
                0 => next,
                n => next.with_exponent(empty[rng.gen_range(0..n)], if rng.gen_bool(0.9) { 1 } else { 2 }),
            };
        }
        grids.push(b.to_grid());
    }
    grids
}

fn bench_choose_move(c: &mut Criterion) {
    let grids = corpus();
    let mut group = c.benchmark_group("cpu/choose_move");
    for level in [4u8, 5, 7, 8, 10] {
        let mut cpu = CpuPolicy::new(level);
        let mut rng = StdRng::seed_from_u64(1);
        group.bench_with_input(BenchmarkId::from_parameter(level), &grids, |bch, grids| {
            bch.iter(|| {
                let mut acc = 0usize;
                for g in grids {
                    acc += cpu.choose_move(g, &mut rng).map_or(0, |d| d as usize);
                }
                black_box(acc)
            })
        });
    }
    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let grids = corpus();
    let cpu = CpuPolicy::new(9);
    c.bench_function("cpu/evaluate", |bch| {
        bch.iter(|| {
            let mut acc = 0f64;
            for g in &grids {
                acc = acc.mul_add(1.000_000_1, cpu.evaluate(g));
            }
            black_box(acc)
        })
    });
}

criterion_group!(cpu_policy, bench_choose_move, bench_evaluate);
criterion_main!(cpu_policy);
