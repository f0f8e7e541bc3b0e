use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use duel_2048::battle::Battle;
use duel_2048::combat::Side;
use duel_2048::config::MatchConfig;
use duel_2048::cpu::CpuPolicy;
use duel_2048::skills::{simulate_draws, SkillId};
use indicatif::{ProgressBar, ProgressStyle};
use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

const STEP: f32 = 1.0 / 60.0;

#[derive(Debug, Parser)]
#[command(name = "arena", version, about = "Batch CPU-vs-CPU matches for balancing difficulty levels")]
struct Args {
    /// Levels playing the player's board
    #[arg(long, value_delimiter = ',', default_value = "5")]
    player_levels: Vec<u8>,

    /// CPU opponent levels
    #[arg(long, value_delimiter = ',', default_value = "1,2,3,4,5,6,7,8,9,10")]
    cpu_levels: Vec<u8>,

    /// Matches per pairing
    #[arg(short, long, default_value_t = 50)]
    games: u32,

    /// Base seed; every match derives its own from it
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Matches without a winner after this many simulated seconds count as timeouts
    #[arg(long, default_value_t = 900.0)]
    max_seconds: f64,

    /// JSON match config used as the base for every match
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the report as JSON to this path
    #[arg(short, long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// Simulate skill draws for a loadout instead of playing matches
    #[arg(long)]
    draws: bool,

    /// Loadout for --draws (empty means the whole catalog)
    #[arg(long, value_delimiter = ',')]
    loadout: Vec<SkillId>,

    /// Spawned tiles per simulated game for --draws
    #[arg(long, default_value_t = 200)]
    tiles: u32,

    /// Chance a spawned tile carries a skill for --draws
    #[arg(long, default_value_t = 0.15)]
    attach_rate: f64,

    /// Suppress the progress bar
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy)]
struct Job {
    player_level: u8,
    cpu_level: u8,
    seed: u64,
}

#[derive(Debug, Clone, Copy)]
struct MatchResult {
    winner: Option<Side>,
    seconds: f64,
    player_score: u64,
}

#[derive(Debug, Serialize)]
struct PairingReport {
    player_level: u8,
    cpu_level: u8,
    games: u32,
    player_wins: u32,
    cpu_wins: u32,
    timeouts: u32,
    player_win_rate: f64,
    avg_seconds: f64,
    avg_player_score: f64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let json = if args.draws {
        let mut rng = StdRng::seed_from_u64(args.seed);
        let report = simulate_draws(&mut rng, &args.loadout, args.games, args.tiles, args.attach_rate);
        print!("{report}");
        serde_json::to_string_pretty(&report)?
    } else {
        let base = match &args.config {
            Some(path) => MatchConfig::from_path(path).with_context(|| format!("loading {}", path.display()))?,
            None => MatchConfig::default(),
        };
        let reports = run_matches(&args, &base)?;
        println!("{:>6} {:>6} {:>7} {:>7} {:>8} {:>8}", "player", "cpu", "win%", "timeout", "avg s", "score");
        for r in &reports {
            println!(
                "{:>6} {:>6} {:>6.1}% {:>7} {:>8.1} {:>8.0}",
                r.player_level,
                r.cpu_level,
                r.player_win_rate * 100.0,
                r.timeouts,
                r.avg_seconds,
                r.avg_player_score
            );
        }
        serde_json::to_string_pretty(&reports)?
    };

    if let Some(path) = &args.out {
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        eprintln!("wrote {}", path.display());
    }
    Ok(())
}

fn run_matches(args: &Args, base: &MatchConfig) -> anyhow::Result<Vec<PairingReport>> {
    let mut jobs = Vec::new();
    for &player_level in &args.player_levels {
        for &cpu_level in &args.cpu_levels {
            for game in 0..args.games {
                let seed = args.seed ^ (u64::from(player_level) << 48) ^ (u64::from(cpu_level) << 40) ^ u64::from(game);
                jobs.push(Job { player_level, cpu_level, seed });
            }
        }
    }
    // Reject bad levels up front rather than inside the pool
    for job in &jobs {
        MatchConfig { cpu_level: job.cpu_level, ..base.clone() }.validate()?;
    }
    info!(matches = jobs.len(), "arena start");

    let pb = if args.quiet { ProgressBar::hidden() } else { ProgressBar::new(jobs.len() as u64) };
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} matches ({eta})")?
            .progress_chars("=>-"),
    );
    let results: Vec<(Job, MatchResult)> = jobs
        .par_iter()
        .map(|&job| {
            let result = play(job, base, args.max_seconds);
            pb.inc(1);
            result.map(|r| (job, r))
        })
        .collect::<Result<_, _>>()?;
    pb.finish_and_clear();

    let mut reports = Vec::new();
    for &player_level in &args.player_levels {
        for &cpu_level in &args.cpu_levels {
            let mine: Vec<&MatchResult> = results
                .iter()
                .filter(|(job, _)| job.player_level == player_level && job.cpu_level == cpu_level)
                .map(|(_, r)| r)
                .collect();
            reports.push(summarize(player_level, cpu_level, &mine));
        }
    }
    Ok(reports)
}

fn play(job: Job, base: &MatchConfig, max_seconds: f64) -> anyhow::Result<MatchResult> {
    let config = MatchConfig { seed: Some(job.seed), cpu_level: job.cpu_level, ..base.clone() };
    let mut battle = Battle::new(&config)?;
    let mut pilot = CpuPolicy::new(job.player_level);
    let mut pace_rng = StdRng::seed_from_u64(job.seed.wrapping_add(1));
    let mut cooldown = pilot.thinking_delay(false, &mut pace_rng);
    while !battle.is_over() && battle.elapsed() < max_seconds {
        cooldown -= STEP;
        if cooldown <= 0.0 {
            battle.autoplay(&mut pilot);
            cooldown = pilot.thinking_delay(battle.combat().is_frozen(Side::Player), &mut pace_rng);
        }
        battle.tick(STEP);
        // Nobody renders these
        battle.drain_events();
    }
    Ok(MatchResult {
        winner: battle.winner(),
        seconds: battle.elapsed(),
        player_score: battle.board(Side::Player).score(),
    })
}

fn summarize(player_level: u8, cpu_level: u8, results: &[&MatchResult]) -> PairingReport {
    let games = results.len() as u32;
    let count = |side: Side| results.iter().filter(|r| r.winner == Some(side)).count() as u32;
    let player_wins = count(Side::Player);
    let cpu_wins = count(Side::Enemy);
    let n = f64::from(games.max(1));
    PairingReport {
        player_level,
        cpu_level,
        games,
        player_wins,
        cpu_wins,
        timeouts: games - player_wins - cpu_wins,
        player_win_rate: f64::from(player_wins) / n,
        avg_seconds: results.iter().map(|r| r.seconds).sum::<f64>() / n,
        avg_player_score: results.iter().map(|r| r.player_score as f64).sum::<f64>() / n,
    }
}

