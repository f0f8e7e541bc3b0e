use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use duel_2048::battle::Battle;
use duel_2048::combat::Side;
use duel_2048::config::MatchConfig;
use duel_2048::cpu::CpuPolicy;
use duel_2048::events::BattleEvent;
use rand::{rngs::StdRng, SeedableRng};
use tracing_subscriber::EnvFilter;

const STEP: f32 = 1.0 / 60.0;

#[derive(Debug, Parser)]
#[command(name = "duel-2048", version, about = "Watch one CPU-vs-CPU 2048 battle")]
struct Args {
    /// JSON match config; flags below override it
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// RNG seed (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Level of the CPU opponent (1-10)
    #[arg(short, long)]
    level: Option<u8>,

    /// Level of the policy playing the player's board (1-10)
    #[arg(short, long, default_value_t = 5)]
    player_level: u8,

    /// Starting HP for both sides
    #[arg(long)]
    max_hp: Option<u32>,

    /// Give up after this many simulated seconds
    #[arg(long, default_value_t = 900.0)]
    max_seconds: f64,

    /// Sleep between frames to play at wall-clock speed
    #[arg(long)]
    realtime: bool,

    /// Print events as JSON lines instead of the battle log
    #[arg(long)]
    json: bool,

    /// Only print the result
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => MatchConfig::from_path(path).with_context(|| format!("loading {}", path.display()))?,
        None => MatchConfig::default(),
    };
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Some(level) = args.level {
        config.cpu_level = level;
    }
    if let Some(hp) = args.max_hp {
        config.max_hp = hp;
    }

    let mut battle = Battle::new(&config).context("invalid match config")?;
    let mut pilot = CpuPolicy::new(args.player_level);
    // Separate stream so the player's pacing does not disturb the match RNG
    let mut pace_rng = StdRng::seed_from_u64(battle.seed().wrapping_add(1));
    if !args.quiet {
        println!(
            "seed {} | player L{} vs CPU L{} | {} HP",
            battle.seed(),
            pilot.level(),
            battle.cpu().level(),
            battle.combat().max_hp()
        );
    }

    let mut cooldown = pilot.thinking_delay(false, &mut pace_rng);
    while !battle.is_over() && battle.elapsed() < args.max_seconds {
        cooldown -= STEP;
        if cooldown <= 0.0 {
            battle.autoplay(&mut pilot);
            let frozen = battle.combat().is_frozen(Side::Player);
            cooldown = pilot.thinking_delay(frozen, &mut pace_rng);
        }
        battle.tick(STEP);
        for event in battle.drain_events() {
            report(&event, battle.elapsed(), &args)?;
        }
        if args.realtime {
            thread::sleep(Duration::from_secs_f32(STEP));
        }
    }

    if !battle.is_over() {
        battle.stop();
        println!("no winner after {:.0}s", battle.elapsed());
    }
    if !args.quiet && !args.json {
        println!("player (score {}):{}", battle.board(Side::Player).score(), battle.board(Side::Player));
        println!("cpu (score {}):{}", battle.board(Side::Enemy).score(), battle.board(Side::Enemy));
    }
    Ok(())
}

fn report(event: &BattleEvent, elapsed: f64, args: &Args) -> anyhow::Result<()> {
    if args.json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }
    match event {
        BattleEvent::Log { text, .. } if !args.quiet => println!("[{elapsed:>7.2}s] {text}"),
        BattleEvent::GameOver { winner, stats } => {
            let who = match winner {
                Side::Player => "player",
                Side::Enemy => "cpu",
            };
            println!(
                "{who} wins after {elapsed:.1}s | player score {} | max tile {} | damage dealt {}",
                stats.final_score, stats.max_tile, stats.total_damage_dealt
            );
        }
        _ => {}
    }
    Ok(())
}
