//! Arcadium command line
//!
//! Plays solo games against the computer, follows background rooms and prints
//! the configured exchange rates.

use arcadium::{
    catalog::{demo_wallets, game_info},
    common::config::{generate_sample_config, ConfigLoader},
    config::ArcadiumConfig,
    errors::{ArcadiumResult, ConfigurationError, RoomError},
    games::{ComputerOpponent, SessionStatus},
    Currency, GameKind, Platform, PlatformEvent, RoomId, RoomStatus,
};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, time::Duration};
use tokio_stream::StreamExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

const POLL: Duration = Duration::from_millis(50);

/// Arcadium game platform CLI
#[derive(Parser)]
#[command(name = "arcadium")]
#[command(about = "Multiplayer mini-game platform core")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a solo game with a random local strategy
    Play {
        /// grid-capture, pair-match or combat
        #[arg(short, long, default_value = "grid-capture")]
        game: GameKind,

        /// Seed for a reproducible board
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Follow a seeded background room until it finishes
    Spectate {
        #[arg(short, long, default_value = "live_001")]
        room: String,
    },

    /// Print the currency rate table
    Rates {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a sample configuration file
    SampleConfig {
        #[arg(short, long, default_value = "arcadium.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ArcadiumResult<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::new().with_path(path).load()?,
        None => ConfigLoader::new().load()?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.monitoring.log_level.as_filter())),
        )
        .init();

    match cli.command {
        Commands::Play { game, seed } => play(config, game, seed).await,
        Commands::Spectate { room } => spectate(config, RoomId::from(room)).await,
        Commands::Rates { json } => print_rates(&config, json),
        Commands::SampleConfig { output } => {
            generate_sample_config(&output.to_string_lossy())?;
            println!("Sample configuration written to {}", output.display());
            Ok(())
        }
    }
}

async fn play(config: ArcadiumConfig, kind: GameKind, seed: Option<u64>) -> ArcadiumResult<()> {
    let platform = Platform::builder().with_config(config).build().await?;
    let mut events = platform.subscribe();
    let profile = demo_wallets().remove(0);
    let me = platform.connect(&profile).identity;

    let info = game_info(kind);
    println!("🎮 {} ({:?}) - {}", info.name, info.difficulty, info.description);

    let snapshot = platform.start_solo(&me, kind, seed)?;
    let session = snapshot.session_id.clone();
    let strategy = ComputerOpponent::new();
    let mut rng = rand::thread_rng();

    while platform.is_tracking(&session) {
        let snapshot = match platform.snapshot(&session) {
            Ok(snapshot) => snapshot,
            Err(_) => break,
        };
        let my_turn = snapshot.status == SessionStatus::Active
            && !snapshot.awaiting_settle
            && snapshot.turn_owner == 0;
        if !my_turn {
            tokio::time::sleep(POLL).await;
            continue;
        }
        match strategy.choose(&snapshot, 0, &mut rng) {
            Some(mv) => {
                let result = platform.play_move(&me, &session, mv)?;
                println!("  you: {:?}", result.effect);
            }
            None => tokio::time::sleep(POLL).await,
        }
    }

    while let Ok(event) = events.recv().await {
        let PlatformEvent::SessionCompleted(report) = event;
        if report.session_id != session {
            continue;
        }
        for (_, entry) in &report.entries {
            println!(
                "🏁 {:?} against {}: {} - {}, reward {} {}",
                entry.result,
                entry.opponent_name,
                entry.player_score,
                entry.opponent_score,
                entry.reward,
                Currency::Jup
            );
        }
        break;
    }

    if let Some(wallet) = platform.ledger().wallet(&me) {
        println!("💰 Wallet {} (level {})", wallet.display_name, wallet.level);
        for currency in Currency::ALL {
            println!("  {:>5} {:.6}", currency, wallet.balance(currency));
        }
        for tx in platform.ledger().transactions(&me) {
            println!("  [{}] {} {} {} ({})", tx.reference, tx.kind, tx.amount, tx.currency, tx.description);
        }
    }

    platform.shutdown();
    Ok(())
}

async fn spectate(config: ArcadiumConfig, room_id: RoomId) -> ArcadiumResult<()> {
    let platform = Platform::builder().with_config(config).build().await?;
    platform.seed_demo_rooms(None);

    let room = platform
        .rooms()
        .room(&room_id)
        .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;
    if !room.is_background() {
        return Err(RoomError::RoomUnavailable(room_id).into());
    }

    info!(room_id = %room_id, "Spectating");
    let mut stream = platform.spectate(&room_id)?;
    while let Some(room) = stream.next().await {
        let seats: Vec<String> = room
            .seats
            .iter()
            .flatten()
            .map(|p| format!("{} {} {}", p.avatar, p.display_name, p.score))
            .collect();
        println!("👀 {} [{}] {}", room.id, room.kind, seats.join("  vs  "));
        if room.status == RoomStatus::Finished {
            let winner = room
                .seats
                .iter()
                .flatten()
                .find(|p| Some(&p.identity) == room.winner.as_ref())
                .map(|p| p.display_name.as_str())
                .unwrap_or("nobody");
            println!("🏆 {} wins", winner);
            break;
        }
    }

    platform.shutdown();
    Ok(())
}

fn print_rates(config: &ArcadiumConfig, json: bool) -> ArcadiumResult<()> {
    if json {
        let rendered = serde_json::to_string_pretty(&config.ledger)
            .map_err(|e| ConfigurationError::SaveFailed(e.to_string()))?;
        println!("{}", rendered);
        return Ok(());
    }
    println!("Rates relative to {}", Currency::Jup);
    for currency in Currency::ALL {
        println!("  {:>5} {}", currency, config.ledger.rates.rate(currency));
    }
    println!("Reward multiplier {}", config.ledger.reward_multiplier);
    Ok(())
}
