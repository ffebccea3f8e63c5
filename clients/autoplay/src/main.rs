use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use crash::{
    CrashRules, JsonFileStore, KeyValueStore, PlayerAccount, RoundDriver,
    RoundEngine, RoundPhase,
};
use rand_chacha::ChaCha8Rng;

mod session;
use session::{RoundResult, Session};

type BoxErr = Box<dyn std::error::Error + Send + Sync>;
type Driver = RoundDriver<JsonFileStore, ChaCha8Rng>;

#[derive(Parser)]
#[command(name = "crash-autoplay", about = "Headless crash player with automatic cash-out")]
struct Cli {
    /// JSON file holding the balance and best multiplier
    #[arg(long, env = "CRASH_STORE", default_value = "crash-store.json")]
    store: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play rounds in real time, betting every countdown
    Play {
        /// Bet placed on every round
        #[arg(long, env = "CRASH_BET", default_value = "10")]
        bet: u64,

        /// Auto cash-out multiplier
        #[arg(long, env = "CRASH_TARGET", default_value = "2.0")]
        target: f64,

        /// Stop after this many rounds (0 = until interrupted)
        #[arg(long, env = "CRASH_ROUNDS", default_value = "0")]
        rounds: u64,

        /// Rule preset: default, fast
        #[arg(long, env = "CRASH_PRESET", default_value = "default")]
        preset: String,

        /// Print every crashed round's snapshot as JSON on stdout
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Show the stored balance and best multiplier
    Status,
    /// Credit the stored balance with the test grant
    TopUp,
}

struct PlayConfig {
    bet: u64,
    rounds: u64,
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Play {
            bet,
            target,
            rounds,
            preset,
            json,
        } => {
            let config = PlayConfig { bet, rounds, json };
            cmd_play(&cli.store, &preset, target, config).await
        }
        Command::Status => cmd_status(&cli.store),
        Command::TopUp => cmd_top_up(&cli.store),
    };

    if let Err(e) = result {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn parse_preset(preset: &str) -> Result<CrashRules, BoxErr> {
    match preset.to_lowercase().as_str() {
        "default" => Ok(CrashRules::default()),
        "fast" => Ok(CrashRules::fast()),
        _ => Err(format!("Unknown preset '{preset}'. Available: default, fast").into()),
    }
}

fn cmd_status(store_path: &Path) -> Result<(), BoxErr> {
    let store = JsonFileStore::open(store_path)?;
    let rules = CrashRules::default();
    let account = PlayerAccount::load(&store, &rules);
    println!("Store:           {}", store.path().display());
    println!("Balance:         {}", account.balance);
    println!("Best multiplier: {:.2}x", account.highest_multiplier);
    if account.is_low_balance(&rules) {
        println!("Balance is low; run `top-up` for {} more", rules.test_balance_grant);
    }
    Ok(())
}

fn cmd_top_up(store_path: &Path) -> Result<(), BoxErr> {
    let store = JsonFileStore::open(store_path)?;
    let mut engine = RoundEngine::new(CrashRules::default(), store)?;
    engine.add_test_balance();
    // The engine only logs failed writes; confirm this one landed
    let stored = engine.store().get(crash::BALANCE_KEY)?;
    if stored != Some(engine.balance().to_string()) {
        return Err("Balance could not be written to the store".into());
    }
    log::info!("Balance is now {}", engine.balance());
    Ok(())
}

async fn cmd_play(
    store_path: &Path,
    preset: &str,
    target: f64,
    config: PlayConfig,
) -> Result<(), BoxErr> {
    let rules = parse_preset(preset)?;
    let store = JsonFileStore::open(store_path)?;
    let mut engine = RoundEngine::new(rules, store)?;
    engine.set_auto_mode(true);
    engine.set_auto_cash_out(target)?;
    log::info!(
        "Playing {} per round, cashing out at {target:.2}x, balance {}",
        config.bet,
        engine.balance()
    );

    let driver: Driver = RoundDriver::spawn(engine);

    let result = tokio::select! {
        r = play_rounds(&driver, &config) => r,
        _ = tokio::signal::ctrl_c() => {
            log::info!("Interrupted");
            Ok(())
        }
    };

    let balance = driver.snapshot().balance;
    driver.shutdown().await;
    log::info!("Final balance {balance}");
    result
}

async fn play_rounds(driver: &Driver, config: &PlayConfig) -> Result<(), BoxErr> {
    let mut rx = driver.subscribe();
    let mut session = Session::default();
    let mut last_phase = rx.borrow_and_update().phase;

    // The driver opens with a countdown, so the first bet can go in right away
    let mut stake = place_bet(driver, config.bet, &mut session);

    loop {
        rx.changed().await?;
        let snapshot = rx.borrow_and_update().clone();
        if snapshot.phase == last_phase {
            continue;
        }
        last_phase = snapshot.phase;

        match snapshot.phase {
            RoundPhase::CountingDown => {
                stake = place_bet(driver, config.bet, &mut session);
            }
            RoundPhase::Running => {
                log::info!("Round {} is running", snapshot.round_id);
            }
            RoundPhase::Crashed => {
                match session.record(&snapshot, stake.take()) {
                    RoundResult::Won {
                        stake,
                        multiplier,
                        payout,
                    } => log::info!(
                        "Round {}: cashed {stake} out at {multiplier:.2}x for {payout}",
                        snapshot.round_id
                    ),
                    RoundResult::Lost { stake } => {
                        log::info!("Round {}: lost {stake}", snapshot.round_id)
                    }
                    RoundResult::Skipped => {
                        log::info!("Round {}: sat out", snapshot.round_id)
                    }
                }
                log::info!(
                    "Crashed at {:.2}x | balance {} | net {:+} | RTP {:.1}% over {} rounds",
                    snapshot.crash_point.unwrap_or(snapshot.multiplier),
                    snapshot.balance,
                    session.net(),
                    session.return_to_player(),
                    session.rounds
                );
                if config.json {
                    println!("{}", serde_json::to_string(&snapshot)?);
                }

                if config.rounds > 0 && session.rounds >= config.rounds {
                    log::info!(
                        "Played {} rounds: {} won, {} lost, {} top-ups",
                        session.rounds,
                        session.wins,
                        session.losses,
                        session.top_ups
                    );
                    return Ok(());
                }
            }
        }
    }
}

fn place_bet(driver: &Driver, amount: u64, session: &mut Session) -> Option<u64> {
    driver.with_engine(|engine| session.place_bet(engine, amount))
}
