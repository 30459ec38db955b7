//! PeakTrack CLI — scenario replay and store inspection commands.
//!
//! Commands:
//! - `replay` — seed a tracker from a TOML scenario, replay a CSV price
//!   feed tick by tick, report triggered sells, and flush state to a JSON
//!   store file after every tick
//! - `store status` — list what a store file currently holds

mod scenario;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use peaktrack_core::{DecimalAmount, JsonFileStore, KvStore, PeakPriceTracker, Position};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::scenario::Scenario;

/// Significant figures used when rendering prices for humans.
const PRICE_SIG_FIGS: usize = 6;

#[derive(Parser)]
#[command(
    name = "peaktrack",
    about = "PeakTrack CLI — trailing stop-loss position tracker"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a CSV price feed against a scenario's positions.
    Replay {
        /// Path to a TOML scenario file (token pair + seeded positions).
        #[arg(long)]
        scenario: PathBuf,

        /// Path to a CSV price feed with a `price` column.
        #[arg(long)]
        feed: PathBuf,

        /// Store file holding persisted tracker state.
        #[arg(long, default_value = "peaktrack-store.json")]
        store: PathBuf,
    },
    /// Store management commands.
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
}

#[derive(Subcommand)]
enum StoreAction {
    /// List the entries a store file currently holds.
    Status {
        /// Store file holding persisted tracker state.
        #[arg(long, default_value = "peaktrack-store.json")]
        store: PathBuf,
    },
}

/// One row of the replayed price feed.
#[derive(Debug, Deserialize)]
struct FeedRow {
    #[serde(default)]
    timestamp: Option<String>,
    price: DecimalAmount,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Replay {
            scenario,
            feed,
            store,
        } => replay(&scenario, &feed, &store),
        Commands::Store {
            action: StoreAction::Status { store },
        } => store_status(&store),
    }
}

fn replay(scenario_path: &PathBuf, feed_path: &PathBuf, store_path: &PathBuf) -> Result<()> {
    let scenario = Scenario::load(scenario_path)?;
    let prefix = scenario.storage_prefix();

    let mut store = JsonFileStore::open(store_path)
        .with_context(|| format!("failed to open store {}", store_path.display()))?;
    let mut tracker =
        PeakPriceTracker::load(prefix.clone(), &store).context("failed to load tracker state")?;

    // Seed scenario positions that are not already tracked, so replays can
    // resume against an existing store without duplicating positions.
    let mut seeded = 0usize;
    for position in scenario.seed_positions() {
        let already_tracked = tracker
            .index()
            .iter_positions()
            .any(|(_, p)| p.position_id == position.position_id);
        if !already_tracked {
            tracker.add(position);
            seeded += 1;
        }
    }
    tracker
        .flush_to_storage(&mut store)
        .context("failed to flush seeded positions")?;
    info!(prefix = %prefix, seeded, "replay starting");

    let mut reader = csv::Reader::from_path(feed_path)
        .with_context(|| format!("failed to open feed {}", feed_path.display()))?;

    let mut ticks = 0usize;
    let mut sold = 0usize;
    for (line, row) in reader.deserialize::<FeedRow>().enumerate() {
        let row = row.with_context(|| format!("bad feed row at line {}", line + 2))?;
        ticks += 1;

        let triggered = tracker.update(&row.price);
        for position in &triggered {
            report_sale(position, &row);
            // Simulate the order-execution side: freeze the position, then
            // drop it as if the sell confirmed immediately.
            tracker.mark_as_closing(&position.position_id);
            tracker.remove(&position.position_id);
            sold += 1;
        }

        let stats = tracker
            .flush_to_storage(&mut store)
            .with_context(|| format!("flush failed after tick {ticks}"))?;
        if !stats.is_noop() {
            info!(ticks, puts = stats.puts, deletes = stats.deletes, "flushed");
        }
    }

    println!(
        "replayed {ticks} ticks: {sold} position(s) sold, {} still open, state in {}",
        tracker.index().position_count(),
        store_path.display()
    );
    Ok(())
}

fn report_sale(position: &Position, row: &FeedRow) {
    let when = row
        .timestamp
        .as_deref()
        .map(|t| format!(" at {t}"))
        .unwrap_or_default();
    println!(
        "SELL{when}: {} {} {} (filled at {} {}, trailing stop {}%) sold at {} {}",
        position.position_id,
        position.token_amt.to_friendly_string(PRICE_SIG_FIGS),
        position.token.symbol,
        position.fill_price.to_friendly_string(PRICE_SIG_FIGS),
        position.vs_token.symbol,
        position.trigger_percent,
        row.price.to_friendly_string(PRICE_SIG_FIGS),
        position.vs_token.symbol,
    );
}

fn store_status(store_path: &PathBuf) -> Result<()> {
    let store = JsonFileStore::open(store_path)
        .with_context(|| format!("failed to open store {}", store_path.display()))?;
    let entries = store.list()?;
    if entries.is_empty() {
        println!("{}: empty", store_path.display());
        return Ok(());
    }

    println!("{}: {} entr(ies)", store_path.display(), entries.len());
    for (key, value) in entries {
        match serde_json::from_str::<Position>(&value) {
            Ok(position) => println!(
                "  {key} -> {} [{:?}] fill {} trigger {}%",
                position.position_id,
                position.status,
                position.fill_price.to_friendly_string(PRICE_SIG_FIGS),
                position.trigger_percent,
            ),
            Err(_) => println!("  {key} -> (unrecognized value)"),
        }
    }
    Ok(())
}
