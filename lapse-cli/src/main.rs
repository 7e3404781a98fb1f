//! lapse CLI
//!
//! Demo harness for the lapse named-table TTL cache.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use rand::Rng;
use tokio::task::JoinSet;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lapse_core::{BufferSink, CacheError, ReadPolicy, TableConfig, TraceSink, TracingSink};
use lapse_registry::CacheRegistry;

/// lapse - named-table cache with adaptive TTL sweeping
#[derive(Parser)]
#[command(name = "lapse")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// How reads treat entries whose lifespan elapsed before the sweep ran
    #[arg(long, global = true, env = "LAPSE_READ_POLICY", default_value = "sweep-defined")]
    read_policy: ReadPolicy,

    /// Table to operate on
    #[arg(long, global = true, env = "LAPSE_TABLE", default_value = "test")]
    table: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk through add / duplicate add / read / miss / expiry
    Demo {
        /// Seconds to wait for the sweep after the reads
        #[arg(short, long, default_value = "6")]
        wait_secs: u64,
    },

    /// Add many expiring keys from parallel tasks and watch the table drain
    Soak {
        /// Number of keys to add
        #[arg(short, long, default_value = "10000")]
        count: usize,
        /// Number of parallel writers
        #[arg(short, long, default_value = "8")]
        workers: usize,
        /// Longest lifespan to draw, in milliseconds
        #[arg(long, default_value = "500")]
        max_lifespan_ms: u64,
        /// Print final table statistics as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "lapse=debug,info"
    } else {
        "lapse=info,warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = TableConfig::new().with_read_policy(cli.read_policy);
    let registry: CacheRegistry<String, String> =
        CacheRegistry::with_config(config).context("Failed to create cache registry")?;

    match cli.command {
        Commands::Demo { wait_secs } => cmd_demo(&registry, &cli.table, wait_secs).await,
        Commands::Soak {
            count,
            workers,
            max_lifespan_ms,
            json,
        } => cmd_soak(&registry, &cli.table, count, workers, max_lifespan_ms, json).await,
    }
}

/// Reproduce the classic add / duplicate / read / miss scenario
async fn cmd_demo(registry: &CacheRegistry<String, String>, name: &str, wait_secs: u64) -> Result<()> {
    println!("{} {}", "🗂  Using table:".cyan().bold(), name);

    let table = registry.table(name);
    let buffer = Arc::new(BufferSink::with_prefix("lapse: "));
    table.set_logger(Some(buffer.clone()));

    table
        .add("aa".into(), Duration::from_secs(5), "aaaaaa".into())
        .context("First add of \"aa\" failed")?;
    println!("   {} aa (5s)", "added".green());

    match table.add("aa".into(), Duration::from_secs(6), "cccccc".into()) {
        Err(CacheError::KeyAlreadyExists) => {
            println!("   {} add aa error: {}", "rejected".yellow(), CacheError::KeyAlreadyExists)
        }
        Err(e) => return Err(e).context("Unexpected error on duplicate add"),
        Ok(_) => bail!("duplicate add of \"aa\" was accepted"),
    }

    let item = table.value("aa").context("Reading \"aa\" failed")?;
    println!("   {} {}", "value:".dimmed(), item.value());

    if let Err(e) = table.value("bb") {
        println!("   {} bb: {}", "miss".yellow(), e);
    }

    println!(
        "\n{} {}s for the sweep...",
        "⏳ Waiting".cyan().bold(),
        wait_secs
    );
    tokio::time::sleep(Duration::from_secs(wait_secs)).await;

    if table.exists("aa") {
        println!("   {} aa is still present", "⚠️".yellow());
    } else {
        println!("   {} aa was swept", "✅".green());
    }

    println!("\n{}", "📋 Trace lines:".yellow().bold());
    for line in buffer.lines() {
        println!("   {}", line);
    }

    Ok(())
}

/// Hammer one table with expiring keys and verify it drains
async fn cmd_soak(
    registry: &CacheRegistry<String, String>,
    name: &str,
    count: usize,
    workers: usize,
    max_lifespan_ms: u64,
    json: bool,
) -> Result<()> {
    if workers == 0 {
        bail!("--workers must be at least 1");
    }
    if max_lifespan_ms == 0 {
        bail!("--max-lifespan-ms must be at least 1");
    }

    println!(
        "{} {} keys from {} workers",
        "📊 Soaking with".cyan().bold(),
        count,
        workers
    );

    let table = registry.table(name);
    let sink: Arc<dyn TraceSink> = Arc::new(TracingSink::new());
    table.set_logger(Some(sink));

    let start = Instant::now();
    let mut tasks = JoinSet::new();
    for worker in 0..workers {
        let table = table.clone();
        tasks.spawn(async move {
            let mut rng = rand::thread_rng();
            let mut added = 0usize;
            for i in (worker..count).step_by(workers) {
                let lifespan = Duration::from_millis(rng.gen_range(1..=max_lifespan_ms));
                if table.add(format!("key-{i}"), lifespan, format!("value-{i}")).is_ok() {
                    added += 1;
                }
            }
            added
        });
    }

    let mut added = 0usize;
    while let Some(result) = tasks.join_next().await {
        added += result.context("Writer task panicked")?;
    }
    info!(added, elapsed = ?start.elapsed(), "Soak writers finished");
    println!("   ✓ Added {} keys in {:?}", added, start.elapsed());
    println!("   ✓ Remaining right after writes: {}", table.len());

    let deadline = Duration::from_millis(max_lifespan_ms * 2 + 250);
    tokio::time::sleep(deadline).await;

    let stats = table.stats();
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }

    if stats.entries == 0 && !stats.armed {
        println!("   {} Table drained and idle after {:?}", "✅".green(), deadline);
        Ok(())
    } else {
        println!(
            "   {} {} entries left, armed: {}",
            "❌".red(),
            stats.entries,
            stats.armed
        );
        bail!("table did not drain within {:?}", deadline)
    }
}
