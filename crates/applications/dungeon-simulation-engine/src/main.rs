//! Dungeon Simulation CLI
//!
//! ```bash
//! # Run with ./config.txt, one duration unit = one second
//! dungeon-sim
//!
//! # Quick run: one unit = 50ms, batch admission, JSON summary
//! dungeon-sim --config queue.txt --time-unit-ms 50 --policy burst --output summary.json
//! ```
//!
//! Status blocks and the summary go to stdout, logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use dungeon_core::DurationSource;
use dungeon_simulation_engine::{
    AdmissionPolicy, ConsoleReporter, Dispatcher, RandomDuration, SimulationConfig,
    config::{DEFAULT_CONFIG_FILE, DEFAULT_TIME_UNIT_MS},
    write_summary_json,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "dungeon-sim")]
#[command(about = "Simulate dungeon instances serving parties from a shared player queue", long_about = None)]
struct Cli {
    /// Configuration file (key = value per line: n, t, h, d, t1, t2)
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Admission policy
    #[arg(long, value_enum, default_value_t = AdmissionPolicy::Persistent)]
    policy: AdmissionPolicy,

    /// Wall-clock milliseconds per duration unit
    #[arg(long, default_value_t = DEFAULT_TIME_UNIT_MS)]
    time_unit_ms: u64,

    /// Seed for run durations (random if omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Output JSON file path for the final summary (optional)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only print the final summary
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dungeon_sim=info,dungeon_simulation_engine=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    println!("Reading config from {}", cli.config.display());
    let config = SimulationConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?
        .with_policy(cli.policy)
        .with_time_unit(Duration::from_millis(cli.time_unit_ms));

    let durations: Arc<dyn DurationSource> = match cli.seed {
        Some(seed) => Arc::new(RandomDuration::seeded(seed)),
        None => Arc::new(RandomDuration::new()),
    };

    let dispatcher = Dispatcher::new(config, durations)?;

    let cancel = dispatcher.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl+C received, letting running dungeons finish");
            cancel.cancel();
        }
    });

    let reporter = if cli.quiet {
        ConsoleReporter::stdout().summary_only()
    } else {
        ConsoleReporter::stdout()
    };
    let summary = dispatcher.run(reporter).await?;

    if let Some(path) = cli.output {
        write_summary_json(&path, &summary)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Summary written");
    }

    Ok(())
}
