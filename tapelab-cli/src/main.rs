//! tapelab CLI — run a backtest from a TOML config file.
//!
//! Exit codes: 0 ok, 2 insufficient cash, 3 bad configuration, 4 data gap.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tapelab_core::engine::CancelToken;
use tapelab_runner::runner;
use tracing::error;

#[derive(Parser)]
#[command(name = "tapelab", about = "Event-driven backtesting engine", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a backtest from a TOML config file.
    Run {
        /// Path to the run configuration.
        #[arg(long, short)]
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run { config } => {
            let cancel = CancelToken::new();
            match runner::run_from_file(&config, &cancel) {
                Ok(summary) => {
                    println!(
                        "final equity {:.2} ({} trades, {} rejections, max drawdown {:.2}%)",
                        summary.metrics.final_equity,
                        summary.metrics.trade_count,
                        summary.metrics.rejection_count,
                        summary.metrics.max_drawdown * 100.0
                    );
                    for artifact in &summary.artifacts {
                        println!("wrote {}", artifact.display());
                    }
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    error!("backtest failed: {err:#}");
                    ExitCode::from(runner::exit_code(&err) as u8)
                }
            }
        }
    }
}
