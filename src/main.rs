use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{Days, Utc};
use clap::{Parser, Subcommand};
use tracing::error;

use momentum_predictor::config::{Config, parse_leagues};
use momentum_predictor::pipeline::Predictor;

#[derive(Parser)]
#[command(name = "momentum_predictor")]
#[command(about = "Momentum-based football match predictions with adaptive weights", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict upcoming fixtures and store the predictions
    Predict {
        /// Days ahead to cover, starting today
        #[arg(long, default_value_t = 7)]
        days: u64,

        /// Comma-separated league ids, overriding PREDICTOR_LEAGUES
        #[arg(long)]
        leagues: Option<String>,

        /// Write an xlsx copy of the predictions
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Resolve finished fixtures and run a learning pass
    Learn,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug,momentum_predictor=debug")
        } else {
            EnvFilter::new("info,momentum_predictor=info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    dotenvy::from_filename(".env.local").ok();
    dotenvy::dotenv().ok();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<()> {
    let mut config = Config::from_env().context("configuration")?;

    match command {
        Commands::Predict {
            days,
            leagues,
            export,
        } => {
            if let Some(raw) = leagues {
                config.league_ids = parse_leagues(&raw)
                    .with_context(|| format!("invalid --leagues value {raw:?}"))?;
            }
            if export.is_some() {
                config.export_path = export;
            }
            let predictor = Predictor::from_config(config)?;

            let now = Utc::now();
            let from = now.date_naive();
            let to = from
                .checked_add_days(Days::new(days.saturating_sub(1)))
                .unwrap_or(from);
            let summary = predictor.run_predict(from, to, &now.to_rfc3339());

            println!("Predictions {from} .. {to}");
            for row in &summary.predictions {
                let p = &row.prediction;
                println!(
                    "{} {} vs {}: H {}% D {}% A {}% | O2.5 {}% BTTS {}% | conf {:.2}",
                    row.fixture.match_date(),
                    row.fixture.home_team,
                    row.fixture.away_team,
                    p.home_win,
                    p.draw,
                    p.away_win,
                    p.over_25,
                    p.btts,
                    p.confidence_score
                );
            }
            println!(
                "fixtures={} stored={} skipped={} write_failures={}",
                summary.fixtures_seen,
                summary.persisted,
                summary.skipped,
                summary.persist_failed
            );
        }
        Commands::Learn => {
            let predictor = Predictor::from_config(config)?;
            let now = Utc::now();
            let summary = predictor.run_learn(now.date_naive(), &now.to_rfc3339());

            println!(
                "pending={} resolved={} still_pending={} fetch_failures={}",
                summary.pending, summary.resolved, summary.still_pending, summary.fetch_failed
            );
            if summary.metrics.samples > 0 {
                println!(
                    "brier={:.4} log_loss={:.4} hit_rate={:.3}",
                    summary.metrics.brier, summary.metrics.log_loss, summary.metrics.accuracy
                );
            }
            if summary.learned {
                println!("weights updated: {}", summary.weights_updated);
            }
        }
    }
    Ok(())
}
