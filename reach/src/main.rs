//! # Reach Runtime
//!
//! Command-line entry point. `reach train` starts or resumes a training run
//! depending on whether the checkpoint file exists; `reach evaluate` scores a
//! saved policy against a random-action baseline.

mod app;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "reach", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a policy, resuming from the checkpoint if it exists
    Train {
        /// JSON session config; defaults are used for missing fields
        #[arg(long)]
        config: Option<PathBuf>,

        /// Checkpoint to resume from and save to
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Directory for progress.jsonl
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Environment interactions to train for
        #[arg(long)]
        total_steps: Option<u64>,

        /// Goal position in meters
        #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
        target: Option<Vec<f32>>,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Evaluate a saved policy
    Evaluate {
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Episodes to average over
        #[arg(long, default_value_t = 10)]
        episodes: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Train {
            config,
            checkpoint,
            log_dir,
            total_steps,
            target,
            seed,
        } => {
            let overrides = app::Overrides {
                checkpoint,
                log_dir,
                target,
                seed,
            };
            let config = app::load_config(config.as_deref(), &overrides)?;
            app::train(config, total_steps)
        }
        Command::Evaluate {
            config,
            checkpoint,
            episodes,
        } => {
            let overrides = app::Overrides {
                checkpoint,
                ..app::Overrides::default()
            };
            let config = app::load_config(config.as_deref(), &overrides)?;
            app::evaluate(config, episodes)
        }
    }
}
