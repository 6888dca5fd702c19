//! RLFlow CLI - command-line interface for rlflow training pipelines
//!
//! This CLI provides an `rlflow` command that runs a pipeline from a TOML configuration,
//! previews the train/eval split of a table, and lists published models.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// RLFlow CLI - offline reward model training pipelines
#[derive(Parser, Debug)]
#[command(
    name = "rlflow",
    author,
    version,
    about = "RLFlow - offline reward model training pipelines"
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a training pipeline
    ///
    /// Identifies features (or prepares setup data), queries the train and eval
    /// partitions, trains, and optionally validates and publishes the model.
    Train {
        /// Pipeline configuration file (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Override the table's JSONL file
        #[arg(long)]
        table: Option<PathBuf>,

        /// Override the number of epochs
        #[arg(long)]
        epochs: Option<u32>,

        /// Override the output directory
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Output the training output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the train and eval sample ranges for a split
    Ranges {
        /// Percentage of the table used for training
        #[arg(long)]
        table_sample: Option<f64>,

        /// Percentage of the table held out for evaluation
        #[arg(long)]
        eval_table_sample: Option<f64>,

        /// Enable cross-partition evaluation
        #[arg(long)]
        cpe: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List models recorded by the file system publisher
    Published {
        /// Publisher root directory
        #[arg(long, default_value = "published")]
        root: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Train {
            config,
            table,
            epochs,
            output_dir,
            json,
        } => {
            let args = commands::train::TrainArgs {
                config,
                table,
                epochs,
                output_dir,
                json,
            };
            commands::train::execute(args).await
        }
        Command::Ranges {
            table_sample,
            eval_table_sample,
            cpe,
            json,
        } => commands::ranges::execute(table_sample, eval_table_sample, cpe, json),
        Command::Published { root, json } => commands::published::execute(&root, json),
    }
}
