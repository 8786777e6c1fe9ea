mod catalog;
mod config;
mod corpus;
mod errors;
mod model_client;
mod planning;
mod ranking;

use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::catalog::load_catalogs;
use crate::config::Config;
use crate::corpus::Collector;
use crate::errors::AppError;
use crate::model_client::GeminiClient;
use crate::planning::planner::{self, PlanRequest};
use crate::ranking::selector::{
    SelectionParams, DEFAULT_AVAILABILITY, DEFAULT_DEPTH, DEFAULT_MAX_CARDS,
};

/// Builds personalised study plans from a job description.
#[derive(Parser)]
#[command(name = "planner", version, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select cards for a job description and write the study plan
    Plan {
        #[arg(long, visible_alias = "job_description")]
        job_description: String,

        /// Expertise layers considered
        #[arg(long, default_value_t = DEFAULT_DEPTH)]
        depth: usize,

        /// Pooled card references kept after the priority sort
        #[arg(long, default_value_t = DEFAULT_MAX_CARDS)]
        max_cards: usize,

        /// Cards in the final plan
        #[arg(long, default_value_t = DEFAULT_AVAILABILITY)]
        availability: usize,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Also write one consolidated study plan
        #[arg(long)]
        study_plan: bool,

        /// Also write one study plan per selected card
        #[arg(long)]
        per_card: bool,
    },
    /// Rank the whole card catalog against a query
    Search {
        #[arg(long)]
        query: String,

        #[arg(long, default_value_t = DEFAULT_AVAILABILITY)]
        quantity: usize,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Download the guide repository and rebuild the catalog files
    Collect {
        /// Redo every step even when its output exists
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration first (fails on missing required env vars)
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize structured logging on stderr; stdout carries the output
    let level = match cli.verbose {
        0 => config.rust_log.as_str(),
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), level))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting planner v{}", env!("CARGO_PKG_VERSION"));

    match run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(code = e.code(), "{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, config: &Config) -> Result<(), AppError> {
    let client = GeminiClient::new(
        config.api_key.clone(),
        config.embedding_model.clone(),
        config.generative_model.clone(),
    )?;
    info!("Model client initialized (model: {})", client.generative_model());

    match command {
        Commands::Plan {
            job_description,
            depth,
            max_cards,
            availability,
            format,
            study_plan,
            per_card,
        } => {
            let catalogs = load_catalogs(config)?;
            let request = PlanRequest {
                job_description,
                params: SelectionParams {
                    depth,
                    max_cards,
                    availability,
                },
                study_plan,
                per_card,
            };

            let plan = planner::plan(&client, &catalogs, request).await?;
            match format {
                OutputFormat::Text => print!("{}", planner::render_text(&plan)),
                OutputFormat::Json => println!("{}", to_json(&plan)?),
            }
        }
        Commands::Search {
            query,
            quantity,
            format,
        } => {
            let catalogs = load_catalogs(config)?;
            let cards = planner::search(&client, &catalogs, &query, quantity).await?;
            match format {
                OutputFormat::Text => print!("{}", planner::render_cards(&cards)),
                OutputFormat::Json => println!("{}", to_json(&cards)?),
            }
        }
        Commands::Collect { force } => {
            Collector::new(&client, config).run_all(force).await?;
        }
    }

    Ok(())
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, AppError> {
    Ok(serde_json::to_string_pretty(value).map_err(anyhow::Error::from)?)
}
