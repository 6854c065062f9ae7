//! Theft Over Open Data CLI
//!
//! A command-line tool for calling the prediction API, summarizing
//! predictions, and inspecting or evaluating model artifacts locally.

mod client;
mod commands;
mod output;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use commands::{local, predict, status};
use std::path::PathBuf;
use toodu_lib::{chat::SamplingParams, Algorithm, ModelKey, Variant};

/// Theft Over Open Data CLI
#[derive(Parser)]
#[command(name = "toodu")]
#[command(author, version, about = "CLI for the Theft Over Open Data prediction API", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via TOODU_API_URL env var)
    #[arg(long, env = "TOODU_API_URL", default_value = "http://localhost:5000")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check that the API is running
    Health,

    /// Predict auto theft for one or more records
    Predict {
        /// Classifier: LogisticRegression, DecisionTreeClassifier or RandomForestClassifier
        #[arg(long, short, value_parser = parse_algorithm)]
        model: Algorithm,

        /// Oversampling variant (smote or smotenc)
        #[arg(long, short, default_value = "smote", value_parser = parse_variant)]
        variant: Variant,

        /// JSON file holding an array of feature records
        #[arg(long)]
        file: Option<PathBuf>,

        /// Feature record as KEY=VALUE,KEY=VALUE (repeatable)
        #[arg(long = "record", short)]
        records: Vec<String>,
    },

    /// Summarize a prediction in plain language
    Summarize {
        /// JSON file with the payload to summarize, e.g. a saved prediction response
        #[arg(long)]
        file: PathBuf,

        /// Oversampling variant mentioned in the prompt
        #[arg(long, short, value_parser = parse_variant)]
        variant: Option<Variant>,

        #[arg(long)]
        temperature: Option<f64>,

        #[arg(long)]
        max_tokens: Option<i64>,

        #[arg(long)]
        top_p: Option<f64>,

        #[arg(long)]
        frequency_penalty: Option<f64>,

        #[arg(long)]
        presence_penalty: Option<f64>,
    },

    /// List model artifacts and whether they load
    Models {
        /// Directory holding the model artifacts
        #[arg(long, env = "TOODU_MODELS_DIR", default_value = "server/models")]
        models_dir: PathBuf,
    },

    /// Evaluate an artifact against a labelled JSON-lines dataset
    Evaluate {
        #[arg(long, short, value_parser = parse_algorithm)]
        model: Algorithm,

        #[arg(long, short, default_value = "smote", value_parser = parse_variant)]
        variant: Variant,

        /// JSON-lines file, one {"features": {...}, "label": N} per line
        #[arg(long)]
        dataset: PathBuf,

        #[arg(long, env = "TOODU_MODELS_DIR", default_value = "server/models")]
        models_dir: PathBuf,
    },
}

fn parse_algorithm(s: &str) -> Result<Algorithm> {
    Algorithm::from_selector(s).ok_or_else(|| anyhow!("Model name '{}' is not supported.", s))
}

fn parse_variant(s: &str) -> Result<Variant> {
    Ok(s.parse::<Variant>()?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Health => {
            let client = client::ApiClient::new(&cli.api_url)?;
            status::show_health(&client, cli.format).await?;
        }
        Commands::Predict {
            model,
            variant,
            file,
            records,
        } => {
            let body = predict::request_body(file.as_deref(), &records)?;
            let client = client::ApiClient::new(&cli.api_url)?;
            predict::predict(&client, model, variant, &body, cli.format).await?;
        }
        Commands::Summarize {
            file,
            variant,
            temperature,
            max_tokens,
            top_p,
            frequency_penalty,
            presence_penalty,
        } => {
            let sampling = SamplingParams {
                temperature,
                max_tokens,
                top_p,
                frequency_penalty,
                presence_penalty,
            };
            let client = client::ApiClient::new(&cli.api_url)?;
            predict::summarize(&client, &file, variant, &sampling, cli.format).await?;
        }
        Commands::Models { models_dir } => {
            local::list_models(&models_dir, cli.format)?;
        }
        Commands::Evaluate {
            model,
            variant,
            dataset,
            models_dir,
        } => {
            let key = ModelKey::new(model, variant);
            local::evaluate_model(&models_dir, key, &dataset, cli.format)?;
        }
    }

    Ok(())
}
