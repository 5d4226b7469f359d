//! Cardex command-line client
//!
//! Thin wrapper over the card extractor HTTP API.

use anyhow::Result;
use clap::{ArgGroup, Args, Parser, Subcommand};
use reqwest::Client;
use serde_json::Value;
use std::process::ExitCode;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cardex_models::{BatchRequest, DEFAULT_CONCURRENCY, DEFAULT_MAX_FILES};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Parser, Debug)]
#[command(name = "cardex", version)]
#[command(about = "Extract contact data from business card images")]
struct Cli {
    /// Base URL of the card extractor service
    #[arg(long, default_value = "http://localhost:8000")]
    base_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process a folder of business card images
    Batch(BatchArgs),
    /// List the default and allowed models
    Models,
}

#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("source")
        .required(true)
        .args(["drive_folder_id", "local_folder"])
))]
struct BatchArgs {
    /// Google Drive folder ID
    #[arg(long)]
    drive_folder_id: Option<String>,

    /// Local folder path
    #[arg(long)]
    local_folder: Option<String>,

    /// Include Drive sub-folders (local folders are always walked recursively)
    #[arg(long)]
    recursive: bool,

    /// Google Sheets spreadsheet ID
    #[arg(long)]
    sheet_id: Option<String>,

    /// Sheet tab name
    #[arg(long)]
    sheet_name: Option<String>,

    /// Model override; must be in the server's allow-list
    #[arg(long)]
    model: Option<String>,

    /// Maximum number of files to process
    #[arg(long, default_value_t = DEFAULT_MAX_FILES)]
    max_files: u32,

    /// Number of files extracted in parallel (1-20)
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY,
          value_parser = clap::value_parser!(u32).range(1..=20))]
    concurrency: u32,

    /// Skip writing to Google Sheets
    #[arg(long)]
    dry_run: bool,
}

impl From<BatchArgs> for BatchRequest {
    fn from(args: BatchArgs) -> Self {
        Self {
            drive_folder_id: args.drive_folder_id,
            local_folder_path: args.local_folder,
            recursive: args.recursive,
            sheet_id: args.sheet_id,
            sheet_name: args.sheet_name,
            dry_run: args.dry_run,
            max_files: args.max_files,
            concurrency: args.concurrency,
            model: args.model,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse()).await
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    let base_url = cli.base_url.trim_end_matches('/');

    let response = match cli.command {
        Command::Batch(args) => {
            let request = BatchRequest::from(args);
            debug!(?request, "posting_batch");
            client
                .post(format!("{}/batch/folder", base_url))
                .json(&request)
                .send()
                .await?
        }
        Command::Models => client.get(format!("{}/models", base_url)).send().await?,
    };

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        eprintln!("Error {}: {}", status.as_u16(), body);
        return Ok(ExitCode::FAILURE);
    }

    println!("{}", pretty_json(body));
    Ok(ExitCode::SUCCESS)
}

/// Pretty-print a JSON body, passing anything else through untouched.
fn pretty_json(body: String) -> String {
    serde_json::from_str::<Value>(&body)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or(body)
}
