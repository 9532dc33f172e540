//! series-a-digest: weekly Series A funding memo, narrated and emailed.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use series_a_digest::artifacts::OutputDir;
use series_a_digest::config::{Config, Secrets};
use series_a_digest::delivery::{DeliveryClient, InteractiveAuthorizer};
use series_a_digest::discovery::DiscoveryClient;
use series_a_digest::model::Query;
use series_a_digest::narrator::Narrator;
use series_a_digest::pipeline::{Outcome, Pipeline, RunReport};
use series_a_digest::summarizer::MemoGenerator;
use series_a_digest::Result;

#[derive(Parser, Debug)]
#[command(
    name = "series-a-digest",
    about = "Discover Series A companies, summarize, narrate and email the memo"
)]
struct Args {
    /// Path to a YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for discovery.json, memo.txt and memo.mp3
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Override the discovery search text
    #[arg(short, long)]
    query: Option<String>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging (suppress noisy HTTP internals)
    let filter = if args.verbose {
        EnvFilter::new("debug,hyper=info,reqwest=info")
    } else {
        EnvFilter::new("info,hyper=warn,reqwest=warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(report) => {
            print_report(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Pipeline failed: {e}");
            eprintln!("error: {}: {e}", e.kind());
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<RunReport> {
    let config = Config::load(args.config.as_deref());
    let secrets = Secrets::from_env()?;
    info!("Secrets loaded: {secrets:?}");

    let output = OutputDir::new(args.output_dir.unwrap_or_else(|| config.output_dir.clone()));
    let query = Query::from_config(&config.discovery, args.query.as_deref());

    let authorizer = InteractiveAuthorizer::new(
        &config.delivery.credentials_path,
        &config.delivery.auth_uri,
        &config.delivery.token_uri,
    );

    let pipeline = Pipeline {
        discovery: DiscoveryClient::new(&config.discovery, &secrets.discovery_api_key)?,
        summarizer: MemoGenerator::new(&config.summarizer, &secrets.discovery_api_key)?,
        narrator: Narrator::new(&config.narrator, &secrets.speech_api_key)?,
        delivery: DeliveryClient::new(&config.delivery, &secrets.sender_email, Box::new(authorizer))?,
        output,
        voice_id: secrets.voice_id.clone(),
        recipient: secrets.recipient_email.clone(),
    };

    pipeline.run(&query).await
}

fn print_report(report: &RunReport) {
    println!("Discovery JSON: {}", report.discovery_path.display());
    if let Some(memo) = &report.memo_path {
        println!("Text memo:      {}", memo.display());
    }
    if let Some(audio) = &report.audio_path {
        println!("Audio file:     {}", audio.display());
    }
    match &report.outcome {
        Outcome::Delivered(receipt) => match &receipt.message_id {
            Some(id) => println!("Email sent to {} (id {id})", receipt.recipient),
            None => println!("Email sent to {}", receipt.recipient),
        },
        Outcome::NoResults => println!("No companies found; nothing was sent"),
    }
}
