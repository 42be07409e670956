use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use festival_forecast::api::{self, PredictResponse};
use festival_forecast::config::AppConfig;
use festival_forecast::ml::VisitorPredictor;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "festival-forecast")]
#[command(about = "Festival visitor prediction service - HTTP server or one-shot stdin mode")]
struct Args {
    /// Read one request JSON object from stdin, print the prediction and exit
    #[arg(long)]
    stdin: bool,

    /// Extra configuration file layered over the defaults
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout is reserved for the stdin-mode result
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .parse_lossy("festival_forecast=debug");

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config =
        AppConfig::load_with(args.config.as_deref()).context("Failed to load configuration")?;

    tracing::info!("Loading artifacts from {}", config.artifacts.dir.display());
    let predictor = VisitorPredictor::from_config(&config.artifacts)
        .context("Failed to load prediction artifacts")?;
    let predictor = Arc::new(predictor);

    if args.stdin {
        run_stdin(&predictor)
    } else {
        run_server(config, predictor)
    }
}

/// Answer a single request read from stdin
fn run_stdin(predictor: &VisitorPredictor) -> Result<()> {
    let mut body = Vec::new();
    std::io::stdin()
        .read_to_end(&mut body)
        .context("Failed to read request from stdin")?;

    let prediction = predictor.predict_json(&body)?;
    let response = PredictResponse {
        predicted_visitors: prediction.rounded(),
    };
    println!("{}", serde_json::to_string(&response)?);

    Ok(())
}

/// Serve HTTP until the process is stopped
fn run_server(config: AppConfig, predictor: Arc<VisitorPredictor>) -> Result<()> {
    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    rt.block_on(async {
        let address = config.server.bind_address();
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind {}", address))?;

        api::serve(listener, predictor).await.context("Server error")
    })
}
