use std::{path::PathBuf, process::ExitCode, time::Instant};

use clap::Parser;
use ocrlens::{config::PipelineConfig, BoxError, PipelineBuilder, ReplayRecognizer};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

/// Annotate an image with previously recognized text regions.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// JPEG or PNG image
    image: PathBuf,
    /// JSON list of `{ "region": [[x, y], ...], "text": ..., "confidence": ... }`
    #[arg(long)]
    detections: PathBuf,
    /// Pipeline configuration in TOML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Content type to declare for the image, guessed from the extension if unset
    #[arg(long)]
    content_type: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("ocrlens: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode, BoxError> {
    let config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    let recognizer = ReplayRecognizer::load(&args.detections)?;
    let pipeline = PipelineBuilder::from_config(&config)
        .recognizer(recognizer)
        .build()?;

    let bytes = std::fs::read(&args.image)?;
    let content_type = args
        .content_type
        .unwrap_or_else(|| guess_content_type(&args.image).to_string());

    let start = Instant::now();
    let outcome = pipeline.process(&bytes, &content_type).await;
    log::debug!("{:?}", start.elapsed());

    let stdout = std::io::stdout().lock();
    match outcome {
        Ok(result) => {
            serde_json::to_writer_pretty(stdout, &result)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            serde_json::to_writer_pretty(stdout, &failure)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

fn guess_content_type(path: &std::path::Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}
