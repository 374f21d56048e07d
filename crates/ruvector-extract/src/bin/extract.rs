//! Command-line text extraction
//!
//! Run with: cargo run -p ruvector-extract --features cli -- <FILE>

use anyhow::Context;
use clap::Parser;
use ruvector_extract::{ExtractionConfig, ExtractionOutput, ExtractionRouter, ValidationMode};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ruvector-extract", version, about = "Extract plain text from documents")]
struct Args {
    /// Document to extract
    #[arg(required_unless_present = "formats")]
    file: Option<PathBuf>,

    /// Declared content type (guessed from the extension when omitted)
    #[arg(short = 't', long)]
    content_type: Option<String>,

    /// Cross-check extension, declared type and file content
    #[arg(long)]
    validate: bool,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// List supported formats and exit
    #[arg(long)]
    formats: bool,

    /// Print extraction statistics as JSON to stderr after extracting
    #[arg(long)]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ruvector_extract=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ExtractionConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ExtractionConfig::default(),
    };
    if args.validate {
        config.validation = ValidationMode::Always;
    }
    let router = ExtractionRouter::new(config)?;

    if args.formats {
        for info in router.formats() {
            println!(
                "{:<28} {:<74} .{}",
                info.name,
                info.content_type,
                info.extensions.join(", .")
            );
        }
        return Ok(ExitCode::SUCCESS);
    }

    let Some(path) = args.file else {
        anyhow::bail!("No input file given");
    };
    let data = std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let content_type = match args.content_type {
        Some(content_type) => content_type,
        None => mime_guess::from_path(&path)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string(),
    };
    tracing::debug!("Extracting {} as {}", path.display(), content_type);

    let result = if args.validate {
        router
            .extract_with_validation(data, &content_type, &filename)
            .await
    } else {
        router.extract(data, &content_type).await
    };

    let code = match result {
        Ok(ExtractionOutput::Complete(text)) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Ok(ExtractionOutput::Partial { text, error }) => {
            println!("{}", text);
            eprintln!("Warning: output is incomplete. {}", error.user_message());
            eprintln!("  {}", error.technical_detail());
            ExitCode::from(2)
        }
        Err(error) => {
            eprintln!("Error: {}", error.user_message());
            eprintln!("  {}", error.technical_detail());
            ExitCode::FAILURE
        }
    };

    if args.stats {
        eprintln!("{}", serde_json::to_string_pretty(&router.stats())?);
    }

    Ok(code)
}
