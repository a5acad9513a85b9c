use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use larder_core::ExtractorConfig;
use larder_ocr::{ExtractionResult, IngredientExtractor, OcrBackend};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "larder", version, about = "List the grocery ingredients on receipt photos")]
struct Cli {
    /// Config file. Defaults to larder.toml in the platform config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Vocabulary TOML replacing the builtin ingredient list.
    #[arg(long, global = true)]
    vocabulary: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// OCR receipt images and extract ingredients.
    Scan {
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Extract ingredients from text files holding OCR output.
    Text {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Serialize)]
struct Report<'a> {
    path: &'a Path,
    #[serde(flatten)]
    result: &'a ExtractionResult,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(path) = cli.vocabulary {
        config.vocabulary_path = Some(path);
    }

    let extractor = IngredientExtractor::from_config(backend(&config), &config)
        .context("Failed to load vocabulary")?;
    tracing::debug!(
        ingredients = extractor.vocabulary().ingredient_count(),
        "Vocabulary ready"
    );

    let results = match cli.command {
        Command::Scan { images } => Arc::new(extractor).process_batch(images).await,
        Command::Text { files } => files
            .into_iter()
            .map(|path| {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let result = extractor.extract_text(&text);
                Ok((path, result))
            })
            .collect::<Result<Vec<_>>>()?,
    };

    if cli.json {
        let reports: Vec<Report<'_>> = results
            .iter()
            .map(|(path, result)| Report { path, result })
            .collect();
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for (path, result) in &results {
            println!("{} ({})", path.display(), result.pass);
            if result.ingredients.is_empty() {
                println!("  (no ingredients found)");
            }
            for name in &result.ingredients {
                println!("  {name}");
            }
        }
    }
    Ok(())
}

/// Explicit `--config`, else the platform config file if present, else defaults.
fn load_config(explicit: Option<&Path>) -> Result<ExtractorConfig> {
    if let Some(path) = explicit {
        return ExtractorConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }

    let default_path = directories::ProjectDirs::from("com", "larder", "Larder")
        .map(|dirs| dirs.config_dir().join("larder.toml"));
    match default_path {
        Some(path) if path.is_file() => {
            tracing::info!("Using config {}", path.display());
            ExtractorConfig::load(&path)
                .with_context(|| format!("Failed to load config {}", path.display()))
        }
        _ => Ok(ExtractorConfig::default()),
    }
}

#[cfg(feature = "tesseract")]
fn backend(config: &ExtractorConfig) -> impl OcrBackend + 'static {
    larder_ocr::TesseractRecognizer::new(config.recognition.data_path.clone())
}

#[cfg(not(feature = "tesseract"))]
fn backend(_config: &ExtractorConfig) -> impl OcrBackend + 'static {
    tracing::warn!("Built without the `tesseract` feature; image scans will find no text");
    larder_ocr::UnavailableRecognizer
}
