//! ocrdesk command-line interface.
//!
//! Runs OCR batches, browses history and statistics, exports text and
//! starts the HTTP API.

mod history_cmd;
mod recognize_cmd;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ocrdesk::cache::ContentCache;
use ocrdesk::core::io::write_atomic;
use ocrdesk::{AppState, ExportFormat, LanguageCatalog, OcrDeskConfig, QualityLevel, StatsTracker, compare_results};
use tracing_subscriber::EnvFilter;

use history_cmd::HistoryCommands;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;

#[derive(Parser)]
#[command(name = "ocrdesk")]
#[command(about = "Local OCR pipeline with caching, history and statistics")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML or JSON). Defaults to a discovered ocrdesk.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Address to bind (env OCRDESK_HOST)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind (env OCRDESK_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Recognize text in one or more images
    Recognize {
        /// Image files (png, jpg, jpeg, pdf)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Language code, e.g. en, de, ja
        #[arg(short, long)]
        language: Option<String>,

        /// Recognition quality: low, medium or high
        #[arg(short, long)]
        quality: Option<QualityLevel>,

        /// Send the original bytes without downscaling
        #[arg(long)]
        no_optimize: bool,

        /// Skip cache lookups (results are still cached)
        #[arg(long)]
        no_cache: bool,

        /// Process one image at a time
        #[arg(long)]
        sequential: bool,

        /// Append successful results to history
        #[arg(long)]
        save: bool,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Browse and edit recognition history
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },

    /// Show processing statistics
    Stats {
        /// Reset all counters to zero
        #[arg(long)]
        reset: bool,
    },

    /// Cache maintenance
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Export a text file as txt or pdf
    Export {
        /// UTF-8 text file to export
        input: PathBuf,

        #[arg(short, long, default_value = "pdf")]
        format: ExportFormat,

        /// Output path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List supported languages
    Languages,

    /// Compare the words of two text files
    Compare { first: PathBuf, second: PathBuf },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Show cache size
    Stats,
    /// Remove every cached result
    Clear,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<OcrDeskConfig> {
    OcrDeskConfig::load(path).context("Failed to load configuration")
}

fn resolve_bind(host: Option<String>, port: Option<u16>) -> Result<(String, u16)> {
    let host = host
        .or_else(|| std::env::var("OCRDESK_HOST").ok())
        .unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = match port {
        Some(port) => port,
        None => match std::env::var("OCRDESK_PORT") {
            Ok(value) => value
                .trim()
                .parse()
                .with_context(|| format!("Invalid OCRDESK_PORT '{}'", value))?,
            Err(_) => DEFAULT_PORT,
        },
    };

    Ok((host, port))
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Serve { host, port } => {
            let (host, port) = resolve_bind(host, port)?;
            let config = load_config(config_path)?;
            let state = Arc::new(AppState::load(config)?);
            let limits = ocrdesk::api::parse_size_limits_from_env();
            ocrdesk::api::serve_with_state(host, port, state, limits).await?;
        }
        Commands::Recognize {
            files,
            language,
            quality,
            no_optimize,
            no_cache,
            sequential,
            save,
            format,
        } => {
            let config = load_config(config_path)?;
            let mut settings = config.processing.batch_settings();
            if let Some(language) = language {
                settings.language = language;
            }
            if let Some(quality) = quality {
                settings.quality = quality;
            }
            settings.optimize &= !no_optimize;
            settings.use_cache &= !no_cache;
            settings.parallel &= !sequential;

            let state = AppState::load(config)?;
            recognize_cmd::run(&state, files, settings, save, format).await?;
        }
        Commands::History { command } => {
            let config = load_config(config_path)?;
            history_cmd::run(&config, command)?;
        }
        Commands::Stats { reset } => {
            let config = load_config(config_path)?;
            let stats = StatsTracker::open(config.storage.stats_path());
            if reset {
                stats.reset()?;
                eprintln!("Statistics reset");
            }
            println!("{}", serde_json::to_string_pretty(&stats.snapshot())?);
        }
        Commands::Cache { command } => {
            let config = load_config(config_path)?;
            let cache = ContentCache::new(config.storage.cache_dir())?;
            match command {
                CacheCommands::Stats => {
                    let stats = cache.stats()?;
                    println!("Directory: {}", cache.cache_dir().display());
                    println!("Files:     {}", stats.total_files);
                    println!("Size:      {:.2} MB", stats.total_size_mb);
                }
                CacheCommands::Clear => {
                    let cleared = cache.clear()?;
                    println!(
                        "Removed {} file(s), freed {:.2} MB",
                        cleared.removed_files, cleared.freed_mb
                    );
                }
            }
        }
        Commands::Export { input, format, output } => {
            let text = read_text(&input)?;
            let bytes = ocrdesk::export::export(&text, format)?;
            write_atomic(&output, &bytes)?;
            eprintln!("Wrote {} ({} bytes)", output.display(), bytes.len());
        }
        Commands::Languages => {
            let config = load_config(config_path)?;
            let catalog = match &config.ocr.catalog_url {
                Some(url) => LanguageCatalog::fetch(url, config.ocr.timeout()).await,
                None => LanguageCatalog::builtin(),
            };
            for (code, name) in &catalog.languages {
                println!("{:<8}{}", code, name);
            }
        }
        Commands::Compare { first, second } => {
            let comparison = compare_results(&read_text(&first)?, &read_text(&second)?);
            println!("{}", serde_json::to_string_pretty(&comparison)?);
        }
    }

    Ok(())
}
