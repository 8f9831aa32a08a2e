use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod engine;
mod engines;
mod error;
mod layout;
mod options;
mod preprocessing;
mod scratch;
mod server;

use preprocessing::{DarkVariant, NormalVariant};

#[derive(Parser, Debug)]
#[command(name = "abc-soup-server")]
#[command(about = "OCR server with adaptive document image normalization")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "OCR_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "OCR_PORT", default_value = "9292")]
    pub port: u16,

    /// Default OCR languages, joined by `+` (e.g., "eng+deu")
    #[arg(long, env = "DEFAULT_LANG", default_value = "eng+deu")]
    pub default_language: String,

    /// Maximum file size in bytes (default: 50MB)
    #[arg(long, env = "OCR_MAX_FILE_SIZE", default_value = "52428800")]
    pub max_file_size: usize,

    /// Tesseract executable
    #[arg(long, env = "TESSERACT_CMD", default_value = "tesseract")]
    pub tesseract_cmd: String,

    /// Path to tessdata directory (tesseract's own lookup if not set)
    #[arg(long, env = "TESSDATA_PREFIX")]
    pub tessdata_path: Option<String>,

    /// Directory for `save_intermediate` debug images
    #[arg(long, env = "OCR_INTERMEDIATE_DIR", default_value = "shared-assets")]
    pub intermediate_dir: PathBuf,

    /// Window side length of the darkest-patch brightness scan
    #[arg(long, env = "OCR_PATCH_SIZE", default_value = "3", value_parser = clap::value_parser!(u32).range(1..))]
    pub patch_size: u32,

    /// Enhancement for dark or bold-text images
    #[arg(long, env = "OCR_DARK_VARIANT", value_enum, default_value_t = DarkVariant::Clahe)]
    pub dark_variant: DarkVariant,

    /// Enhancement for mid-brightness images
    #[arg(long, env = "OCR_NORMAL_VARIANT", value_enum, default_value_t = NormalVariant::Clahe)]
    pub normal_variant: NormalVariant,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from(args);

    tracing::info!("Starting abc-soup-server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Binding to {}:{}", config.host, config.port);

    server::run(config).await
}
