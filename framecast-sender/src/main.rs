//! framecast entry point.
//!
//! ```text
//! framecast                  Stream with ./framecast.toml (or defaults)
//! framecast --config <path>  Load a custom config TOML
//! framecast --url <url>      Override the collector URL
//! framecast --gen-config     Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use framecast_sender::config::SenderConfig;
use framecast_sender::service::SenderService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "framecast", about = "Stream the screen as JPEG frames over HTTP")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "framecast.toml")]
    config: PathBuf,

    /// Collector URL, overriding the config file.
    #[arg(short, long)]
    url: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&SenderConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config. A malformed file aborts here, before any capture.
    let mut config = SenderConfig::try_load(&cli.config)?;
    if let Some(url) = cli.url {
        config.upload.url = url;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("framecast v{}", env!("CARGO_PKG_VERSION"));
    if cli.config.is_file() {
        info!("config: {}", cli.config.display());
    } else {
        info!("no config at {}; using defaults", cli.config.display());
    }
    info!("collector: {}", config.upload.url);
    info!("target FPS: {}", config.screen.fps);
    info!("JPEG quality: {}", config.screen.quality);
    info!("buffer depth: {}", config.pipeline.buffer_depth);

    let service = SenderService::new(config);
    println!("Press Enter to stop capture...");
    let report = service.run()?;

    println!("Screen capture stopped: {report}");
    Ok(())
}
