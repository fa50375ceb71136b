//! glimpse streaming server entry point.
//!
//! ```text
//! glimpse-server                     Stream with defaults
//! glimpse-server --config <path>    Use custom config TOML
//! glimpse-server --port 9000        Override the listen port
//! glimpse-server --gen-config       Dump default config and exit
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use glimpse_core::{
    FrameCodec, JpegCodec, ServerOptions, StreamServer, TestPatternSource, ZstdCodec,
};
use glimpse_server::capture::ScrapSource;
use glimpse_server::config::ServerConfig;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "glimpse-server", about = "glimpse screen-streaming server")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "glimpse-server.toml")]
    config: PathBuf,

    /// Listen address (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Listen port (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Stream a synthetic test pattern instead of the real screen.
    #[arg(long)]
    test_pattern: bool,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ServerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ServerConfig::load(&cli.config);
    if let Some(host) = cli.host {
        config.network.host = host;
    }
    if let Some(port) = cli.port {
        config.network.port = port;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("glimpse-server v{}", env!("CARGO_PKG_VERSION"));
    info!("host: {}", config.network.host);
    info!("port: {}", config.network.port);
    info!(
        "stream: {}x{} {} q{}",
        config.stream.width, config.stream.height, config.stream.codec, config.stream.quality
    );

    let source: Arc<dyn glimpse_core::FrameSource> = if cli.test_pattern {
        Arc::new(TestPatternSource::new(
            config.stream.width,
            config.stream.height,
        ))
    } else {
        Arc::new(ScrapSource::new(config.stream.display))
    };

    let codec: Arc<dyn FrameCodec> = match config.stream.codec.as_str() {
        "jpeg" => Arc::new(JpegCodec::new()),
        "zstd" => Arc::new(ZstdCodec::new()),
        other => return Err(format!("unknown codec {other:?} (expected jpeg or zstd)").into()),
    };

    let options = ServerOptions {
        stream_size: (config.stream.width, config.stream.height),
        quality: config.stream.quality,
        frame_interval: (config.stream.fps > 0)
            .then(|| Duration::from_secs_f64(1.0 / config.stream.fps as f64)),
        ..ServerOptions::default()
    };

    let mut server = StreamServer::bind(
        &config.network.host,
        config.network.port,
        source,
        codec,
        options,
    )
    .await?;
    let state = server.state();

    let accept_handle = server
        .start()
        .expect("freshly bound server starts exactly once");

    // Ctrl-C handler.
    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received, shutting down");
    state.set_running(false);
    accept_handle.abort();
    let _ = accept_handle.await;

    Ok(())
}
