//! glimpse stream viewer entry point.
//!
//! ```text
//! glimpse-viewer                          Connect to 127.0.0.1:9999
//! glimpse-viewer --server 10.0.0.5:9999   Connect elsewhere
//! glimpse-viewer --graphics halfblocks    Force a render protocol
//! glimpse-viewer --gen-config             Dump default config and exit
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use glimpse_core::{ClientOptions, FrameCodec, JpegCodec, StreamClient, ZstdCodec};
use glimpse_viewer::config::ViewerConfig;
use glimpse_viewer::sink::TerminalSink;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "glimpse-viewer", about = "glimpse screen-streaming viewer")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "glimpse-viewer.toml")]
    config: PathBuf,

    /// Server to connect to, as host:port (overrides config).
    #[arg(short, long)]
    server: Option<String>,

    /// Terminal graphics protocol (overrides config): auto, sixel,
    /// kitty, iterm2 or halfblocks.
    #[arg(long)]
    graphics: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ViewerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ViewerConfig::load(&cli.config);
    if let Some(server) = cli.server {
        let (host, port) = server
            .rsplit_once(':')
            .ok_or("expected --server as host:port")?;
        config.network.host = host.to_string();
        config.network.port = port.parse()?;
    }
    if let Some(graphics) = cli.graphics {
        config.display.graphics = graphics;
    }

    // Logs go to stderr: stdout belongs to the terminal UI.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let codec: Arc<dyn FrameCodec> = match config.stream.codec.as_str() {
        "jpeg" => Arc::new(JpegCodec::new()),
        "zstd" => Arc::new(ZstdCodec::new()),
        other => return Err(format!("unknown codec {other:?} (expected jpeg or zstd)").into()),
    };

    // Connect before taking over the terminal, so a refused
    // connection prints a plain error instead of a blank screen.
    let mut client = StreamClient::connect(
        &config.network.host,
        config.network.port,
        codec,
        ClientOptions::default(),
    )
    .await?;
    let title = format!("glimpse {}:{}", config.network.host, config.network.port);

    let mut sink = TerminalSink::new(&config.display.graphics)?;
    info!("rendering with {:?}", sink.protocol_type());

    let result = client.run(&mut sink).await;
    drop(sink); // restore the terminal before printing anything

    match result {
        Ok(()) => {
            println!("{title}: stopped");
            Ok(())
        }
        Err(e) if e.is_disconnect() => {
            println!("{title}: server closed the stream");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
