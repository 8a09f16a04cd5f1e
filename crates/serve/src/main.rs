use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tutorial_serve::{ServeConfig, DEFAULT_PORT};

#[derive(Parser, Debug)]
#[command(name = "tutorial-serve")]
#[command(about = "Serve the tutorial example pages")]
#[command(version)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "TUTORIAL_SERVE_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Interface to bind
    #[arg(long, env = "TUTORIAL_SERVE_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Directory containing the example site
    #[arg(short, long, env = "TUTORIAL_SERVE_ROOT", default_value = "tutorial")]
    root: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = ServeConfig {
        host: cli.host,
        port: cli.port,
        root: cli.root,
    };

    tutorial_serve::serve(config).await
}
