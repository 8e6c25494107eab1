mod page;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use agent::{Agent, ConsolePrinter};
use anyhow::Context;
use clap::Parser;
use config::AppConfig;
use tokio::net::TcpListener;
use tracing::info;

use server::{AppState, Echo, Responder};

/// Serve the database assistant as a single-page web form.
#[derive(Debug, Parser)]
struct Args {
    /// Config file, instead of ~/.config/tabletalk/config.toml
    #[arg(long)]
    config: Option<PathBuf>,
    /// YAML file with the database credentials
    #[arg(long)]
    credentials: Option<PathBuf>,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    /// Answer with the input text; no database or model needed
    #[arg(long)]
    echo: bool,
    /// Print every message sent to the model
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let conf = match &args.config {
        Some(path) => AppConfig::load_with_env(path)?,
        None => AppConfig::get_or_default(),
    };
    config::logging::init_logging(&conf.log_level);

    let responder: Arc<dyn Responder> = if args.echo {
        info!("running in echo mode");
        Arc::new(Echo)
    } else {
        let mut agent = Agent::from_config(&conf, args.credentials.as_deref())
            .await
            .context("could not start the agent")?;
        if args.verbose {
            agent = agent.with_observer(Arc::new(ConsolePrinter));
        }
        Arc::new(agent)
    };

    let app = server::router(AppState::new(responder));

    let host = args.host.unwrap_or(conf.server.host);
    let port = args.port.unwrap_or(conf.server.port);
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("could not bind {addr}"))?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
