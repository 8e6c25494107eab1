use std::path::PathBuf;
use std::sync::Arc;

use agent::{Agent, ConsolePrinter};
use anyhow::Context;
use clap::Parser;
use config::AppConfig;

/// Ask the database a single question in plain language.
#[derive(Debug, Parser)]
#[command(name = "tabletalk")]
struct Args {
    /// The question, e.g. "how many users are on the DevOps journey?"
    #[arg(required = true, num_args = 1..)]
    question: Vec<String>,
    #[arg(long)]
    config: Option<PathBuf>,
    /// YAML file with the database credentials
    #[arg(long)]
    credentials: Option<PathBuf>,
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

    let mut agent = Agent::from_config(&conf, args.credentials.as_deref())
        .await
        .context("could not start the agent")?;
    if args.verbose {
        agent = agent.with_observer(Arc::new(ConsolePrinter));
    }

    let question = args.question.join(" ");
    tracing::info!(%question, "asking");
    let answer = agent.ask(&question).await?;
    println!("{answer}");

    Ok(())
}
