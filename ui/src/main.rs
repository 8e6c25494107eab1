use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use agent::{Agent, ConsolePrinter};
use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use comfy_table::Table;
use config::AppConfig;

/// Talk to the database assistant from the terminal.
#[derive(Debug, Parser)]
struct Args {
    #[arg(long)]
    config: Option<PathBuf>,
    /// YAML file with the database credentials
    #[arg(long)]
    credentials: Option<PathBuf>,
    /// Print every message sent to the model
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Quit,
    Help,
    Tables,
    Columns(&'a str),
    Ask(&'a str),
}

fn parse_command(line: &str) -> Command<'_> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix(':') else {
        return Command::Ask(line);
    };

    let (name, arg) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    match (name, arg.trim()) {
        ("q" | "quit" | "exit", _) => Command::Quit,
        ("tables", _) => Command::Tables,
        ("columns", table) if !table.is_empty() => Command::Columns(table),
        _ => Command::Help,
    }
}

fn single_column(header: &str, rows: impl IntoIterator<Item = String>) -> Table {
    let mut table = Table::new();
    table.set_header(vec![header]);
    for row in rows {
        table.add_row(vec![row]);
    }
    table
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

    cliclack::intro("tabletalk")?;

    let spinner = cliclack::spinner();
    spinner.start("Connecting...");
    let agent = match Agent::from_config(&conf, args.credentials.as_deref()).await {
        Ok(agent) => {
            spinner.stop("Connected");
            agent
        }
        Err(err) => {
            spinner.error(&err);
            return Err(err).context("could not start the agent");
        }
    };
    let agent = if args.verbose {
        agent.with_observer(Arc::new(ConsolePrinter))
    } else {
        agent
    };

    loop {
        let line: String = match cliclack::input("You")
            .placeholder("Ask a question, or :tables, :columns <table>, :quit")
            .interact()
        {
            Ok(line) => line,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => break,
            Err(err) => return Err(err.into()),
        };

        match parse_command(&line) {
            Command::Quit => break,
            Command::Help => {
                cliclack::log::info(":tables  list tables\n:columns <table>  list columns\n:quit  leave")?;
            }
            Command::Tables => match agent.toolbelt().connector().list_db_tables().await {
                Ok(tables) => {
                    let table = single_column("table", tables.lines().map(str::to_string));
                    println!("{table}");
                }
                Err(err) => cliclack::log::error(err)?,
            },
            Command::Columns(name) => {
                match agent.toolbelt().connector().get_table_columns(name).await {
                    Ok(columns) => println!("{}", single_column("column", columns)),
                    Err(err) => cliclack::log::error(err)?,
                }
            }
            Command::Ask(question) => {
                tracing::debug!(question, "asking");
                match agent.ask(question).await {
                    Ok(answer) => println!("\n{}\n{}\n", "[Assistant]".blue(), answer.blue()),
                    Err(err) => cliclack::log::error(err)?,
                }
            }
        }
    }

    cliclack::outro("Bye")?;
    Ok(())
}
