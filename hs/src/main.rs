use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;

use historystore::cli::{Cli, Command};
use historystore::config::Config;
use historystore::{HistoryEntry, HistoryStore};

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();
    Ok(())
}

fn first_line(text: &str, max_chars: usize) -> String {
    let line = text.lines().next().unwrap_or("");
    if line.chars().count() > max_chars {
        format!("{}…", line.chars().take(max_chars).collect::<String>())
    } else {
        line.to_string()
    }
}

fn print_summary(entry: &HistoryEntry) {
    println!(
        "{} {} {}",
        entry.id.yellow(),
        entry.created_date.format("%Y-%m-%d %H:%M").to_string().dimmed(),
        first_line(&entry.original_question, 60)
    );
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    let store_path = cli.dir.unwrap_or(config.store_path);

    info!("historystore starting at {}", store_path.display());
    let store = HistoryStore::open(&store_path)?;

    match cli.command {
        Command::List { limit } => {
            let entries = store.list()?;
            if entries.is_empty() {
                println!("No history yet");
            } else {
                for entry in entries.iter().take(limit.unwrap_or(config.list_limit)) {
                    print_summary(entry);
                }
            }
        }
        Command::Search { query } => {
            let entries = store.search(&query)?;
            if entries.is_empty() {
                println!("No matches for {}", query.cyan());
            } else {
                for entry in &entries {
                    print_summary(entry);
                }
            }
        }
        Command::Show { id, prompt_only } => {
            let entry = store.get(&id)?.ok_or_else(|| eyre!("No history record with id {}", id))?;
            if prompt_only {
                println!("{}", entry.optimized_prompt);
            } else {
                println!("{} {}", "ID:".bold(), entry.id);
                println!("{} {}", "Created:".bold(), entry.created_date.to_rfc3339());
                println!("{} {}", "Persona:".bold(), entry.persona);
                println!("{} {}", "Method:".bold(), entry.method);
                if !entry.options.is_empty() {
                    println!("{}", "Options:".bold());
                    for (key, value) in &entry.options {
                        println!("  {} = {}", key.cyan(), value);
                    }
                }
                println!("\n{}\n{}", "Question:".bold(), entry.original_question);
                println!("\n{}\n{}", "Optimized prompt:".bold(), entry.optimized_prompt);
            }
        }
        Command::Delete { id } => {
            if store.delete(&id)? {
                println!("{} Deleted record: {}", "✓".green(), id);
            } else {
                return Err(eyre!("No history record with id {}", id));
            }
        }
    }

    Ok(())
}
