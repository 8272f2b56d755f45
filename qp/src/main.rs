//! Question Plus - command-line front end
//!
//! Runs one transformation per invocation and prints the optimized prompt.

use std::fs;
use std::io::{self, BufRead, Write};

use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use tracing::{debug, info};

use questionplus::cli::{Cli, Command, get_log_path, interpret_answer, preset_value};
use questionplus::config::{Config, CredentialStatus};
use questionplus::options::{CustomOption, OptionSchema, SelectedValue};
use questionplus::prompts::PromptLoader;
use questionplus::session::TransformationSession;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(dir) = log_path.parent() {
        fs::create_dir_all(dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level).map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

fn print_offline_hint(config: &Config) {
    let reason = match config.credential_status() {
        CredentialStatus::Configured => return,
        CredentialStatus::Missing => "not set",
        CredentialStatus::Placeholder => "still the placeholder value",
    };
    eprintln!(
        "{} {} is {}; generating locally without the model",
        "offline:".yellow().bold(),
        config.llm.api_key_env,
        reason
    );
}

fn print_prompt(prompt: &str) {
    println!("{}", "Optimized prompt:".green().bold());
    println!("{}", prompt);
}

fn print_option(option: &CustomOption, current: &SelectedValue) {
    println!("\n{} {}", option.label.bold(), format!("({})", option.key).dimmed());
    if let Some(description) = &option.description {
        println!("  {}", description.dimmed());
    }
    for (i, value) in option.values.iter().enumerate() {
        let mut line = format!("  {:>2}. {}", i + 1, value.label);
        if option.recommended_value.as_deref() == Some(value.value.as_str()) {
            line.push_str(&format!(" {}", "[recommended]".cyan()));
        }
        if current.to_wire() == value.value {
            line.push_str(&format!(" {}", "<- current".yellow()));
        }
        println!("{}", line);
    }
    if let SelectedValue::Freeform(text) = current {
        println!("  current: {}", text.yellow());
    }
}

/// Read one answer: a listed number picks that value, anything else is free text
fn read_choice(option: &CustomOption, input: &mut impl BufRead) -> Result<Option<SelectedValue>> {
    print!("  choice [enter keeps current, other:<text> for free text]: ");
    io::stdout().flush().context("Failed to flush stdout")?;

    let mut line = String::new();
    if input.read_line(&mut line).context("Failed to read selection")? == 0 {
        return Ok(None);
    }
    Ok(interpret_answer(option, &line))
}

fn pick_options(session: &mut TransformationSession, schema: &OptionSchema) -> Result<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();

    for option in schema.iter() {
        loop {
            let current = session
                .state()
                .selections()
                .map(|s| s.get(&option.key).clone())
                .unwrap_or(SelectedValue::NotSpecified);
            print_option(option, &current);

            match read_choice(option, &mut input) {
                Ok(None) => break,
                Ok(Some(value)) => match session.select_option(&option.key, value) {
                    Ok(()) => break,
                    Err(e) => eprintln!("  {} {}", "✗".red(), e),
                },
                Err(e) => eprintln!("  {} {}", "✗".red(), e),
            }
        }
    }
    Ok(())
}

async fn cmd_ask(session: &mut TransformationSession, question: String) -> Result<()> {
    debug!("cmd_ask: called");
    session.set_question(question)?;
    let prompt = session
        .request_quick_generate()
        .await
        .context("Failed to generate prompt")?;
    print_prompt(&prompt);
    Ok(())
}

async fn cmd_customize(
    session: &mut TransformationSession,
    question: String,
    presets: Vec<(String, String)>,
    no_input: bool,
) -> Result<()> {
    debug!(preset_count = presets.len(), no_input, "cmd_customize: called");
    session.set_question(question)?;
    session
        .request_options_analysis()
        .await
        .context("Failed to analyze question")?;

    if let Some(analysis) = session.state().analysis() {
        println!("{} {}", "Persona:".bold(), analysis.persona);
        println!("{} {}", "Method:".bold(), analysis.method);
    }

    let schema = session
        .machine()
        .schema()
        .cloned()
        .ok_or_else(|| eyre!("Analysis returned no options"))?;

    for (key, value) in presets {
        let selected = preset_value(&schema, &key, &value).context(format!("Invalid --set {}={}", key, value))?;
        session
            .select_option(&key, selected)
            .context(format!("Invalid --set {}={}", key, value))?;
    }

    if !no_input {
        pick_options(session, &schema)?;
        println!();
    }

    let prompt = session
        .request_generate_with_options()
        .await
        .context("Failed to generate prompt")?;
    print_prompt(&prompt);
    Ok(())
}

fn cmd_templates(config: &Config) {
    debug!("cmd_templates: called");
    let loader = PromptLoader::new(config.prompts.dir.as_ref());
    for (name, source) in loader.template_sources() {
        println!("{:<20} {}", name.cyan(), source);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(provider = %config.llm.provider, model = %config.llm.model, "Question Plus loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Ask { question } => {
            print_offline_hint(&config);
            let mut session = TransformationSession::from_config(&config).context("Failed to start session")?;
            cmd_ask(&mut session, question).await
        }
        Command::Customize {
            question,
            set,
            no_input,
        } => {
            print_offline_hint(&config);
            let mut session = TransformationSession::from_config(&config).context("Failed to start session")?;
            cmd_customize(&mut session, question, set, no_input).await
        }
        Command::Templates => {
            cmd_templates(&config);
            Ok(())
        }
    }
}
