//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::options::{CustomOption, OptionSchema, SchemaError, SelectedValue};

/// Question Plus - question to optimized prompt
#[derive(Parser)]
#[command(
    name = "qp",
    version,
    about = "Turn a rough question into an optimized LLM prompt",
    after_help = "Set ANTHROPIC_API_KEY to use the model; without it prompts are generated locally."
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Quick path: analyze and generate in one step
    Ask {
        /// The question to optimize
        question: String,
    },

    /// Detailed path: analyze, pick options, then generate
    Customize {
        /// The question to optimize
        question: String,

        /// Preset an option (key=value, key=other:<text>, or key=<free text>)
        #[arg(short, long = "set", value_name = "KEY=VALUE", value_parser = parse_set)]
        set: Vec<(String, String)>,

        /// Skip interactive selection; use defaults plus --set
        #[arg(long)]
        no_input: bool,
    },

    /// List prompt templates and where each resolves from
    Templates,
}

/// Parse a `key=value` pair; the value may itself contain `=`
pub fn parse_set(s: &str) -> Result<(String, String), String> {
    debug!(%s, "parse_set: called");
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Selection for a `--set key=value` preset
///
/// Free text that names none of the option's values becomes a free-form answer.
pub fn preset_value(schema: &OptionSchema, key: &str, value: &str) -> Result<SelectedValue, SchemaError> {
    let option = schema.get(key).ok_or_else(|| SchemaError::UnknownKey(key.to_string()))?;
    Ok(SelectedValue::from_input(option, value))
}

/// Selection for one interactive answer; `None` keeps the current value
///
/// A number within the menu picks that entry. Any other text, including a
/// number outside the menu, is interpreted like a preset value.
pub fn interpret_answer(option: &CustomOption, answer: &str) -> Option<SelectedValue> {
    let answer = answer.trim();
    if answer.is_empty() {
        return None;
    }
    let picked = answer
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| option.values.get(i));
    Some(match picked {
        Some(value) => SelectedValue::parse(&value.value),
        None => SelectedValue::from_input(option, answer),
    })
}

/// Get the path to the log file
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("questionplus")
        .join("logs")
        .join("questionplus.log")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OptionSelectionMap;
    use crate::options::schema::{keys, option_with_sentinels};

    #[test]
    fn test_parse_set() {
        assert_eq!(parse_set("tone=neutral").unwrap(), ("tone".to_string(), "neutral".to_string()));
        assert_eq!(
            parse_set("length=other:a=b").unwrap(),
            ("length".to_string(), "other:a=b".to_string())
        );
        assert!(parse_set("tone").is_err());
        assert!(parse_set("=x").is_err());
    }

    fn length_schema() -> OptionSchema {
        OptionSchema::validate(vec![
            option_with_sentinels(keys::LENGTH, "分量", "長さ", &[("short", "短め"), ("long", "長め")], None, None),
            option_with_sentinels(keys::TONE, "トーン", "トーン", &[("neutral", "中立")], None, None),
        ])
        .unwrap()
    }

    #[test]
    fn test_preset_value_free_text() {
        let schema = length_schema();

        assert_eq!(
            preset_value(&schema, keys::TONE, "皮肉まじりで").unwrap(),
            SelectedValue::freeform("皮肉まじりで")
        );
        assert_eq!(preset_value(&schema, keys::TONE, "neutral").unwrap(), SelectedValue::choice("neutral"));
        assert_eq!(
            preset_value(&schema, keys::LENGTH, "other:800字").unwrap(),
            SelectedValue::freeform("800字")
        );
        assert_eq!(
            preset_value(&schema, "color", "red"),
            Err(SchemaError::UnknownKey("color".to_string()))
        );

        let mut selections = OptionSelectionMap::initialize(&schema);
        let value = preset_value(&schema, keys::TONE, "皮肉まじりで").unwrap();
        assert!(selections.set(&schema, keys::TONE, value).is_ok());
    }

    #[test]
    fn test_interpret_answer() {
        let schema = length_schema();
        let length = schema.get(keys::LENGTH).unwrap();

        assert_eq!(interpret_answer(length, "  "), None);
        assert_eq!(interpret_answer(length, "1"), Some(SelectedValue::choice("short")));
        // Menu order: short, long, not_specified, other
        assert_eq!(interpret_answer(length, "3"), Some(SelectedValue::NotSpecified));
        assert_eq!(interpret_answer(length, "4"), Some(SelectedValue::Other));
        assert_eq!(interpret_answer(length, "800"), Some(SelectedValue::freeform("800")));
        assert_eq!(interpret_answer(length, "0"), Some(SelectedValue::freeform("0")));
        assert_eq!(interpret_answer(length, "other:3"), Some(SelectedValue::freeform("3")));
        assert_eq!(interpret_answer(length, "long"), Some(SelectedValue::choice("long")));
    }

    #[test]
    fn test_customize_args() {
        let cli = Cli::try_parse_from([
            "qp",
            "customize",
            "大学のレポートを書きたい",
            "--set",
            "length=other:800字",
            "--set",
            "tone=academic",
            "--no-input",
        ])
        .unwrap();

        let Command::Customize { question, set, no_input } = cli.command else {
            panic!("expected customize");
        };
        assert_eq!(question, "大学のレポートを書きたい");
        assert_eq!(set.len(), 2);
        assert_eq!(set[0].1, "other:800字");
        assert!(no_input);
    }

    #[test]
    fn test_global_log_level() {
        let cli = Cli::try_parse_from(["qp", "ask", "q", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }
}
