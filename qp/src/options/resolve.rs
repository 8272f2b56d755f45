//! Turn selections into instruction fragments

use tracing::debug;

use super::schema::{CustomOption, NOT_SPECIFIED_LABEL, OTHER, OTHER_LABEL, OptionSchema, keys};
use super::selection::{OptionSelectionMap, SelectedValue};

/// Writing-style preset that asks for human-sounding prose
pub const NATURAL_STYLE: &str = "natural_ai";

const NATURAL_STYLE_NOTE: &str =
    "  【重要】人間らしい自然な文体で書くこと。完璧すぎる文章、機械的な表現、定型的なフレーズを避け、多少のゆらぎや個性を含めること。";

/// Resolve selections against a schema into ordered instruction fragments
///
/// Options are visited in schema order. Unspecified options contribute
/// nothing. The function is pure; the same inputs always give the same
/// fragments.
pub fn resolve(schema: &OptionSchema, selections: &OptionSelectionMap) -> Vec<String> {
    debug!(option_count = schema.len(), "resolve: called");
    schema
        .iter()
        .filter_map(|option| fragment(option, selections.get(&option.key)))
        .collect()
}

fn fragment(option: &CustomOption, selected: &SelectedValue) -> Option<String> {
    match selected {
        SelectedValue::NotSpecified => None,
        SelectedValue::Choice(token) => {
            let label = option.label_for(token).unwrap_or(token);
            if label == NOT_SPECIFIED_LABEL {
                return None;
            }
            let mut line = generic(option, label);
            if option.key == keys::WRITING_STYLE && token == NATURAL_STYLE {
                line.push('\n');
                line.push_str(NATURAL_STYLE_NOTE);
            }
            Some(line)
        }
        SelectedValue::Freeform(text) if !text.is_empty() => {
            if option.key == keys::LENGTH {
                Some(length_limit(text))
            } else {
                Some(generic(option, text))
            }
        }
        // Literal `other`, or `other:` with nothing after it
        SelectedValue::Other | SelectedValue::Freeform(_) => {
            Some(generic(option, option.label_for(OTHER).unwrap_or(OTHER_LABEL)))
        }
    }
}

fn generic(option: &CustomOption, value_label: &str) -> String {
    format!("- {}: {}", option.label, value_label)
}

fn length_limit(text: &str) -> String {
    format!(
        "- 文字数制限: {}\n  【厳守】必ず指定された文字数を守ること。文字数を数えながら執筆し、超過も不足も許されない。",
        text
    )
}
