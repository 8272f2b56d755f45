//! Option schema types and validation
//!
//! Option schemas come back from the model, so they are untrusted input.
//! [`OptionSchema`] can only be built through [`OptionSchema::validate`]
//! (serde goes through it too); anything structurally off is rejected
//! rather than patched up.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Sentinel value token meaning "no preference"
pub const NOT_SPECIFIED: &str = "not_specified";

/// Sentinel value token meaning "freeform, see attached text"
pub const OTHER: &str = "other";

/// Display label of the "no preference" sentinel
pub const NOT_SPECIFIED_LABEL: &str = "指定しない";

/// Display label of the freeform sentinel
pub const OTHER_LABEL: &str = "その他";

/// Option keys with special handling
pub mod keys {
    pub const LOGIC_STRUCTURE: &str = "logic_structure";
    pub const WRITING_STYLE: &str = "writing_style";
    pub const TONE: &str = "tone";
    pub const TARGET_READER: &str = "target_reader";
    pub const LENGTH: &str = "length";
}

/// Errors raised by schema validation and selection edits
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("option schema has no options")]
    Empty,

    #[error("custom options must be a list")]
    NotAList,

    #[error("option #{index} is malformed: {reason}")]
    Malformed { index: usize, reason: String },

    #[error("option has an empty key")]
    EmptyKey,

    #[error("duplicate option key: {0}")]
    DuplicateKey(String),

    #[error("option '{key}' has no values")]
    NoValues { key: String },

    #[error("option '{key}' is missing the '{sentinel}' value")]
    MissingSentinel { key: String, sentinel: &'static str },

    #[error("option '{key}' default '{value}' is not one of its values")]
    DanglingDefault { key: String, value: String },

    #[error("option '{key}' recommended '{value}' is not one of its values")]
    DanglingRecommended { key: String, value: String },

    #[error("unknown option key: {0}")]
    UnknownKey(String),

    #[error("option '{key}' has no value '{value}'")]
    UnknownValue { key: String, value: String },
}

/// One selectable value of an option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionValue {
    pub value: String,
    pub label: String,
}

impl OptionValue {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// One customization option offered for a question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomOption {
    pub key: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub values: Vec<OptionValue>,
    #[serde(rename = "default", default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(rename = "recommended", default, skip_serializing_if = "Option::is_none")]
    pub recommended_value: Option<String>,
}

impl CustomOption {
    /// The entry for a value token, if the option offers it
    pub fn value(&self, token: &str) -> Option<&OptionValue> {
        self.values.iter().find(|v| v.value == token)
    }

    /// Display label for a value token
    pub fn label_for(&self, token: &str) -> Option<&str> {
        self.value(token).map(|v| v.label.as_str())
    }

    pub fn has_value(&self, token: &str) -> bool {
        self.value(token).is_some()
    }

    /// A default/recommended reference is valid if it names a value or is the generic `other`
    fn references_value(&self, token: &str) -> bool {
        token == OTHER || self.has_value(token)
    }

    fn check(&self) -> Result<(), SchemaError> {
        if self.key.trim().is_empty() {
            return Err(SchemaError::EmptyKey);
        }
        if self.values.is_empty() {
            return Err(SchemaError::NoValues { key: self.key.clone() });
        }
        for sentinel in [NOT_SPECIFIED, OTHER] {
            if !self.has_value(sentinel) {
                return Err(SchemaError::MissingSentinel {
                    key: self.key.clone(),
                    sentinel,
                });
            }
        }
        if let Some(value) = self.default_value.as_deref().filter(|v| !self.references_value(v)) {
            return Err(SchemaError::DanglingDefault {
                key: self.key.clone(),
                value: value.to_string(),
            });
        }
        if let Some(value) = self.recommended_value.as_deref().filter(|v| !self.references_value(v)) {
            return Err(SchemaError::DanglingRecommended {
                key: self.key.clone(),
                value: value.to_string(),
            });
        }
        Ok(())
    }
}

/// A validated, ordered list of customization options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CustomOption>", into = "Vec<CustomOption>")]
pub struct OptionSchema(Vec<CustomOption>);

impl OptionSchema {
    /// Decode untyped options, then validate them
    ///
    /// Each entry is decoded on its own so a structural defect is reported
    /// as a schema error naming the entry rather than as unreadable JSON.
    pub fn from_json(raw: serde_json::Value) -> Result<Self, SchemaError> {
        let serde_json::Value::Array(items) = raw else {
            return Err(SchemaError::NotAList);
        };
        let options = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                serde_json::from_value::<CustomOption>(item).map_err(|e| SchemaError::Malformed {
                    index,
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::validate(options)
    }

    /// Validate raw options into a schema
    ///
    /// Rejects an empty list, duplicate keys, options without values or
    /// without both sentinels, and dangling default/recommended references.
    pub fn validate(options: Vec<CustomOption>) -> Result<Self, SchemaError> {
        debug!(option_count = options.len(), "OptionSchema::validate: called");
        if options.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut seen = HashSet::new();
        for option in &options {
            option.check()?;
            if !seen.insert(option.key.as_str()) {
                return Err(SchemaError::DuplicateKey(option.key.clone()));
            }
        }

        Ok(Self(options))
    }

    pub fn options(&self) -> &[CustomOption] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &CustomOption> {
        self.0.iter()
    }

    pub fn get(&self, key: &str) -> Option<&CustomOption> {
        self.0.iter().find(|o| o.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<CustomOption>> for OptionSchema {
    type Error = SchemaError;

    fn try_from(options: Vec<CustomOption>) -> Result<Self, Self::Error> {
        Self::validate(options)
    }
}

impl From<OptionSchema> for Vec<CustomOption> {
    fn from(schema: OptionSchema) -> Self {
        schema.0
    }
}

/// Test and fallback helper: an option with the two sentinels appended
pub(crate) fn option_with_sentinels(
    key: &str,
    label: &str,
    description: &str,
    values: &[(&str, &str)],
    default_value: Option<&str>,
    recommended_value: Option<&str>,
) -> CustomOption {
    let mut entries: Vec<OptionValue> = values.iter().map(|(v, l)| OptionValue::new(*v, *l)).collect();
    entries.push(OptionValue::new(NOT_SPECIFIED, NOT_SPECIFIED_LABEL));
    entries.push(OptionValue::new(OTHER, OTHER_LABEL));
    CustomOption {
        key: key.to_string(),
        label: label.to_string(),
        description: Some(description.to_string()),
        values: entries,
        default_value: default_value.map(str::to_string),
        recommended_value: recommended_value.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone() -> CustomOption {
        option_with_sentinels(
            keys::TONE,
            "トーン",
            "どんなトーンで説明するか",
            &[("friendly", "優しい"), ("neutral", "中立")],
            Some(NOT_SPECIFIED),
            None,
        )
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        let schema = OptionSchema::validate(vec![tone()]).unwrap();
        assert_eq!(schema.len(), 1);
        assert!(schema.contains(keys::TONE));
        assert_eq!(schema.get(keys::TONE).unwrap().label_for("neutral"), Some("中立"));
    }

    #[test]
    fn test_validate_rejects_empty() {
        assert_eq!(OptionSchema::validate(vec![]), Err(SchemaError::Empty));
    }

    #[test]
    fn test_validate_rejects_duplicate_key() {
        let result = OptionSchema::validate(vec![tone(), tone()]);
        assert_eq!(result, Err(SchemaError::DuplicateKey("tone".to_string())));
    }

    #[test]
    fn test_validate_rejects_missing_values() {
        let mut option = tone();
        option.values.clear();
        option.default_value = None;
        assert_eq!(
            OptionSchema::validate(vec![option]),
            Err(SchemaError::NoValues { key: "tone".to_string() })
        );
    }

    #[test]
    fn test_validate_rejects_missing_sentinel() {
        let mut option = tone();
        option.values.retain(|v| v.value != OTHER);
        assert!(matches!(
            OptionSchema::validate(vec![option]),
            Err(SchemaError::MissingSentinel { sentinel: OTHER, .. })
        ));

        let mut option = tone();
        option.values.retain(|v| v.value != NOT_SPECIFIED);
        option.default_value = None;
        assert!(matches!(
            OptionSchema::validate(vec![option]),
            Err(SchemaError::MissingSentinel {
                sentinel: NOT_SPECIFIED,
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_dangling_references() {
        let mut option = tone();
        option.default_value = Some("furious".to_string());
        assert!(matches!(
            OptionSchema::validate(vec![option]),
            Err(SchemaError::DanglingDefault { .. })
        ));

        let mut option = tone();
        option.recommended_value = Some("furious".to_string());
        assert!(matches!(
            OptionSchema::validate(vec![option]),
            Err(SchemaError::DanglingRecommended { .. })
        ));
    }

    #[test]
    fn test_validate_allows_generic_other_reference() {
        let mut option = tone();
        option.default_value = Some(OTHER.to_string());
        option.recommended_value = Some(OTHER.to_string());
        assert!(OptionSchema::validate(vec![option]).is_ok());
    }

    #[test]
    fn test_deserialize_uses_wire_names_and_validates() {
        let json = r#"[{
            "key": "length",
            "label": "分量",
            "values": [
                {"value": "short", "label": "短め"},
                {"value": "not_specified", "label": "指定しない"},
                {"value": "other", "label": "その他（文字数指定など）"}
            ],
            "default": "not_specified",
            "recommended": "short"
        }]"#;

        let schema: OptionSchema = serde_json::from_str(json).unwrap();
        let option = schema.get(keys::LENGTH).unwrap();
        assert_eq!(option.default_value.as_deref(), Some(NOT_SPECIFIED));
        assert_eq!(option.recommended_value.as_deref(), Some("short"));
        assert!(option.description.is_none());

        let bad = r#"[{"key": "length", "label": "分量", "values": [{"value": "short", "label": "短め"}]}]"#;
        assert!(serde_json::from_str::<OptionSchema>(bad).is_err());
    }
}
