//! Selected option values

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::schema::{CustomOption, NOT_SPECIFIED, OTHER, OptionSchema, SchemaError};

const FREEFORM_PREFIX: &str = "other:";

static UNSELECTED: SelectedValue = SelectedValue::NotSpecified;

/// The value chosen for one option
///
/// On the wire this is a single string: `not_specified`, an enumerated
/// token, `other`, or `other:<text>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SelectedValue {
    NotSpecified,
    Choice(String),
    Other,
    Freeform(String),
}

impl SelectedValue {
    /// Decode a wire string
    ///
    /// Exactly one leading `other:` is stripped, so the payload may itself
    /// contain `other:`.
    pub fn parse(wire: &str) -> Self {
        if wire == NOT_SPECIFIED {
            SelectedValue::NotSpecified
        } else if wire == OTHER {
            SelectedValue::Other
        } else if let Some(text) = wire.strip_prefix(FREEFORM_PREFIX) {
            SelectedValue::Freeform(text.to_string())
        } else {
            SelectedValue::Choice(wire.to_string())
        }
    }

    pub fn to_wire(&self) -> String {
        match self {
            SelectedValue::NotSpecified => NOT_SPECIFIED.to_string(),
            SelectedValue::Choice(token) => token.clone(),
            SelectedValue::Other => OTHER.to_string(),
            SelectedValue::Freeform(text) => format!("{}{}", FREEFORM_PREFIX, text),
        }
    }

    pub fn freeform(text: impl Into<String>) -> Self {
        SelectedValue::Freeform(text.into())
    }

    pub fn choice(token: impl Into<String>) -> Self {
        SelectedValue::Choice(token.into())
    }

    /// Interpret text typed for `option`
    ///
    /// Wire forms are honored; text that names none of the option's values
    /// is taken as a free-form answer.
    pub fn from_input(option: &CustomOption, text: &str) -> Self {
        match Self::parse(text.trim()) {
            SelectedValue::Choice(token) if !option.has_value(&token) => SelectedValue::Freeform(token),
            value => value,
        }
    }

    pub fn is_not_specified(&self) -> bool {
        matches!(self, SelectedValue::NotSpecified)
    }
}

impl From<String> for SelectedValue {
    fn from(wire: String) -> Self {
        Self::parse(&wire)
    }
}

impl From<&str> for SelectedValue {
    fn from(wire: &str) -> Self {
        Self::parse(wire)
    }
}

impl From<SelectedValue> for String {
    fn from(value: SelectedValue) -> Self {
        value.to_wire()
    }
}

impl fmt::Display for SelectedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

/// Option key to selected value; absent keys read as not specified
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionSelectionMap(BTreeMap<String, SelectedValue>);

impl OptionSelectionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial selections for a schema: each option's default, else not specified
    pub fn initialize(schema: &OptionSchema) -> Self {
        debug!(option_count = schema.len(), "OptionSelectionMap::initialize: called");
        let map = schema
            .iter()
            .map(|option| {
                let value = option
                    .default_value
                    .as_deref()
                    .map(SelectedValue::parse)
                    .unwrap_or(SelectedValue::NotSpecified);
                (option.key.clone(), value)
            })
            .collect();
        Self(map)
    }

    pub fn get(&self, key: &str) -> &SelectedValue {
        self.0.get(key).unwrap_or(&UNSELECTED)
    }

    /// Change one selection
    ///
    /// The key must exist in `schema`; an enumerated choice must be one of
    /// that option's values. A choice spelled as a wire sentinel is stored
    /// as the matching variant.
    pub fn set(&mut self, schema: &OptionSchema, key: &str, value: SelectedValue) -> Result<(), SchemaError> {
        debug!(%key, %value, "OptionSelectionMap::set: called");
        let option = schema.get(key).ok_or_else(|| SchemaError::UnknownKey(key.to_string()))?;
        let value = match value {
            SelectedValue::Choice(token) => SelectedValue::parse(&token),
            value => value,
        };
        if let SelectedValue::Choice(token) = &value {
            if !option.has_value(token) {
                return Err(SchemaError::UnknownValue {
                    key: key.to_string(),
                    value: token.clone(),
                });
            }
        }
        self.0.insert(key.to_string(), value);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SelectedValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flat `{key: wire-string}` form stored in history records
    pub fn to_wire(&self) -> BTreeMap<String, String> {
        self.0.iter().map(|(k, v)| (k.clone(), v.to_wire())).collect()
    }

    pub fn from_wire(map: &BTreeMap<String, String>) -> Self {
        Self(map.iter().map(|(k, v)| (k.clone(), SelectedValue::parse(v))).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::schema::{keys, option_with_sentinels};
    use proptest::prelude::*;

    fn schema() -> OptionSchema {
        OptionSchema::validate(vec![
            option_with_sentinels(
                keys::LOGIC_STRUCTURE,
                "論理構造",
                "説明の構成方法",
                &[("conclusion_first", "結論→理由→例"), ("pros_cons", "メリデメ比較")],
                Some("conclusion_first"),
                Some("conclusion_first"),
            ),
            option_with_sentinels(keys::TONE, "トーン", "トーン", &[("friendly", "優しい")], None, None),
            option_with_sentinels(keys::LENGTH, "分量", "長さ", &[("short", "短め")], Some(OTHER), None),
        ])
        .unwrap()
    }

    #[test]
    fn test_parse_wire_forms() {
        assert_eq!(SelectedValue::parse("not_specified"), SelectedValue::NotSpecified);
        assert_eq!(SelectedValue::parse("other"), SelectedValue::Other);
        assert_eq!(SelectedValue::parse("other:800字"), SelectedValue::freeform("800字"));
        assert_eq!(SelectedValue::parse("other:"), SelectedValue::freeform(""));
        assert_eq!(SelectedValue::parse("formal"), SelectedValue::choice("formal"));
        assert_eq!(
            SelectedValue::parse("other:other:x"),
            SelectedValue::freeform("other:x")
        );
    }

    #[test]
    fn test_serde_uses_wire_string() {
        let value = SelectedValue::freeform("800字");
        assert_eq!(serde_json::to_string(&value).unwrap(), "\"other:800字\"");

        let back: SelectedValue = serde_json::from_str("\"other:800字\"").unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_initialize_uses_defaults() {
        let map = OptionSelectionMap::initialize(&schema());

        assert_eq!(map.len(), 3);
        assert_eq!(map.get(keys::LOGIC_STRUCTURE), &SelectedValue::choice("conclusion_first"));
        assert_eq!(map.get(keys::TONE), &SelectedValue::NotSpecified);
        assert_eq!(map.get(keys::LENGTH), &SelectedValue::Other);
    }

    #[test]
    fn test_absent_key_reads_not_specified() {
        let map = OptionSelectionMap::new();
        assert!(map.get("anything").is_not_specified());
    }

    #[test]
    fn test_set_validates_key_and_choice() {
        let schema = schema();
        let mut map = OptionSelectionMap::initialize(&schema);

        map.set(&schema, keys::TONE, SelectedValue::choice("friendly")).unwrap();
        assert_eq!(map.get(keys::TONE), &SelectedValue::choice("friendly"));

        map.set(&schema, keys::LENGTH, SelectedValue::freeform("800字")).unwrap();
        assert_eq!(map.get(keys::LENGTH), &SelectedValue::freeform("800字"));

        assert_eq!(
            map.set(&schema, "color", SelectedValue::Other),
            Err(SchemaError::UnknownKey("color".to_string()))
        );
        assert!(matches!(
            map.set(&schema, keys::TONE, SelectedValue::choice("furious")),
            Err(SchemaError::UnknownValue { .. })
        ));
        // Rejected edits leave the map alone
        assert_eq!(map.get(keys::TONE), &SelectedValue::choice("friendly"));
    }

    #[test]
    fn test_set_stores_sentinel_choices_as_variants() {
        let schema = schema();
        let mut map = OptionSelectionMap::initialize(&schema);

        map.set(&schema, keys::TONE, SelectedValue::choice(NOT_SPECIFIED)).unwrap();
        assert_eq!(map.get(keys::TONE), &SelectedValue::NotSpecified);

        map.set(&schema, keys::TONE, SelectedValue::choice(OTHER)).unwrap();
        assert_eq!(map.get(keys::TONE), &SelectedValue::Other);

        map.set(&schema, keys::LENGTH, SelectedValue::choice("other:800字")).unwrap();
        assert_eq!(map.get(keys::LENGTH), &SelectedValue::freeform("800字"));

        assert_eq!(OptionSelectionMap::from_wire(&map.to_wire()), map);
    }

    #[test]
    fn test_from_input() {
        let schema = schema();
        let tone = schema.get(keys::TONE).unwrap();

        assert_eq!(SelectedValue::from_input(tone, "friendly"), SelectedValue::choice("friendly"));
        assert_eq!(SelectedValue::from_input(tone, " not_specified "), SelectedValue::NotSpecified);
        assert_eq!(SelectedValue::from_input(tone, "other"), SelectedValue::Other);
        assert_eq!(SelectedValue::from_input(tone, "皮肉まじりで"), SelectedValue::freeform("皮肉まじりで"));
        assert_eq!(SelectedValue::from_input(tone, "other:friendly"), SelectedValue::freeform("friendly"));

        let mut map = OptionSelectionMap::initialize(&schema);
        map.set(&schema, keys::TONE, SelectedValue::from_input(tone, "皮肉まじりで"))
            .unwrap();
        assert_eq!(map.to_wire()[keys::TONE], "other:皮肉まじりで");
    }

    #[test]
    fn test_wire_map_round_trip() {
        let schema = schema();
        let mut map = OptionSelectionMap::initialize(&schema);
        map.set(&schema, keys::LENGTH, SelectedValue::freeform("other:1000 words")).unwrap();

        let wire = map.to_wire();
        assert_eq!(wire[keys::LENGTH], "other:other:1000 words");
        assert_eq!(OptionSelectionMap::from_wire(&wire), map);
    }

    /// Options with random keys and values, each with an optional default
    /// drawn from its values (sentinels included)
    fn arb_options() -> impl Strategy<Value = Vec<(String, Vec<String>, Option<usize>)>> {
        prop::collection::btree_map(
            "[a-z][a-z_]{0,7}",
            (prop::collection::vec("v_[a-z0-9]{1,6}", 0..5), prop::option::of(0usize..8)),
            1..6,
        )
        .prop_map(|options| {
            options
                .into_iter()
                .map(|(key, (values, default))| (key, values, default))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn test_initialize_uses_default_or_not_specified(options in arb_options()) {
            let built: Vec<CustomOption> = options
                .iter()
                .map(|(key, values, default)| {
                    let pairs: Vec<(&str, &str)> = values.iter().map(|v| (v.as_str(), v.as_str())).collect();
                    let mut tokens: Vec<&str> = values.iter().map(String::as_str).collect();
                    tokens.extend([NOT_SPECIFIED, OTHER]);
                    let default = default.map(|i| tokens[i % tokens.len()]);
                    option_with_sentinels(key, key, key, &pairs, default, None)
                })
                .collect();
            let schema = OptionSchema::validate(built).unwrap();
            let map = OptionSelectionMap::initialize(&schema);

            prop_assert_eq!(map.len(), schema.len());
            for option in schema.iter() {
                let expected = option.default_value.as_deref().unwrap_or(NOT_SPECIFIED);
                prop_assert_eq!(map.get(&option.key).to_wire(), expected);
            }
        }

        #[test]
        fn test_freeform_round_trips(text in ".*") {
            let value = SelectedValue::Freeform(text.clone());
            prop_assert_eq!(SelectedValue::parse(&value.to_wire()), SelectedValue::Freeform(text));
        }

        #[test]
        fn test_nested_other_prefix_round_trips(text in "(other:){0,3}[a-z0-9 ]{0,12}") {
            let value = SelectedValue::Freeform(text);
            prop_assert_eq!(SelectedValue::parse(&value.to_wire()), value);
        }
    }
}
