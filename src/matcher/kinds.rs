use std::fmt;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{deep::deep_diff, path::FieldPath};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Null,
}

impl JsonType {
    /// The most specific type name for a value; whole numbers report `integer`.
    pub fn of(value: &Value) -> JsonType {
        match value {
            Value::String(_) => JsonType::String,
            Value::Number(n) if n.is_i64() || n.is_u64() => JsonType::Integer,
            Value::Number(_) => JsonType::Number,
            Value::Bool(_) => JsonType::Boolean,
            Value::Array(_) => JsonType::Array,
            Value::Object(_) => JsonType::Object,
            Value::Null => JsonType::Null,
        }
    }

    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (JsonType::Number, Value::Number(_)) => true,
            (JsonType::Integer, Value::Number(n)) => {
                n.is_i64() || n.is_u64() || n.as_f64().map_or(false, |f| f.fract() == 0.0)
            }
            _ => JsonType::of(value) == self,
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JsonType::String => "string",
            JsonType::Number => "number",
            JsonType::Integer => "integer",
            JsonType::Boolean => "boolean",
            JsonType::Array => "array",
            JsonType::Object => "object",
            JsonType::Null => "null",
        };
        f.write_str(name)
    }
}

/// A rule comparing an expected value against one response field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Matcher {
    /// Exact JSON equality: `120` and `120.0` differ.
    Equals(Value),
    /// Structural equality: object key order is ignored, array order is not,
    /// numbers compare by value.
    DeepEquals(Value),
    NotNull,
    /// Inclusive numeric range.
    Range { min: f64, max: f64 },
    Type(JsonType),
    Matches(String),
    Exists(bool),
}

/// Outcome of applying a matcher to a (possibly missing) field.
pub(crate) enum Verdict {
    Pass,
    Fail(String),
}

impl Matcher {
    pub fn describe(&self) -> String {
        match self {
            Matcher::Equals(value) => format!("equals {}", compact(value)),
            Matcher::DeepEquals(value) => format!("deep-equals {}", compact(value)),
            Matcher::NotNull => "is not null".to_string(),
            Matcher::Range { min, max } => format!("within [{min}, {max}]"),
            Matcher::Type(kind) => format!("is of type {kind}"),
            Matcher::Matches(pattern) => format!("matches /{pattern}/"),
            Matcher::Exists(true) => "exists".to_string(),
            Matcher::Exists(false) => "is absent".to_string(),
        }
    }

    pub(crate) fn check(&self, actual: Option<&Value>) -> Verdict {
        let Some(actual) = actual else {
            return match self {
                Matcher::Exists(false) => Verdict::Pass,
                _ => Verdict::Fail("field is missing".to_string()),
            };
        };

        match self {
            Matcher::Equals(expected) => {
                if expected == actual {
                    Verdict::Pass
                } else {
                    Verdict::Fail(format!(
                        "expected {}, found {}",
                        compact(expected),
                        compact(actual)
                    ))
                }
            }
            Matcher::DeepEquals(expected) => match deep_diff(expected, actual) {
                None => Verdict::Pass,
                Some(diff) => Verdict::Fail(diff),
            },
            Matcher::NotNull => {
                if actual.is_null() {
                    Verdict::Fail("value is null".to_string())
                } else {
                    Verdict::Pass
                }
            }
            Matcher::Range { min, max } => match actual.as_f64() {
                Some(number) if number >= *min && number <= *max => Verdict::Pass,
                Some(number) => {
                    Verdict::Fail(format!("{number} is outside [{min}, {max}]"))
                }
                None => Verdict::Fail(format!(
                    "expected number, found {}",
                    JsonType::of(actual)
                )),
            },
            Matcher::Type(kind) => {
                if kind.accepts(actual) {
                    Verdict::Pass
                } else {
                    Verdict::Fail(format!(
                        "expected {kind}, found {}",
                        JsonType::of(actual)
                    ))
                }
            }
            Matcher::Matches(pattern) => {
                let regex = match Regex::new(pattern) {
                    Ok(regex) => regex,
                    Err(err) => return Verdict::Fail(format!("invalid pattern: {err}")),
                };
                match actual.as_str() {
                    Some(text) if regex.is_match(text) => Verdict::Pass,
                    Some(text) => Verdict::Fail(format!("{text:?} does not match")),
                    None => Verdict::Fail(format!(
                        "expected string, found {}",
                        JsonType::of(actual)
                    )),
                }
            }
            Matcher::Exists(true) => Verdict::Pass,
            Matcher::Exists(false) => Verdict::Fail("field is present".to_string()),
        }
    }
}

/// One `{ path, <matcher> }` entry of a scenario expectation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAssertion")]
pub struct Assertion {
    pub path: FieldPath,
    pub matcher: Matcher,
}

impl Assertion {
    pub fn new(path: FieldPath, matcher: Matcher) -> Self {
        Self { path, matcher }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawAssertion {
    #[serde(default)]
    path: Option<FieldPath>,
    #[serde(default, deserialize_with = "present")]
    equals: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    deep_equals: Option<Value>,
    #[serde(default)]
    not_null: Option<bool>,
    #[serde(default)]
    range: Option<(f64, f64)>,
    #[serde(default, rename = "type")]
    kind: Option<JsonType>,
    #[serde(default)]
    matches: Option<String>,
    #[serde(default)]
    exists: Option<bool>,
}

/// Keeps an explicit `null` distinct from an absent key.
pub(crate) fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl TryFrom<RawAssertion> for Assertion {
    type Error = String;

    fn try_from(raw: RawAssertion) -> Result<Self, Self::Error> {
        let path = raw.path.unwrap_or_else(FieldPath::root);
        let mut matchers = Vec::new();

        if let Some(value) = raw.equals {
            if value.is_array() || value.is_object() {
                return Err(format!("`equals` on `{path}` needs a scalar; use `deepEquals`"));
            }
            matchers.push(Matcher::Equals(value));
        }
        if let Some(value) = raw.deep_equals {
            matchers.push(Matcher::DeepEquals(value));
        }
        match raw.not_null {
            Some(true) => matchers.push(Matcher::NotNull),
            Some(false) => return Err(format!("`notNull: false` on `{path}`; use `type: null`")),
            None => {}
        }
        if let Some((min, max)) = raw.range {
            if min > max {
                return Err(format!("range on `{path}` has min {min} greater than max {max}"));
            }
            matchers.push(Matcher::Range { min, max });
        }
        if let Some(kind) = raw.kind {
            matchers.push(Matcher::Type(kind));
        }
        if let Some(pattern) = raw.matches {
            // Templated patterns are compiled once rendered.
            if !pattern.contains("{{") {
                Regex::new(&pattern)
                    .map_err(|err| format!("invalid pattern on `{path}`: {err}"))?;
            }
            matchers.push(Matcher::Matches(pattern));
        }
        if let Some(flag) = raw.exists {
            matchers.push(Matcher::Exists(flag));
        }

        match matchers.len() {
            1 => Ok(Assertion {
                path,
                matcher: matchers.remove(0),
            }),
            0 => Err(format!("assertion on `{path}` has no matcher")),
            _ => Err(format!(
                "assertion on `{path}` has more than one matcher; split it into separate entries"
            )),
        }
    }
}

pub(crate) fn compact(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn passes(matcher: &Matcher, actual: Option<&Value>) -> bool {
        matches!(matcher.check(actual), Verdict::Pass)
    }

    #[test]
    fn range_is_inclusive() {
        let matcher = Matcher::Range { min: 0.0, max: 5.0 };
        assert!(passes(&matcher, Some(&json!(5))));
        assert!(passes(&matcher, Some(&json!(0))));
        assert!(!passes(&matcher, Some(&json!(5.01))));
        assert!(!passes(&matcher, Some(&json!("5"))));
    }

    #[test]
    fn equals_is_exact() {
        let matcher = Matcher::Equals(json!(120));
        assert!(passes(&matcher, Some(&json!(120))));
        assert!(!passes(&matcher, Some(&json!(120.0))));
        assert!(!passes(&matcher, Some(&json!("120"))));
    }

    #[test]
    fn not_null_rejects_null_and_missing() {
        assert!(passes(&Matcher::NotNull, Some(&json!(0))));
        assert!(!passes(&Matcher::NotNull, Some(&Value::Null)));
        assert!(!passes(&Matcher::NotNull, None));
    }

    #[test]
    fn type_check_distinguishes_integers() {
        assert!(passes(&Matcher::Type(JsonType::Integer), Some(&json!(3))));
        assert!(passes(&Matcher::Type(JsonType::Integer), Some(&json!(3.0))));
        assert!(!passes(&Matcher::Type(JsonType::Integer), Some(&json!(3.5))));
        assert!(passes(&Matcher::Type(JsonType::Number), Some(&json!(3))));
        assert!(passes(&Matcher::Type(JsonType::Null), Some(&Value::Null)));
    }

    #[test]
    fn exists_handles_presence_and_absence() {
        assert!(passes(&Matcher::Exists(true), Some(&Value::Null)));
        assert!(!passes(&Matcher::Exists(true), None));
        assert!(passes(&Matcher::Exists(false), None));
        assert!(!passes(&Matcher::Exists(false), Some(&json!(1))));
    }

    #[test]
    fn matches_applies_regex_to_strings() {
        let matcher = Matcher::Matches("^[a-f0-9]{24}$".to_string());
        assert!(passes(&matcher, Some(&json!("65a1f0c2b3d4e5f6a7b8c9d0"))));
        assert!(!passes(&matcher, Some(&json!("nope"))));
        assert!(!passes(&Matcher::Matches("(".to_string()), Some(&json!("x"))));
    }

    #[test]
    fn deserializes_each_matcher_kind() {
        let parsed: Vec<Assertion> = serde_json::from_value(json!([
            {"path": "email", "equals": "ana@x.com"},
            {"path": "totalRating", "equals": null},
            {"path": "$", "deepEquals": {"a": 1}},
            {"path": "id", "notNull": true},
            {"path": "score", "range": [0, 5]},
            {"path": "active", "type": "boolean"},
            {"path": "name", "matches": "^A"},
            {"path": "password", "exists": false}
        ]))
        .unwrap();

        assert_eq!(parsed[0].matcher, Matcher::Equals(json!("ana@x.com")));
        assert_eq!(parsed[1].matcher, Matcher::Equals(Value::Null));
        assert!(parsed[2].path.is_root());
        assert_eq!(parsed[3].matcher, Matcher::NotNull);
        assert_eq!(parsed[4].matcher, Matcher::Range { min: 0.0, max: 5.0 });
        assert_eq!(parsed[5].matcher, Matcher::Type(JsonType::Boolean));
        assert_eq!(parsed[7].matcher, Matcher::Exists(false));
    }

    #[test]
    fn rejects_ambiguous_or_empty_assertions() {
        let both = serde_json::from_value::<Assertion>(json!({"path": "a", "equals": 1, "notNull": true}));
        assert!(both.is_err());
        let none = serde_json::from_value::<Assertion>(json!({"path": "a"}));
        assert!(none.is_err());
        let inverted = serde_json::from_value::<Assertion>(json!({"path": "a", "range": [5, 0]}));
        assert!(inverted.is_err());
        let structural = serde_json::from_value::<Assertion>(json!({"path": "a", "equals": {"b": 1}}));
        assert!(structural.is_err());
        let bad_pattern = serde_json::from_value::<Assertion>(json!({"path": "a", "matches": "("}));
        assert!(bad_pattern.is_err());
    }
}
