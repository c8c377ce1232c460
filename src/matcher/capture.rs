use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{deep::deep_equal, kinds::compact, path::FieldPath, AssertionFailure};

/// Binds a response field to a variable for later scenarios in the group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Capture {
    #[serde(default = "FieldPath::root")]
    pub path: FieldPath,
    #[serde(rename = "as")]
    pub variable: String,
    /// Picks the first array element whose fields deep-equal these values.
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<Map<String, Value>>,
}

impl Capture {
    pub fn new(path: FieldPath, variable: impl Into<String>) -> Self {
        Self {
            path,
            variable: variable.into(),
            filter: None,
        }
    }

    fn extract(&self, body: &Value) -> Result<Value, String> {
        let found = self.path.lookup(body).map_err(|miss| miss.to_string())?;
        let Some(filter) = &self.filter else {
            return Ok(found.clone());
        };

        let Value::Array(items) = found else {
            return Err("`where` requires an array".to_string());
        };
        items
            .iter()
            .find(|item| {
                filter.iter().all(|(key, expected)| {
                    item.get(key)
                        .map_or(false, |actual| deep_equal(expected, actual))
                })
            })
            .cloned()
            .ok_or_else(|| {
                format!(
                    "no element of {} items matched {}",
                    items.len(),
                    compact(&Value::Object(filter.clone()))
                )
            })
    }
}

/// Extracts every capture or none: a single miss fails the whole set.
pub fn extract_captures(
    body: &Value,
    captures: &[Capture],
) -> Result<Vec<(String, Value)>, Vec<AssertionFailure>> {
    let mut values = Vec::with_capacity(captures.len());
    let mut failures = Vec::new();

    for capture in captures {
        match capture.extract(body) {
            Ok(value) => values.push((capture.variable.clone(), value)),
            Err(reason) => failures.push(AssertionFailure::Capture {
                path: capture.path.to_string(),
                variable: capture.variable.clone(),
                reason,
            }),
        }
    }

    if failures.is_empty() {
        Ok(values)
    } else {
        Err(failures)
    }
}
