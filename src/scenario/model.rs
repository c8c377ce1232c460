use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    executor::HttpMethod,
    generator::ValueKind,
    matcher::{Capture, Expectation, FieldPath},
};

/// One suite file: independent groups of ordered scenarios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Suite {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<Group>,
}

/// Scenarios that run in declared order and share one variable store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Group {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fixtures: BTreeMap<String, Fixture>,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fixtures: BTreeMap::new(),
            scenarios: Vec::new(),
        }
    }

    pub fn with_fixture(mut self, name: impl Into<String>, fixture: Fixture) -> Self {
        self.fixtures.insert(name.into(), fixture);
        self
    }

    pub fn with_scenario(mut self, scenario: Scenario) -> Self {
        self.scenarios.push(scenario);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GeneratedFixture {
    pub generate: ValueKind,
}

/// A value computed once when its group starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fixture {
    Generated(GeneratedFixture),
    Literal(Value),
}

impl Fixture {
    pub fn generated(kind: ValueKind) -> Self {
        Fixture::Generated(GeneratedFixture { generate: kind })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Scenario {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub method: HttpMethod,
    pub url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Sent as `Authorization: Bearer <token>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default)]
    pub expect: Expectation,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capture: Vec<Capture>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl Scenario {
    pub fn new(id: impl Into<String>, method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: None,
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            bearer: None,
            body: None,
            expect: Expectation::default(),
            capture: Vec::new(),
            depends_on: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    pub fn expecting(mut self, expect: Expectation) -> Self {
        self.expect = expect;
        self
    }

    pub fn capturing(mut self, path: FieldPath, variable: impl Into<String>) -> Self {
        self.capture.push(Capture::new(path, variable));
        self
    }

    pub fn after(mut self, scenario_id: impl Into<String>) -> Self {
        self.depends_on.push(scenario_id.into());
        self
    }

    pub fn captures(&self, variable: &str) -> bool {
        self.capture.iter().any(|capture| capture.variable == variable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_a_full_scenario() {
        let scenario: Scenario = serde_json::from_value(json!({
            "id": "register",
            "method": "post",
            "url": "users",
            "body": {"name": "{{fullName}}", "email": "{{email}}", "password": "secret1"},
            "expect": {
                "status": 201,
                "assertions": [{"path": "email", "equals": "{{email}}"}]
            },
            "capture": [{"path": "id", "as": "userId"}]
        }))
        .unwrap();

        assert_eq!(scenario.method, HttpMethod::Post);
        assert_eq!(scenario.expect.status, Some(201));
        assert!(scenario.captures("userId"));
        assert!(scenario.depends_on.is_empty());
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = serde_json::from_value::<Scenario>(json!({
            "id": "x", "method": "GET", "url": "movies", "failOnStatus": false
        }))
        .unwrap_err();
        assert!(err.to_string().contains("failOnStatus"));
    }

    #[test]
    fn fixtures_are_generated_or_literal() {
        let group: Group = serde_json::from_value(json!({
            "name": "movies",
            "fixtures": {
                "email": {"generate": "email"},
                "password": "password",
                "movie": {"title": "{{title}}", "durationInMinutes": 120}
            },
            "scenarios": []
        }))
        .unwrap();

        assert_eq!(group.fixtures["email"], Fixture::generated(ValueKind::Email));
        assert_eq!(group.fixtures["password"], Fixture::Literal(json!("password")));
        assert!(matches!(group.fixtures["movie"], Fixture::Literal(Value::Object(_))));
    }
}
