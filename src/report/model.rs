use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::matcher::AssertionFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    Error,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Pass => "pass",
            Outcome::Fail => "fail",
            Outcome::Error => "error",
        }
    }
}

/// Why a scenario ended in `Outcome::Error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ErrorCause {
    UnresolvedVariable { field: String, variable: String },
    InvalidTemplate { field: String, message: String },
    Transport { message: String, timeout: bool },
    Propagated { upstream: String, reason: String },
}

impl std::fmt::Display for ErrorCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCause::UnresolvedVariable { field, variable } => {
                write!(f, "unresolved variable `{variable}` in {field}")
            }
            ErrorCause::InvalidTemplate { field, message } => write!(f, "{field}: {message}"),
            ErrorCause::Transport { message, .. } => f.write_str(message),
            ErrorCause::Propagated { upstream, reason } => {
                write!(f, "skipped: upstream `{upstream}` {reason}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestSummary {
    pub method: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub scenario_id: String,
    pub group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_assertions: Vec<AssertionFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCause>,
    pub duration_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_preview: Option<String>,
    /// Where the exchange was dumped, when a response directory is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange_path: Option<PathBuf>,
}

impl ScenarioResult {
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Pass
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupReport {
    pub suite: String,
    pub name: String,
    pub results: Vec<ScenarioResult>,
    pub duration_ms: f64,
}

impl GroupReport {
    /// `suite/group`, unique across a run.
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.suite, self.name)
    }

    pub fn result(&self, scenario_id: &str) -> Option<&ScenarioResult> {
        self.results
            .iter()
            .find(|result| result.scenario_id == scenario_id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
}

impl Summary {
    fn record(&mut self, outcome: Outcome) {
        self.total += 1;
        match outcome {
            Outcome::Pass => self.passed += 1,
            Outcome::Fail => self.failed += 1,
            Outcome::Error => self.errored += 1,
        }
    }
}

/// Everything a run produced, groups in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub groups: Vec<GroupReport>,
    pub summary: Summary,
}

impl RunReport {
    pub fn begin() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            groups: Vec::new(),
            summary: Summary::default(),
        }
    }

    pub fn push(&mut self, group: GroupReport) {
        for result in &group.results {
            self.summary.record(result.outcome);
        }
        self.groups.push(group);
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    /// Finds a group by `suite/group`, falling back to the first group with
    /// that bare name.
    pub fn group(&self, name: &str) -> Option<&GroupReport> {
        self.groups
            .iter()
            .find(|group| group.qualified_name() == name)
            .or_else(|| self.groups.iter().find(|group| group.name == name))
    }

    pub fn results(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.groups.iter().flat_map(|group| group.results.iter())
    }

    pub fn success(&self) -> bool {
        self.summary.total == self.summary.passed
    }
}
