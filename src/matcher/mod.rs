//! Response assertions: status checks, field matchers and capture extraction.
//!
//! Every assertion of a scenario is evaluated; failures are collected rather
//! than returned early so one run reports every mismatch.

mod capture;
mod deep;
mod kinds;
mod path;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::executor::Envelope;

pub use capture::{extract_captures, Capture};
pub use deep::{deep_diff, deep_equal};
pub use kinds::{Assertion, JsonType, Matcher};
pub use path::{FieldPath, PathError, PathMiss, Segment};

use kinds::{present, Verdict};

/// Expected response for one scenario.
///
/// Without an explicit `status` any 2xx response is accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Expectation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    /// Shorthand for a `deepEquals` assertion on the whole body.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<Assertion>,
}

impl Expectation {
    pub fn status(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    /// Body assertions in evaluation order, the `body` shorthand first.
    pub fn body_assertions(&self) -> Vec<Assertion> {
        let mut all = Vec::with_capacity(self.assertions.len() + 1);
        if let Some(body) = &self.body {
            all.push(Assertion::new(
                FieldPath::root(),
                Matcher::DeepEquals(body.clone()),
            ));
        }
        all.extend(self.assertions.iter().cloned());
        all
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum AssertionFailure {
    Status {
        expected: u16,
        actual: u16,
    },
    /// No status was declared and the response was not 2xx.
    Unsuccessful {
        actual: u16,
    },
    StatusText {
        expected: String,
        actual: String,
    },
    #[serde(rename_all = "camelCase")]
    Body {
        path: String,
        expected: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        actual: Option<Value>,
        reason: String,
    },
    Capture {
        path: String,
        variable: String,
        reason: String,
    },
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssertionFailure::Status { expected, actual } => {
                write!(f, "status: expected {expected}, got {actual}")
            }
            AssertionFailure::Unsuccessful { actual } => {
                write!(f, "status: expected 2xx, got {actual}")
            }
            AssertionFailure::StatusText { expected, actual } => {
                write!(f, "status text: expected {expected:?}, got {actual:?}")
            }
            AssertionFailure::Body {
                path,
                expected,
                reason,
                ..
            } => write!(f, "`{path}` {expected}: {reason}"),
            AssertionFailure::Capture {
                path,
                variable,
                reason,
            } => write!(f, "capture `{variable}` from `{path}`: {reason}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchResult {
    pub failures: Vec<AssertionFailure>,
}

impl MatchResult {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

pub fn match_envelope(envelope: &Envelope, expectation: &Expectation) -> MatchResult {
    let mut failures = Vec::new();

    match expectation.status {
        Some(expected) if envelope.status() != expected => {
            failures.push(AssertionFailure::Status {
                expected,
                actual: envelope.status(),
            });
        }
        None if !(200..300).contains(&envelope.status()) => {
            failures.push(AssertionFailure::Unsuccessful {
                actual: envelope.status(),
            });
        }
        _ => {}
    }

    if let Some(expected) = &expectation.status_text {
        if !expected.eq_ignore_ascii_case(envelope.status_text()) {
            failures.push(AssertionFailure::StatusText {
                expected: expected.clone(),
                actual: envelope.status_text().to_string(),
            });
        }
    }

    for assertion in expectation.body_assertions() {
        let lookup = assertion.path.lookup(envelope.body());
        let actual = lookup.as_ref().ok().copied();
        if let Verdict::Fail(reason) = assertion.matcher.check(actual) {
            failures.push(AssertionFailure::Body {
                path: assertion.path.to_string(),
                expected: assertion.matcher.describe(),
                actual: actual.cloned(),
                reason: match lookup {
                    Err(miss) => miss.to_string(),
                    Ok(_) => reason,
                },
            });
        }
    }

    MatchResult { failures }
}
