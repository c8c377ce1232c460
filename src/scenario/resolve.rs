use std::collections::BTreeSet;

use serde_json::Value;
use thiserror::Error;

use crate::{
    executor::HttpRequest,
    matcher::{Assertion, Capture, Expectation, Matcher},
    template::{self, Lookup, TemplateError},
};

use super::model::Scenario;

/// A template in `field` could not be rendered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {source}")]
pub struct ResolveError {
    pub field: String,
    #[source]
    pub source: TemplateError,
}

impl ResolveError {
    fn at(field: impl Into<String>) -> impl FnOnce(TemplateError) -> ResolveError {
        let field = field.into();
        move |source| ResolveError { field, source }
    }

    pub fn unresolved_variable(&self) -> Option<&str> {
        match &self.source {
            TemplateError::UnresolvedVariable(name) => Some(name),
            _ => None,
        }
    }
}

/// A scenario with every placeholder substituted.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedScenario {
    pub request: HttpRequest,
    pub expect: Expectation,
    pub capture: Vec<Capture>,
}

impl Scenario {
    /// Every variable reference in the scenario, e.g. `token` or `movie.id`.
    pub fn references(&self) -> Result<BTreeSet<String>, TemplateError> {
        let mut names = BTreeSet::new();
        names.extend(template::references(&self.url)?);
        for value in self.headers.values() {
            names.extend(template::references(value)?);
        }
        if let Some(token) = &self.bearer {
            names.extend(template::references(token)?);
        }
        if let Some(body) = &self.body {
            names.extend(template::value_references(body)?);
        }
        if let Some(text) = &self.expect.status_text {
            names.extend(template::references(text)?);
        }
        for assertion in self.expect.body_assertions() {
            match &assertion.matcher {
                Matcher::Equals(value) | Matcher::DeepEquals(value) => {
                    names.extend(template::value_references(value)?);
                }
                Matcher::Matches(pattern) => names.extend(template::references(pattern)?),
                _ => {}
            }
        }
        for capture in &self.capture {
            if let Some(filter) = &capture.filter {
                names.extend(template::value_references(&Value::Object(filter.clone()))?);
            }
        }
        Ok(names)
    }

    /// Root variable names this scenario needs, `movie` for `movie.id`.
    pub fn required_variables(&self) -> Result<BTreeSet<String>, TemplateError> {
        Ok(self
            .references()?
            .iter()
            .map(|name| template::root_name(name).to_string())
            .collect())
    }

    pub fn resolve(&self, scope: &dyn Lookup) -> Result<ResolvedScenario, ResolveError> {
        let url = template::render_str(&self.url, scope).map_err(ResolveError::at("url"))?;

        let mut headers = Vec::with_capacity(self.headers.len() + 1);
        for (name, value) in &self.headers {
            let rendered = template::render_str(value, scope)
                .map_err(ResolveError::at(format!("header `{name}`")))?;
            headers.push((name.clone(), rendered));
        }
        if let Some(token) = &self.bearer {
            let rendered =
                template::render_str(token, scope).map_err(ResolveError::at("bearer"))?;
            headers.push(("Authorization".to_string(), format!("Bearer {rendered}")));
        }

        let body = self
            .body
            .as_ref()
            .map(|body| template::render_value(body, scope))
            .transpose()
            .map_err(ResolveError::at("body"))?;

        Ok(ResolvedScenario {
            request: HttpRequest {
                method: self.method,
                url,
                headers,
                body,
            },
            expect: resolve_expectation(&self.expect, scope)?,
            capture: resolve_captures(&self.capture, scope)?,
        })
    }
}

fn resolve_expectation(
    expect: &Expectation,
    scope: &dyn Lookup,
) -> Result<Expectation, ResolveError> {
    let status_text = expect
        .status_text
        .as_deref()
        .map(|text| template::render_str(text, scope))
        .transpose()
        .map_err(ResolveError::at("expect.statusText"))?;

    let body = expect
        .body
        .as_ref()
        .map(|body| template::render_value(body, scope))
        .transpose()
        .map_err(ResolveError::at("expect.body"))?;

    let mut assertions = Vec::with_capacity(expect.assertions.len());
    for (index, assertion) in expect.assertions.iter().enumerate() {
        let matcher = resolve_matcher(&assertion.matcher, scope)
            .map_err(ResolveError::at(format!("expect.assertions[{index}]")))?;
        assertions.push(Assertion::new(assertion.path.clone(), matcher));
    }

    Ok(Expectation {
        status: expect.status,
        status_text,
        body,
        assertions,
    })
}

fn resolve_matcher(matcher: &Matcher, scope: &dyn Lookup) -> Result<Matcher, TemplateError> {
    Ok(match matcher {
        Matcher::Equals(value) => Matcher::Equals(template::render_value(value, scope)?),
        Matcher::DeepEquals(value) => Matcher::DeepEquals(template::render_value(value, scope)?),
        Matcher::Matches(pattern) => Matcher::Matches(template::render_str(pattern, scope)?),
        other => other.clone(),
    })
}

fn resolve_captures(captures: &[Capture], scope: &dyn Lookup) -> Result<Vec<Capture>, ResolveError> {
    captures
        .iter()
        .enumerate()
        .map(|(index, capture)| {
            let filter = match &capture.filter {
                Some(filter) => match template::render_value(&Value::Object(filter.clone()), scope)
                    .map_err(ResolveError::at(format!("capture[{index}].where")))?
                {
                    Value::Object(map) => Some(map),
                    _ => None,
                },
                None => None,
            };
            Ok(Capture {
                filter,
                ..capture.clone()
            })
        })
        .collect()
}
