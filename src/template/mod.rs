//! `{{name}}` placeholders in strings and JSON values.
//!
//! A JSON string made of exactly one placeholder is replaced by the typed
//! value it names; anything else is interpolated as text. `\{{` produces a
//! literal `{{`.

mod scope;

use serde_json::Value;
use thiserror::Error;

use crate::store::StoreError;

pub use scope::{Lookup, Scope};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unresolved variable `{0}`")]
    UnresolvedVariable(String),
    #[error("empty template placeholder")]
    EmptyPlaceholder,
    #[error("invalid template variable `{0}`")]
    InvalidVariable(String),
    #[error("unterminated template placeholder")]
    Unterminated,
}

impl From<StoreError> for TemplateError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::MissingVariable(name) => TemplateError::UnresolvedVariable(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Placeholder(String),
}

fn tokenize(input: &str) -> Result<Vec<Piece>, TemplateError> {
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut rest = input;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("\\{{") {
            literal.push_str("{{");
            rest = after;
            continue;
        }

        if let Some(after) = rest.strip_prefix("{{") {
            let end = after.find("}}").ok_or(TemplateError::Unterminated)?;
            let name = after[..end].trim();
            if name.is_empty() {
                return Err(TemplateError::EmptyPlaceholder);
            }
            if !is_valid_name(name) {
                return Err(TemplateError::InvalidVariable(name.to_string()));
            }
            if !literal.is_empty() {
                pieces.push(Piece::Literal(std::mem::take(&mut literal)));
            }
            pieces.push(Piece::Placeholder(name.to_string()));
            rest = &after[end + 2..];
            continue;
        }

        let mut chars = rest.chars();
        if let Some(ch) = chars.next() {
            literal.push(ch);
        }
        rest = chars.as_str();
    }

    if !literal.is_empty() {
        pieces.push(Piece::Literal(literal));
    }
    Ok(pieces)
}

pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }

    chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-' | '[' | ']'))
}

/// The variable a reference starts from: `movie` for `movie.reviews[0]`.
pub fn root_name(reference: &str) -> &str {
    let end = reference.find(['.', '[']).unwrap_or(reference.len());
    &reference[..end]
}

pub fn references(input: &str) -> Result<Vec<String>, TemplateError> {
    Ok(tokenize(input)?
        .into_iter()
        .filter_map(|piece| match piece {
            Piece::Placeholder(name) => Some(name),
            Piece::Literal(_) => None,
        })
        .collect())
}

pub fn value_references(value: &Value) -> Result<Vec<String>, TemplateError> {
    let mut names = Vec::new();
    collect_value_references(value, &mut names)?;
    Ok(names)
}

fn collect_value_references(value: &Value, names: &mut Vec<String>) -> Result<(), TemplateError> {
    match value {
        Value::String(text) => names.extend(references(text)?),
        Value::Array(items) => {
            for item in items {
                collect_value_references(item, names)?;
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_value_references(item, names)?;
            }
        }
        _ => {}
    }
    Ok(())
}

pub fn render_str(input: &str, scope: &dyn Lookup) -> Result<String, TemplateError> {
    let mut output = String::with_capacity(input.len());
    for piece in tokenize(input)? {
        match piece {
            Piece::Literal(text) => output.push_str(&text),
            Piece::Placeholder(name) => {
                let value = scope
                    .lookup(&name)
                    .ok_or(TemplateError::UnresolvedVariable(name))?;
                match value {
                    Value::String(text) => output.push_str(&text),
                    other => output.push_str(&other.to_string()),
                }
            }
        }
    }
    Ok(output)
}

pub fn render_value(value: &Value, scope: &dyn Lookup) -> Result<Value, TemplateError> {
    match value {
        Value::String(text) => {
            let pieces = tokenize(text)?;
            if let [Piece::Placeholder(name)] = pieces.as_slice() {
                return scope
                    .lookup(name)
                    .ok_or_else(|| TemplateError::UnresolvedVariable(name.clone()));
            }
            render_str(text, scope).map(Value::String)
        }
        Value::Array(items) => items
            .iter()
            .map(|item| render_value(item, scope))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut rendered = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                rendered.insert(key.clone(), render_value(item, scope)?);
            }
            Ok(Value::Object(rendered))
        }
        other => Ok(other.clone()),
    }
}
