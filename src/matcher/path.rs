use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::kinds::JsonType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Dotted/indexed address into a JSON document, e.g. `reviews[0].score`.
///
/// An empty path (or `$`) addresses the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    raw: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid field path `{path}`: {reason}")]
pub struct PathError {
    pub path: String,
    pub reason: String,
}

/// Where a lookup stopped and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMiss {
    pub at: String,
    pub reason: String,
}

impl fmt::Display for PathMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at `{}`", self.reason, self.at)
    }
}

impl FieldPath {
    pub fn root() -> Self {
        Self {
            raw: "$".to_string(),
            segments: Vec::new(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, PathError> {
        let trimmed = input.trim();
        let invalid = |reason: &str| PathError {
            path: input.to_string(),
            reason: reason.to_string(),
        };

        let (body, anchored) = match trimmed.strip_prefix('$') {
            Some(rest) => (rest, true),
            None => (trimmed, false),
        };

        let mut chars = body.chars().peekable();
        let mut segments = Vec::new();

        if anchored {
            if chars.peek() == Some(&'.') {
                chars.next();
                if chars.peek().is_none() {
                    return Err(invalid("trailing '.'"));
                }
                segments.push(Segment::Key(read_key(&mut chars, &invalid)?));
            }
        } else if !matches!(chars.peek(), None | Some('[')) {
            segments.push(Segment::Key(read_key(&mut chars, &invalid)?));
        }

        while let Some(ch) = chars.next() {
            match ch {
                '.' => segments.push(Segment::Key(read_key(&mut chars, &invalid)?)),
                '[' => segments.push(read_bracket(&mut chars, &invalid)?),
                other => {
                    return Err(invalid(&format!("unexpected character '{other}'")));
                }
            }
        }

        Ok(Self {
            raw: if trimmed.is_empty() {
                "$".to_string()
            } else {
                trimmed.to_string()
            },
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Splits `movie.reviews[0]` into `movie` and the remaining `reviews[0]`.
    pub fn split_first(&self) -> Option<(&str, FieldPath)> {
        match self.segments.split_first() {
            Some((Segment::Key(first), rest)) => Some((
                first.as_str(),
                FieldPath {
                    raw: render_segments(rest),
                    segments: rest.to_vec(),
                },
            )),
            _ => None,
        }
    }

    pub fn lookup<'v>(&self, root: &'v Value) -> Result<&'v Value, PathMiss> {
        let mut current = root;
        for (position, segment) in self.segments.iter().enumerate() {
            let next = match (segment, current) {
                (Segment::Key(key), Value::Object(map)) => map.get(key),
                (Segment::Index(index), Value::Array(items)) => items.get(*index),
                _ => None,
            };
            match next {
                Some(value) => current = value,
                None => {
                    return Err(PathMiss {
                        at: render_segments(&self.segments[..=position]),
                        reason: describe_miss(segment, current),
                    })
                }
            }
        }
        Ok(current)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FieldPath::parse(&value)
    }
}

impl From<FieldPath> for String {
    fn from(value: FieldPath) -> Self {
        value.raw
    }
}

fn read_key<I, F>(chars: &mut std::iter::Peekable<I>, invalid: &F) -> Result<String, PathError>
where
    I: Iterator<Item = char>,
    F: Fn(&str) -> PathError,
{
    let mut key = String::new();
    while let Some(&next) = chars.peek() {
        match next {
            '.' | '[' => break,
            ']' => return Err(invalid("unbalanced ']'")),
            _ => {
                key.push(next);
                chars.next();
            }
        }
    }
    if key.is_empty() {
        return Err(invalid("empty key"));
    }
    Ok(key)
}

fn read_bracket<I, F>(chars: &mut std::iter::Peekable<I>, invalid: &F) -> Result<Segment, PathError>
where
    I: Iterator<Item = char>,
    F: Fn(&str) -> PathError,
{
    if chars.peek() == Some(&'"') {
        chars.next();
        let mut key = String::new();
        loop {
            match chars.next() {
                Some('"') => break,
                Some(ch) => key.push(ch),
                None => return Err(invalid("unterminated quoted key")),
            }
        }
        if chars.next() != Some(']') {
            return Err(invalid("expected ']' after quoted key"));
        }
        return Ok(Segment::Key(key));
    }

    let mut digits = String::new();
    loop {
        match chars.next() {
            Some(']') => break,
            Some(ch) => digits.push(ch),
            None => return Err(invalid("unterminated '['")),
        }
    }
    digits
        .trim()
        .parse::<usize>()
        .map(Segment::Index)
        .map_err(|_| invalid("array index must be a non-negative integer"))
}

pub(crate) fn render_segments(segments: &[Segment]) -> String {
    if segments.is_empty() {
        return "$".to_string();
    }
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Key(key) if key.contains(['.', '[', ']']) => {
                out.push_str(&format!("[\"{key}\"]"));
            }
            Segment::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            Segment::Index(index) => out.push_str(&format!("[{index}]")),
        }
    }
    out
}

fn describe_miss(segment: &Segment, current: &Value) -> String {
    match (segment, current) {
        (Segment::Key(key), Value::Object(_)) => format!("missing key `{key}`"),
        (Segment::Index(index), Value::Array(items)) => {
            format!("index {index} out of bounds (length {})", items.len())
        }
        (Segment::Key(_), other) => format!("expected object, found {}", JsonType::of(other)),
        (Segment::Index(_), other) => format!("expected array, found {}", JsonType::of(other)),
    }
}
