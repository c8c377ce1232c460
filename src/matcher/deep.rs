use serde_json::{Number, Value};

use super::{
    kinds::{compact, JsonType},
    path::{render_segments, Segment},
};

/// Returns a description of the first structural difference, or `None` when
/// `actual` matches `expected`.
pub fn deep_diff(expected: &Value, actual: &Value) -> Option<String> {
    let mut trail = Vec::new();
    diff_at(expected, actual, &mut trail)
}

pub fn deep_equal(expected: &Value, actual: &Value) -> bool {
    deep_diff(expected, actual).is_none()
}

fn diff_at(expected: &Value, actual: &Value, trail: &mut Vec<Segment>) -> Option<String> {
    match (expected, actual) {
        (Value::Object(want), Value::Object(got)) => {
            if let Some(key) = want.keys().find(|key| !got.contains_key(*key)) {
                trail.push(Segment::Key(key.clone()));
                return Some(format!("missing key at `{}`", render_segments(trail)));
            }
            if let Some(key) = got.keys().find(|key| !want.contains_key(*key)) {
                trail.push(Segment::Key(key.clone()));
                return Some(format!("unexpected key at `{}`", render_segments(trail)));
            }
            for (key, want_value) in want {
                trail.push(Segment::Key(key.clone()));
                if let Some(diff) = diff_at(want_value, &got[key], trail) {
                    return Some(diff);
                }
                trail.pop();
            }
            None
        }
        (Value::Array(want), Value::Array(got)) => {
            if want.len() != got.len() {
                return Some(format!(
                    "array length differs at `{}`: expected {}, found {}",
                    render_segments(trail),
                    want.len(),
                    got.len()
                ));
            }
            for (index, (want_item, got_item)) in want.iter().zip(got).enumerate() {
                trail.push(Segment::Index(index));
                if let Some(diff) = diff_at(want_item, got_item, trail) {
                    return Some(diff);
                }
                trail.pop();
            }
            None
        }
        (Value::Number(want), Value::Number(got)) => {
            if numbers_equal(want, got) {
                None
            } else {
                Some(mismatch(expected, actual, trail))
            }
        }
        _ if expected == actual => None,
        _ if JsonType::of(expected) != JsonType::of(actual) => Some(format!(
            "type differs at `{}`: expected {}, found {}",
            render_segments(trail),
            JsonType::of(expected),
            JsonType::of(actual)
        )),
        _ => Some(mismatch(expected, actual, trail)),
    }
}

fn mismatch(expected: &Value, actual: &Value, trail: &[Segment]) -> String {
    format!(
        "value differs at `{}`: expected {}, found {}",
        render_segments(trail),
        compact(expected),
        compact(actual)
    )
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
