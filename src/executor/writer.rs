use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde_json::{json, Value};

use super::models::{Envelope, HttpRequest};

const REDACTED: &str = "[redacted]";
const SECRET_HEADERS: [&str; 3] = ["authorization", "proxy-authorization", "cookie"];

/// Writes one request/response exchange to
/// `<dir>/<suite>/<group>/<NNN>-<scenario>.json`. Credentials in the request
/// are redacted.
pub fn write_exchange(
    dir: &Path,
    suite: &str,
    group: &str,
    scenario_id: &str,
    request: &HttpRequest,
    envelope: &Envelope,
) -> Result<PathBuf> {
    let group_dir = dir
        .join(sanitize_component(suite))
        .join(sanitize_component(group));
    fs::create_dir_all(&group_dir)
        .with_context(|| format!("creating response directory {}", group_dir.display()))?;

    let index = next_index(&group_dir)?;
    let file_name = format!("{:03}-{}.json", index, sanitize_component(scenario_id));
    let path = group_dir.join(file_name);

    let document = json!({ "request": redacted_request(request), "response": envelope });
    let contents = serde_json::to_vec_pretty(&document).context("serializing exchange")?;
    fs::write(&path, contents)
        .with_context(|| format!("writing response body to {}", path.display()))?;
    Ok(path)
}

fn redacted_request(request: &HttpRequest) -> Value {
    let headers: Vec<(&str, &str)> = request
        .headers
        .iter()
        .map(|(name, value)| {
            let secret = SECRET_HEADERS
                .iter()
                .any(|header| name.eq_ignore_ascii_case(header));
            (name.as_str(), if secret { REDACTED } else { value.as_str() })
        })
        .collect();
    let mut body = request.body.clone();
    if let Some(body) = body.as_mut() {
        redact_secrets(body);
    }
    json!({
        "method": request.method,
        "url": request.url,
        "headers": headers,
        "body": body,
    })
}

/// Blanks string values under keys that look like passwords or secrets.
fn redact_secrets(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, item) in map.iter_mut() {
                let key = key.to_ascii_lowercase();
                if (key.contains("password") || key.contains("secret")) && item.is_string() {
                    *item = Value::String(REDACTED.to_string());
                } else {
                    redact_secrets(item);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_secrets),
        _ => {}
    }
}

/// First `limit` bytes as text, or hex when they are not UTF-8.
pub fn create_preview(bytes: &[u8], limit: usize) -> String {
    let slice = if bytes.len() > limit {
        &bytes[..limit]
    } else {
        bytes
    };
    match std::str::from_utf8(slice) {
        Ok(text) => text.to_string(),
        Err(_) => hex::encode(slice),
    }
}

pub(super) fn sanitize_component(value: &str) -> String {
    let sanitized: String = value
        .chars()
        .map(|ch| match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => ch,
            _ => '-',
        })
        .collect();
    let trimmed = sanitized.trim_matches('-');
    if trimmed.is_empty() {
        "scenario".to_string()
    } else {
        trimmed.to_string()
    }
}

pub(super) fn next_index(dir: &Path) -> Result<u32> {
    let mut max_index = 0;
    for entry in
        fs::read_dir(dir).with_context(|| format!("reading directory {}", dir.display()))?
    {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            if name.len() >= 3 && name.chars().take(3).all(|c| c.is_ascii_digit()) {
                if let Ok(value) = name[0..3].parse::<u32>() {
                    max_index = max_index.max(value + 1);
                }
            }
        }
    }
    Ok(max_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::HttpMethod;
    use anyhow::Result;
    use regex::Regex;
    use serde_json::Value;
    use tempfile::tempdir;

    fn sample_request() -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Post,
            url: "users".to_string(),
            headers: vec![("authorization".to_string(), "Bearer tok".to_string())],
            body: Some(json!({"name": "Ana", "password": "secret1"})),
        }
    }

    #[test]
    fn sanitize_component_replaces_invalid_characters() {
        assert_eq!(sanitize_component("User lifecycle!"), "User-lifecycle");
        assert_eq!(sanitize_component("***"), "scenario");
        assert_eq!(sanitize_component("login_ok"), "login_ok");
    }

    #[test]
    fn create_preview_handles_binary_data() {
        assert_eq!(create_preview("hello".as_bytes(), 10), "hello");
        assert_eq!(create_preview("hello".as_bytes(), 2), "he");
        assert_eq!(create_preview(&[0, 159, 146, 150], 4), "009f9296");
    }

    #[test]
    fn next_index_detects_existing_files() -> Result<()> {
        let temp = tempdir()?;
        std::fs::write(temp.path().join("000-first.json"), b"{}")?;
        std::fs::write(temp.path().join("010-second.json"), b"{}")?;

        assert_eq!(next_index(temp.path())?, 11);
        Ok(())
    }

    #[test]
    fn write_exchange_numbers_files_per_group() -> Result<()> {
        let temp = tempdir()?;
        let envelope = Envelope::new(201, json!({"id": 1}));

        let first = write_exchange(temp.path(), "movies", "User lifecycle", "register", &sample_request(), &envelope)?;
        let second = write_exchange(temp.path(), "movies", "User lifecycle", "login", &sample_request(), &envelope)?;

        assert_eq!(first.parent().unwrap(), temp.path().join("movies").join("User-lifecycle"));
        let pattern = Regex::new(r"^\d{3}-[a-z]+\.json$").unwrap();
        assert!(pattern.is_match(first.file_name().unwrap().to_str().unwrap()));
        assert_eq!(second.file_name().unwrap().to_str().unwrap(), "001-login.json");

        let written: Value = serde_json::from_slice(&std::fs::read(first)?)?;
        assert_eq!(written["request"]["method"], json!("POST"));
        assert_eq!(written["response"]["status"], json!(201));
        assert_eq!(written["response"]["statusText"], json!("Created"));
        Ok(())
    }

    #[test]
    fn write_exchange_redacts_credentials() -> Result<()> {
        let temp = tempdir()?;
        let envelope = Envelope::new(200, json!({"ok": true}));
        let path = write_exchange(temp.path(), "movies", "auth", "login", &sample_request(), &envelope)?;

        let raw = std::fs::read_to_string(&path)?;
        assert!(!raw.contains("Bearer tok"));
        assert!(!raw.contains("secret1"));
        let written: Value = serde_json::from_str(&raw)?;
        assert_eq!(written["request"]["headers"][0], json!(["authorization", "[redacted]"]));
        assert_eq!(written["request"]["body"]["name"], json!("Ana"));
        Ok(())
    }

    #[test]
    fn same_group_name_in_two_suites_gets_separate_directories() -> Result<()> {
        let temp = tempdir()?;
        let envelope = Envelope::new(200, Value::Null);
        let movies = write_exchange(temp.path(), "movies", "auth", "login", &sample_request(), &envelope)?;
        let reviews = write_exchange(temp.path(), "reviews", "auth", "login", &sample_request(), &envelope)?;

        assert_ne!(movies.parent(), reviews.parent());
        assert_eq!(reviews.file_name().unwrap().to_str().unwrap(), "000-login.json");
        Ok(())
    }
}
