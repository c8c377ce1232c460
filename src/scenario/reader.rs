use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::fs;
use walkdir::WalkDir;

use crate::config::CONFIG_FILE;

use super::model::Suite;

/// Fixture and capture names: no path syntax, so `{{name.field}}` stays
/// unambiguous.
static PLAIN_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]*$").expect("valid regex"));

pub async fn load_suite(path: &Path) -> Result<Suite> {
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading suite file {}", path.display()))?;

    parse_suite(&raw).with_context(|| format!("loading suite {}", path.display()))
}

pub async fn load_suites(paths: &[PathBuf]) -> Result<Vec<Suite>> {
    let mut suites = Vec::new();
    for target in paths {
        for file in discover_suites(target)? {
            suites.push(load_suite(&file).await?);
        }
    }
    Ok(suites)
}

pub fn parse_suite(contents: &str) -> Result<Suite> {
    let suite: Suite = serde_json::from_str(contents).context("parsing suite JSON")?;
    validate_suite(&suite)?;
    Ok(suite)
}

/// A file is returned as-is; directories are walked for `*.json` suites,
/// skipping the configuration file.
pub fn discover_suites(target: &Path) -> Result<Vec<PathBuf>> {
    if target.is_file() {
        return Ok(vec![target.to_path_buf()]);
    }
    if !target.is_dir() {
        bail!("suite path {} does not exist", target.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(target).follow_links(true) {
        let entry = entry.with_context(|| format!("walking {}", target.display()))?;
        let path = entry.path();
        let is_json = path.extension().map_or(false, |ext| ext == "json");
        let is_config = path.file_name().map_or(false, |name| name == CONFIG_FILE);
        if entry.file_type().is_file() && is_json && !is_config {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

pub fn validate_suite(suite: &Suite) -> Result<()> {
    let mut group_names = HashSet::new();
    for group in &suite.groups {
        if group.name.trim().is_empty() {
            bail!("suite `{}` has a group without a name", suite.name);
        }
        if !group_names.insert(group.name.as_str()) {
            bail!("duplicate group `{}` in suite `{}`", group.name, suite.name);
        }

        for name in group.fixtures.keys() {
            if !is_plain_name(name) {
                bail!("group `{}`: invalid fixture name `{name}`", group.name);
            }
        }

        let mut seen: Vec<&str> = Vec::new();
        for scenario in &group.scenarios {
            let context = format!("group `{}`, scenario `{}`", group.name, scenario.id);
            if scenario.id.trim().is_empty() {
                bail!("group `{}` has a scenario without an id", group.name);
            }
            if seen.contains(&scenario.id.as_str()) {
                bail!("{context}: duplicate scenario id");
            }
            for dependency in &scenario.depends_on {
                if dependency == &scenario.id {
                    bail!("{context}: a scenario cannot depend on itself");
                }
                if !seen.contains(&dependency.as_str()) {
                    bail!("{context}: `dependsOn` must name an earlier scenario, found `{dependency}`");
                }
            }
            let explicit_auth = scenario
                .headers
                .keys()
                .any(|name| name.eq_ignore_ascii_case("authorization"));
            if scenario.bearer.is_some() && explicit_auth {
                bail!("{context}: `bearer` conflicts with an explicit Authorization header");
            }
            for capture in &scenario.capture {
                if !is_plain_name(&capture.variable) {
                    bail!("{context}: invalid capture variable `{}`", capture.variable);
                }
            }
            scenario
                .references()
                .with_context(|| format!("{context}: malformed template"))?;
            seen.push(scenario.id.as_str());
        }
    }
    Ok(())
}

/// Variable names that can be captured or declared: no path syntax.
fn is_plain_name(name: &str) -> bool {
    PLAIN_NAME.is_match(name)
}
