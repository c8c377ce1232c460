use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const CONFIG_FILE: &str = "contractpit.json";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfileConfig {
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub env: Option<String>,
    pub variables: BTreeMap<String, String>,
    pub default_headers: BTreeMap<String, String>,
    pub response_output_dir: Option<String>,
}

/// Root-level keys apply to every profile; a selected profile overrides them.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ContractpitConfig {
    pub profiles: BTreeMap<String, ProfileConfig>,
    pub default_profile: Option<String>,
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub env: Option<String>,
    pub variables: BTreeMap<String, String>,
    pub default_headers: BTreeMap<String, String>,
    pub response_output_dir: Option<String>,
}

impl ContractpitConfig {
    pub fn root_profile(&self) -> ProfileConfig {
        ProfileConfig {
            base_url: self.base_url.clone(),
            timeout_ms: self.timeout_ms,
            env: self.env.clone(),
            variables: self.variables.clone(),
            default_headers: self.default_headers.clone(),
            response_output_dir: self.response_output_dir.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ContractpitConfig,
    pub path: PathBuf,
    pub dir: PathBuf,
}

/// Loads `contractpit.json` from a directory, or the given file. A missing
/// file is not an error.
pub fn load_config(target: &Path) -> Result<Option<LoadedConfig>> {
    let cwd = std::env::current_dir()?;
    let resolved = if target.is_absolute() {
        target.to_path_buf()
    } else {
        cwd.join(target)
    };

    let (file_path, dir) = if resolved.is_dir() {
        (resolved.join(CONFIG_FILE), resolved)
    } else {
        let dir = resolved
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or(cwd);
        (resolved, dir)
    };

    if !file_path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(&file_path)
        .with_context(|| format!("reading config {}", file_path.display()))?;

    let config: ContractpitConfig = serde_json::from_str(&contents)
        .with_context(|| format!("parsing config {}", file_path.display()))?;

    Ok(Some(LoadedConfig {
        config,
        path: file_path,
        dir,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn returns_none_when_config_missing() -> Result<()> {
        let temp = tempdir()?;
        let result = load_config(temp.path())?;
        assert!(result.is_none());
        Ok(())
    }

    #[test]
    fn loads_config_from_directory() -> Result<()> {
        let temp = tempdir()?;
        let config_path = temp.path().join(CONFIG_FILE);
        std::fs::write(
            &config_path,
            r#"{"baseUrl": "http://localhost:3000", "profiles": {"ci": {"timeoutMs": 5000}}}"#,
        )?;

        let result = load_config(temp.path())?.expect("config should load");
        assert_eq!(result.path, config_path);
        assert_eq!(result.dir, temp.path());
        assert_eq!(result.config.base_url.as_deref(), Some("http://localhost:3000"));
        assert_eq!(result.config.profiles["ci"].timeout_ms, Some(5000));
        Ok(())
    }

    #[test]
    fn reports_parse_errors_with_path() -> Result<()> {
        let temp = tempdir()?;
        std::fs::write(temp.path().join(CONFIG_FILE), "{not json")?;
        let err = load_config(temp.path()).unwrap_err();
        assert!(err.to_string().contains("parsing config"));
        Ok(())
    }
}
