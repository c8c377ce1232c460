use std::{
    fs,
    io::Cursor,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::env::EnvMap;

/// Merges a dotenv file into `env`, later keys overriding earlier ones.
pub fn load_env_file(path: &Path, env: &mut EnvMap) -> Result<PathBuf> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading env file {}", path.display()))?;
    let iter = dotenvy::from_read_iter(Cursor::new(content));

    for item in iter {
        let (key, value) = item.with_context(|| format!("parsing env file {}", path.display()))?;
        env.insert(key, value);
    }

    Ok(path.to_path_buf())
}

/// Configured variables win over the process environment.
pub fn lookup_env(name: &str, env: &EnvMap) -> Option<String> {
    env.get(name).cloned().or_else(|| std::env::var(name).ok())
}
