use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, bail, Context, Result};
use url::Url;

use crate::{
    env::{load_env_file, EnvMap},
    executor::{ExecutorOptions, DEFAULT_TIMEOUT},
    template,
};

use super::loader::{ContractpitConfig, LoadedConfig, ProfileConfig};

fn resolve_relative(base: &Path, value: &str) -> PathBuf {
    let candidate = Path::new(value);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    }
}

/// Settings given on the command line; they win over the configuration file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub profile: Option<String>,
    pub env_file: Option<PathBuf>,
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub response_output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct EnvironmentContext {
    pub base_dir: PathBuf,
    pub config_dir: PathBuf,
    pub variables: EnvMap,
    pub env_files: Vec<PathBuf>,
    pub profile_name: Option<String>,
    pub base_url: Option<Url>,
    pub timeout: Duration,
    pub default_headers: Vec<(String, String)>,
    pub response_output_dir: Option<PathBuf>,
}

impl EnvironmentContext {
    pub fn executor_options(&self) -> ExecutorOptions {
        ExecutorOptions {
            base_url: self.base_url.clone(),
            timeout: self.timeout,
            default_headers: self.default_headers.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnvironmentBuilder {
    base_dir: PathBuf,
    config_dir: PathBuf,
    config: Option<LoadedConfig>,
    overrides: Overrides,
}

impl EnvironmentBuilder {
    pub fn new(
        base_dir: PathBuf,
        config_dir: PathBuf,
        config: Option<LoadedConfig>,
        overrides: Overrides,
    ) -> Self {
        Self {
            base_dir,
            config_dir,
            config,
            overrides,
        }
    }

    pub fn build(&self) -> Result<EnvironmentContext> {
        let mut layers: Vec<ProfileConfig> = Vec::new();
        let mut profile_name = None;

        if let Some(cfg) = &self.config {
            layers.push(cfg.config.root_profile());
            if let Some(profile) = resolve_profile(&cfg.config, self.overrides.profile.as_deref())? {
                profile_name = Some(profile.name);
                layers.push(profile.config.clone());
            }
        } else if let Some(requested) = &self.overrides.profile {
            bail!("Unknown profile: {requested} (no configuration found)");
        }

        let mut variables = EnvMap::new();
        let mut default_headers_map = std::collections::BTreeMap::new();
        for layer in &layers {
            variables.extend(layer.variables.clone());
            default_headers_map.extend(layer.default_headers.clone());
        }

        let env_path = match &self.overrides.env_file {
            Some(explicit) => Some(explicit.clone()),
            None => layers
                .iter()
                .rev()
                .find_map(|layer| layer.env.as_deref())
                .map(|env| resolve_relative(&self.config_dir, env)),
        };
        let mut env_files = Vec::new();
        if let Some(path) = env_path {
            env_files.push(load_env_file(&path, &mut variables)?);
        }

        let base_url = match &self.overrides.base_url {
            Some(explicit) => Some(explicit.clone()),
            None => layers.iter().rev().find_map(|layer| layer.base_url.clone()),
        }
        .map(|raw| {
            let expanded = template::render_str(&raw, &variables)
                .map_err(|err| anyhow!("base url `{raw}`: {err}"))?;
            Url::parse(&expanded).with_context(|| format!("parsing base url `{expanded}`"))
        })
        .transpose()?;

        let timeout = self
            .overrides
            .timeout_ms
            .or_else(|| layers.iter().rev().find_map(|layer| layer.timeout_ms))
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT);

        let mut default_headers = Vec::with_capacity(default_headers_map.len());
        for (name, value) in default_headers_map {
            let rendered = template::render_str(&value, &variables)
                .map_err(|err| anyhow!("default header `{name}`: {err}"))?;
            default_headers.push((name, rendered));
        }

        let response_output_dir = match &self.overrides.response_output_dir {
            Some(explicit) if explicit.is_absolute() => Some(explicit.clone()),
            Some(explicit) => Some(self.base_dir.join(explicit)),
            None => layers
                .iter()
                .rev()
                .find_map(|layer| layer.response_output_dir.as_deref())
                .map(|dir| resolve_relative(&self.config_dir, dir)),
        };

        Ok(EnvironmentContext {
            base_dir: self.base_dir.clone(),
            config_dir: self.config_dir.clone(),
            variables,
            env_files,
            profile_name,
            base_url,
            timeout,
            default_headers,
            response_output_dir,
        })
    }
}

struct ResolvedProfile<'a> {
    name: String,
    config: &'a ProfileConfig,
}

fn resolve_profile<'a>(
    config: &'a ContractpitConfig,
    requested: Option<&str>,
) -> Result<Option<ResolvedProfile<'a>>> {
    if let Some(name) = requested {
        if let Some(profile) = config.profiles.get(name) {
            return Ok(Some(ResolvedProfile {
                name: name.to_string(),
                config: profile,
            }));
        }
        bail!("Unknown profile: {}", name);
    }

    if let Some(default) = &config.default_profile {
        if let Some(profile) = config.profiles.get(default) {
            return Ok(Some(ResolvedProfile {
                name: default.to_string(),
                config: profile,
            }));
        }
        bail!("Default profile `{}` is not defined", default);
    }

    Ok(config
        .profiles
        .iter()
        .next()
        .map(|(name, profile)| ResolvedProfile {
            name: name.to_string(),
            config: profile,
        }))
}
