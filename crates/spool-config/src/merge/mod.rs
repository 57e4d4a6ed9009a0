//! Configuration layering, file discovery, and environment overrides

use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};
use spool_core::error::SpoolError;

use crate::json::PackageJson;
use crate::toml::{validate_config, SpoolToml};
use crate::ConfigResult;

/// Project configuration file name
pub const PROJECT_CONFIG: &str = "spool.toml";

/// Environment variables spool reads
const ENV_PREFIX: &str = "SPOOL_";

/// Main configuration loading interface
pub struct ConfigLoader {
    /// Current working directory
    cwd: Utf8PathBuf,
}

/// Configuration layering and merging.
///
/// File layers are applied in insertion order, then environment overrides,
/// then CLI overrides.
pub struct ConfigLayering {
    layers: Vec<(SpoolToml, ConfigSource)>,
    env_overrides: HashMap<String, String>,
    cli_overrides: HashMap<String, String>,
}

/// Configuration source tracking
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// ~/.spool/config.toml
    Global(Utf8PathBuf),
    /// Project spool.toml
    Project(Utf8PathBuf),
    /// publishConfig in package.json
    PackageJson(Utf8PathBuf),
    /// Environment variable
    Environment(String),
    /// CLI flag
    CommandLine,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new(cwd: Utf8PathBuf) -> Self {
        Self { cwd }
    }

    /// Find a file in the working directory or any parent
    pub fn resolve_config_path(&self, filename: &str) -> Option<Utf8PathBuf> {
        let mut current = self.cwd.as_path();

        loop {
            let config_path = current.join(filename);
            if config_path.exists() {
                return Some(config_path);
            }

            current = current.parent()?;
        }
    }

    /// Load the nearest spool.toml, if there is one
    pub async fn load_project_config(&self) -> ConfigResult<Option<(SpoolToml, ConfigSource)>> {
        match self.resolve_config_path(PROJECT_CONFIG) {
            Some(path) => {
                let config = crate::toml::load_from_file(&path).await?;
                Ok(Some((config, ConfigSource::Project(path))))
            },
            None => Ok(None),
        }
    }

    /// Load ~/.spool/config.toml, if there is one
    pub async fn load_global_config(&self) -> ConfigResult<Option<(SpoolToml, ConfigSource)>> {
        let home_dir = dirs::home_dir().ok_or_else(|| SpoolError::ConfigValidation {
            field: "home_dir".to_string(),
            reason: "Could not determine home directory".to_string(),
        })?;

        let global_config_path = Utf8PathBuf::try_from(home_dir)
            .map_err(|e| SpoolError::ConfigValidation {
                field: "home_dir".to_string(),
                reason: format!("Invalid home directory path: {}", e),
            })?
            .join(".spool")
            .join("config.toml");

        if global_config_path.exists() {
            let config = crate::toml::load_from_file(&global_config_path).await?;
            Ok(Some((config, ConfigSource::Global(global_config_path))))
        } else {
            Ok(None)
        }
    }

    /// Load package.json from `dir`, relative to the working directory
    pub async fn load_package_json(&self, dir: &Utf8Path) -> ConfigResult<(PackageJson, Utf8PathBuf)> {
        let path = self.cwd.join(dir).join("package.json");
        if !path.exists() {
            return Err(SpoolError::ConfigValidation {
                field: "package.json".to_string(),
                reason: format!("No package.json found at {}", path),
            });
        }
        let package = crate::json::load_from_file(&path).await?;
        Ok((package, path))
    }
}

impl ConfigLayering {
    /// Create a new configuration layering system
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            env_overrides: HashMap::new(),
            cli_overrides: HashMap::new(),
        }
    }

    /// Add a file layer above the ones already added
    pub fn with_layer(mut self, config: SpoolToml, source: ConfigSource) -> Self {
        self.layers.push((config, source));
        self
    }

    pub fn with_env_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.env_overrides = overrides;
        self
    }

    pub fn with_cli_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.cli_overrides = overrides;
        self
    }

    /// Sources that contributed, lowest priority first
    pub fn sources(&self) -> Vec<ConfigSource> {
        let mut sources: Vec<ConfigSource> =
            self.layers.iter().map(|(_, source)| source.clone()).collect();
        let mut env: Vec<&String> = self.env_overrides.keys().collect();
        env.sort();
        sources.extend(env.into_iter().map(|key| ConfigSource::Environment(key.clone())));
        if !self.cli_overrides.is_empty() {
            sources.push(ConfigSource::CommandLine);
        }
        sources
    }

    /// Merge every layer into one validated configuration
    pub fn resolve(self) -> ConfigResult<SpoolToml> {
        let mut merged = self
            .layers
            .into_iter()
            .fold(SpoolToml::default(), |base, (layer, _)| base.overlay(layer));

        // Apply environment variable overrides
        Self::apply_env_overrides(&mut merged, &self.env_overrides)?;

        // Apply CLI flag overrides (highest priority)
        Self::apply_cli_overrides(&mut merged, &self.cli_overrides)?;

        validate_config(&merged)?;
        Ok(merged)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(
        config: &mut SpoolToml,
        overrides: &HashMap<String, String>,
    ) -> ConfigResult<()> {
        for (key, value) in overrides {
            match key.as_str() {
                "SPOOL_REGISTRY" => config.registry.url = Some(value.clone()),
                "SPOOL_TOKEN" => config.registry.token = Some(value.clone()),
                "SPOOL_USERNAME" => config.registry.username = Some(value.clone()),
                "SPOOL_PASSWORD" => config.registry.password = Some(value.clone()),
                "SPOOL_EMAIL" => config.registry.email = Some(value.clone()),
                "SPOOL_ALWAYS_AUTH" => {
                    config.registry.always_auth = Some(parse_flag(key, value)?);
                },
                "SPOOL_FETCH_RETRIES" => {
                    config.retry.retries = Some(parse_count(key, value)?);
                },
                _ => {
                    // Unknown environment variable, ignore
                },
            }
        }

        Ok(())
    }

    /// Apply CLI flag overrides
    fn apply_cli_overrides(
        config: &mut SpoolToml,
        overrides: &HashMap<String, String>,
    ) -> ConfigResult<()> {
        for (key, value) in overrides {
            match key.as_str() {
                "registry" => config.registry.url = Some(value.clone()),
                "token" => config.registry.token = Some(value.clone()),
                "tag" => config.publish.tag = Some(value.clone()),
                "access" => config.publish.access = Some(value.clone()),
                "retries" => config.retry.retries = Some(parse_count("--retries", value)?),
                _ => {
                    // Unknown CLI override, ignore
                },
            }
        }

        Ok(())
    }

    /// Collect environment variable overrides
    pub fn collect_env_overrides() -> HashMap<String, String> {
        std::env::vars()
            .filter(|(key, _)| key.starts_with(ENV_PREFIX))
            .collect()
    }
}

impl Default for ConfigLayering {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_flag(field: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" | "" => Ok(false),
        _ => Err(SpoolError::ConfigValidation {
            field: field.to_string(),
            reason: format!("expected true or false, got '{}'", value),
        }),
    }
}

fn parse_count(field: &str, value: &str) -> ConfigResult<u32> {
    value
        .trim()
        .parse()
        .map_err(|e| SpoolError::ConfigValidation {
            field: field.to_string(),
            reason: format!("Invalid count '{}': {}", value, e),
        })
}
