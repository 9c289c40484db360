//! CLI configuration.
//!
//! Loaded from an optional TOML file, then overridden by environment
//! variables with the `OCTOFHIR_MERGE` prefix and `__` as the section
//! separator, e.g. `OCTOFHIR_MERGE__MERGE__INTERVAL=20ms`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use config::{Config, Environment, File};
use octofhir_merge::{MergeConfig, TransportConfig};
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "OCTOFHIR_MERGE";
const DEFAULT_CONFIG_FILE: &str = "octofhir-merge.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// GraphQL endpoint requests are sent to.
    pub endpoint: Option<String>,
    pub merge: MergeConfig,
    pub transport: TransportConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        self.merge.validate().map_err(|e| anyhow!(e))?;
        self.transport.validate().map_err(|e| anyhow!(e))?;
        if let Some(endpoint) = &self.endpoint {
            validate_endpoint(endpoint)?;
        }
        Ok(())
    }
}

/// Checks that `endpoint` is an absolute http(s) URL.
pub fn validate_endpoint(endpoint: &str) -> Result<()> {
    let url = url::Url::parse(endpoint).with_context(|| format!("Invalid endpoint '{endpoint}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("Endpoint must use http or https, got '{}'", url.scheme());
    }
    Ok(())
}

/// Loads the configuration from `path` (or `octofhir-merge.toml` in the
/// working directory, if present) and the process environment.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    load_config_with_env(path, None)
}

/// Like [`load_config`], reading overrides from `env` instead of the process
/// environment when given.
pub fn load_config_with_env(
    path: Option<&Path>,
    env: Option<HashMap<String, String>>,
) -> Result<AppConfig> {
    let mut builder = Config::builder();
    match path {
        Some(p) => {
            if !p.exists() {
                bail!("Config file not found: {}", p.display());
            }
            builder = builder.add_source(File::from(p.to_path_buf()));
        }
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                builder = builder.add_source(File::from(default_path));
            }
        }
    }
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .source(env),
    );

    let cfg: AppConfig = builder
        .build()
        .context("Failed to build configuration")?
        .try_deserialize()
        .context("Failed to deserialize configuration")?;
    cfg.validate()?;
    Ok(cfg)
}

/// Endpoint to send to: `--server` / `OCTOFHIR_MERGE_URL` first, then the
/// config file.
pub fn resolve_endpoint(cli_server: Option<&str>, cfg: &AppConfig) -> Result<String> {
    let endpoint = cli_server
        .or(cfg.endpoint.as_deref())
        .context("No endpoint configured. Use --server, set OCTOFHIR_MERGE_URL, or set `endpoint` in the config file")?;
    validate_endpoint(endpoint)?;
    Ok(endpoint.to_string())
}
