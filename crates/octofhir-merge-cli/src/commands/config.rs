use anyhow::{Context, Result};

use crate::config::AppConfig;

pub fn show(cfg: &AppConfig) -> Result<()> {
    let text = toml::to_string_pretty(cfg).context("Failed to serialize configuration")?;
    print!("{text}");
    Ok(())
}
