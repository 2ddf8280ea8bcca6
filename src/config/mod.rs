mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./webm-remux.toml",
        "~/.config/webm-remux/config.toml",
        "/etc/webm-remux/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

fn validate_config(config: &Config) -> Result<()> {
    if config.output.writing_app.trim().is_empty() {
        anyhow::bail!("output.writing_app cannot be empty");
    }

    if config.output.max_output_bytes == 0 {
        anyhow::bail!("output.max_output_bytes must be greater than 0");
    }

    if !config.output.measure_first {
        tracing::warn!("output.measure_first is disabled; max_output_bytes is checked after writing");
    }

    Ok(())
}
