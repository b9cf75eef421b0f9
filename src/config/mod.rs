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

    // Try default locations
    let default_paths = [
        "./shrinkray.toml",
        "~/.config/shrinkray/config.toml",
        "/etc/shrinkray/config.toml",
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

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let encode = &config.encode;

    if !(encode.margin > 0.0 && encode.margin <= 1.0) {
        anyhow::bail!("encode.margin must be in (0, 1], got {}", encode.margin);
    }

    if encode.preset.trim().is_empty() {
        anyhow::bail!("encode.preset cannot be empty");
    }

    if encode.output_suffix.is_empty() {
        anyhow::bail!("encode.output_suffix cannot be empty; the output would overwrite the input");
    }

    if encode.output_suffix.contains(std::path::is_separator) {
        anyhow::bail!("encode.output_suffix cannot contain a path separator");
    }

    // Missing tool overrides are not fatal; lookup falls back to PATH.
    for (name, path) in [
        ("ffmpeg", &config.tools.ffmpeg_path),
        ("ffprobe", &config.tools.ffprobe_path),
    ] {
        if let Some(path) = path {
            if !path.exists() {
                tracing::warn!("Configured {} path does not exist: {:?}", name, path);
            }
        }
    }

    Ok(())
}
