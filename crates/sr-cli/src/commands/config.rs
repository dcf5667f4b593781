//! Config command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sr_core::config::{self, RelayConfig};

use crate::output::{print_info, print_success, print_warning};

fn resolve_path(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_config_path)
}

/// Load the relay configuration
///
/// An explicitly given file must exist and parse. The default file is
/// optional; if it is broken the defaults are used and a warning is logged.
pub fn load_relay_config(config_path: Option<&Path>) -> Result<RelayConfig> {
    if let Some(path) = config_path {
        return config::load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path));
    }

    let default_path = config::default_config_path();
    if !default_path.exists() {
        tracing::info!("Using default configuration");
        return Ok(RelayConfig::default());
    }

    Ok(config::load_config(&default_path).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
        RelayConfig::default()
    }))
}

/// Show the effective configuration
pub fn config_show(config_path: Option<&Path>) -> Result<()> {
    let path = resolve_path(config_path);
    if path.exists() {
        print_info(&format!("Configuration file: {:?}", path));
    } else {
        print_info(&format!("No file at {:?}, showing defaults", path));
    }

    let config = load_relay_config(config_path)?;
    let rendered = toml::to_string_pretty(&config).context("Failed to render config")?;
    println!("{}", rendered);
    Ok(())
}

pub fn config_path(config_path: Option<&Path>) {
    println!("{}", resolve_path(config_path).display());
}

/// Write the default configuration
pub fn config_init(config_path: Option<&Path>, force: bool) -> Result<()> {
    let path = resolve_path(config_path);

    if path.exists() && !force {
        print_warning(&format!("Config file already exists: {:?}", path));
        print_info("Use --force to overwrite");
        return Ok(());
    }

    config::save_config(&path, &RelayConfig::default())
        .with_context(|| format!("Failed to write config file: {:?}", path))?;
    print_success(&format!("Created configuration file: {:?}", path));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        config_init(Some(&path), false).unwrap();
        let loaded = load_relay_config(Some(&path)).unwrap();
        assert_eq!(loaded.remote_port, 2200);
        assert_eq!(loaded.term, "xterm");
    }

    #[test]
    fn test_init_does_not_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "remote_port = 22\n").unwrap();

        config_init(Some(&path), false).unwrap();
        assert_eq!(load_relay_config(Some(&path)).unwrap().remote_port, 22);

        config_init(Some(&path), true).unwrap();
        assert_eq!(load_relay_config(Some(&path)).unwrap().remote_port, 2200);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_relay_config(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
