// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Configuration file for kube-workload-check
//!
//! Holds default filters for hosts that run the check from a scheduler
//! with a fixed command line. All data is stored under ~/.kube-workload-check/:
//! - ~/.kube-workload-check/config.json - default filters and tolerance
//! - ~/.kube-workload-check/log/ - rotated log files

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the base directory (~/.kube-workload-check/)
pub fn base_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".kube-workload-check"))
        .context("Could not determine home directory")
}

/// Defaults applied when the matching command line option is not given
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub include_namespaces: Vec<String>,
    pub exclude_namespaces: Vec<String>,
    pub include_nodes: Vec<String>,
    pub exclude_nodes: Vec<String>,
    /// Seconds a CronJob's last run may drift from its expected run
    pub schedule_tolerance_secs: u64,
}

impl Config {
    /// Load config from `path`, or from the default location
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::read(path),
            None => {
                let path = Self::config_path()?;
                if path.exists() {
                    Self::read(&path)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Get the config file path (~/.kube-workload-check/config.json)
    pub fn config_path() -> Result<PathBuf> {
        Ok(base_dir()?.join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.include_namespaces.is_empty());
        assert!(config.exclude_nodes.is_empty());
        assert_eq!(config.schedule_tolerance_secs, 0);
    }

    #[test]
    fn test_config_deserialize() {
        let json = r#"{
            "exclude_namespaces": ["kube-system", "monitoring"],
            "include_nodes": ["worker-1"],
            "schedule_tolerance_secs": 60
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.exclude_namespaces, vec!["kube-system", "monitoring"]);
        assert_eq!(config.include_nodes, vec!["worker-1"]);
        assert!(config.include_namespaces.is_empty());
        assert_eq!(config.schedule_tolerance_secs, 60);
    }

    #[test]
    fn test_config_deserialize_empty() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_load_explicit_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        fs::write(&config_path, r#"{"exclude_namespaces": ["dev"]}"#).unwrap();

        let config = Config::load(Some(&config_path)).unwrap();
        assert_eq!(config.exclude_namespaces, vec!["dev"]);
    }

    #[test]
    fn test_config_load_missing_explicit_path() {
        let temp_dir = TempDir::new().unwrap();
        let err = Config::load(Some(&temp_dir.path().join("absent.json"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_config_load_invalid_json() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        fs::write(&config_path, r#"{"schedule_tolerance_secs": "soon"}"#).unwrap();

        let err = Config::load(Some(&config_path)).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
