//! Configuration file support for unipack.
//!
//! unipack reads optimizer defaults from two locations:
//! - Global: `~/.unipack/config.toml` - User-wide defaults
//! - Project: the `[optimize]` table of `unipack.toml`
//!
//! Project config takes precedence over global config, and command line
//! flags take precedence over both.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::optimizer::OptimizeOptions;

/// Global unipack configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Optimizer defaults
    pub optimize: OptimizeConfig,
}

/// Optimizer settings. Every field is optional so layers can be merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeConfig {
    /// Build output directory (e.g., ./dist/build/mp-weixin)
    pub project_dist_path: Option<PathBuf>,

    /// Shared vendor directory name (e.g., node-modules)
    pub origin_dir_name: Option<String>,

    /// Subpackage directory prefix (e.g., pages)
    pub target_dir_tag: Option<String>,

    /// Only prune vendor components in the main subpackage
    pub only_optimize_main_package: Option<bool>,

    /// Walk vendor pages reached from other vendor pages
    pub deep_page_closure: Option<bool>,

    /// Regex for vendor references to the shared runtime bundle
    pub vendor_path_pattern: Option<String>,

    /// Regex for subpackage references into the vendor directory
    pub node_modules_path_pattern: Option<String>,
}

impl OptimizeConfig {
    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: OptimizeConfig) {
        if other.project_dist_path.is_some() {
            self.project_dist_path = other.project_dist_path;
        }
        if other.origin_dir_name.is_some() {
            self.origin_dir_name = other.origin_dir_name;
        }
        if other.target_dir_tag.is_some() {
            self.target_dir_tag = other.target_dir_tag;
        }
        if other.only_optimize_main_package.is_some() {
            self.only_optimize_main_package = other.only_optimize_main_package;
        }
        if other.deep_page_closure.is_some() {
            self.deep_page_closure = other.deep_page_closure;
        }
        if other.vendor_path_pattern.is_some() {
            self.vendor_path_pattern = other.vendor_path_pattern;
        }
        if other.node_modules_path_pattern.is_some() {
            self.node_modules_path_pattern = other.node_modules_path_pattern;
        }
    }

    /// Resolve into optimizer options, filling gaps with built-in defaults.
    pub fn to_options(&self) -> OptimizeOptions {
        let defaults = OptimizeOptions::default();
        OptimizeOptions {
            project_dist_path: self
                .project_dist_path
                .clone()
                .unwrap_or(defaults.project_dist_path),
            origin_dir_name: self
                .origin_dir_name
                .clone()
                .unwrap_or(defaults.origin_dir_name),
            target_dir_tag: self
                .target_dir_tag
                .clone()
                .unwrap_or(defaults.target_dir_tag),
            only_optimize_main_package: self
                .only_optimize_main_package
                .unwrap_or(defaults.only_optimize_main_package),
            deep_page_closure: self
                .deep_page_closure
                .unwrap_or(defaults.deep_page_closure),
            vendor_path_pattern: self.vendor_path_pattern.clone(),
            node_modules_path_pattern: self.node_modules_path_pattern.clone(),
        }
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        self.optimize.merge(other.optimize);
    }
}

/// Get the global unipack config directory (~/.unipack).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".unipack"))
}

/// Get the global config path (~/.unipack/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Merge optimizer settings from every layer.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (`[optimize]` in unipack.toml)
/// 2. Global config (~/.unipack/config.toml)
/// 3. Defaults
pub fn load_optimize_config(global_path: Option<&Path>, project: Option<&OptimizeConfig>) -> OptimizeConfig {
    let mut config = Config::default();

    if let Some(path) = global_path {
        config.merge(Config::load_or_default(path));
    }

    if let Some(project) = project {
        config.optimize.merge(project.clone());
    }

    config.optimize
}
