//! Global context for unipack operations.
//!
//! Provides centralized access to the working directory, the global config
//! location, and output settings.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::project::PROJECT_FILE;
use crate::util::config::{self, Config};

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global unipack data (~/.unipack/)
    home: Option<PathBuf>,

    verbose: bool,

    color: bool,
}

impl GlobalContext {
    /// Create a new GlobalContext rooted at the process working directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Self {
        GlobalContext {
            cwd,
            home: config::global_config_dir(),
            verbose: false,
            color: true,
        }
    }

    /// Override the global data directory.
    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn set_color(&mut self, color: bool) {
        self.color = color;
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// The unipack home directory (~/.unipack/), if a home directory exists.
    pub fn home(&self) -> Option<&Path> {
        self.home.as_deref()
    }

    /// Path of the global configuration file.
    pub fn config_path(&self) -> Option<PathBuf> {
        self.home.as_ref().map(|h| h.join("config.toml"))
    }

    /// Load the global configuration, or defaults when absent.
    pub fn global_config(&self) -> Config {
        self.config_path()
            .map(|p| Config::load_or_default(&p))
            .unwrap_or_default()
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn color(&self) -> bool {
        self.color
    }

    /// Find `unipack.toml` starting from cwd and searching upward.
    pub fn find_project_file(&self) -> Option<PathBuf> {
        self.cwd
            .ancestors()
            .map(|dir| dir.join(PROJECT_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Resolve a possibly relative path against cwd.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }
}
