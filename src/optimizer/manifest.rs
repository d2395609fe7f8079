//! Page and component manifests (`index.json`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Map;

/// File name of every page/component manifest.
pub const MANIFEST_FILE: &str = "index.json";

/// The part of a manifest the optimizer cares about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComponentManifest {
    /// Local tag name -> relative import path, in file order.
    #[serde(rename = "usingComponents", default)]
    pub using_components: Map<String, serde_json::Value>,
}

impl ComponentManifest {
    /// Load a manifest from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid manifest {}", path.display()))
    }

    /// Parse manifest JSON.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Import paths in declaration order. Non-string values are skipped.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.using_components.values().filter_map(|v| v.as_str())
    }
}

/// Strip every leading `../`, then every leading `./`.
pub fn normalize_reference(raw: &str) -> &str {
    let mut path = raw;
    while let Some(rest) = path.strip_prefix("../") {
        path = rest;
    }
    while let Some(rest) = path.strip_prefix("./") {
        path = rest;
    }
    path
}

/// The `n`th `/`-separated segment of a normalized reference.
pub fn segment(path: &str, n: usize) -> Option<&str> {
    path.split('/').nth(n).filter(|s| !s.is_empty())
}
