//! Copy subpackage plugin export files into the build output.
//!
//! Mini-program plugins declared on a subpackage in `src/pages.json` may name
//! an `export` file. The compiler does not emit it, so it is copied from
//! `src/` into `<dist>/<subpackage root>/` after the build.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::pages::PagesJson;
use crate::optimizer::BatchResult;
use crate::util::fs::ensure_dir;

/// Where `pages.json` and plugin sources live, relative to the project.
pub const SOURCE_DIR: &str = "src";

#[derive(Debug, Default)]
pub struct CopyPluginReport {
    /// Destination paths written, or the exports that failed to copy
    pub copies: BatchResult<PathBuf>,
    /// Export sources that do not exist
    pub missing: Vec<PathBuf>,
}

/// Copy every plugin export of `<project>/src/pages.json` into `dist`.
pub fn copy_plugin_exports(project_dir: &Path, dist: &Path) -> Result<CopyPluginReport> {
    let src = project_dir.join(SOURCE_DIR);
    let pages = PagesJson::load(&src.join("pages.json"))?;
    let mut report = CopyPluginReport::default();

    for sub in &pages.sub_packages {
        for export in sub.plugin_exports() {
            let from = src.join(export);
            let to = dist.join(&sub.root).join(export);

            if !from.is_file() {
                tracing::warn!("plugin export {} does not exist", from.display());
                report.missing.push(from);
                continue;
            }

            let result = copy_file(&from, &to);
            if let Err(e) = &result {
                tracing::warn!("failed to copy {}: {:#}", from.display(), e);
            }
            report.copies.record(to, result);
        }
    }

    Ok(report)
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        ensure_dir(parent)?;
    }
    fs::copy(from, to)
        .with_context(|| format!("failed to copy {} to {}", from.display(), to.display()))?;
    Ok(())
}
