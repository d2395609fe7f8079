//! Textual rewriting of relative path references in compiled bundles.
//!
//! References are matched with a regex over raw JS/JSON text. The build
//! output is bundler-generated, so a full module parse is not needed.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use regex::Regex;

use super::batch::BatchResult;
use super::errors::OptimizeError;
use crate::util::fs::glob_files;

/// Default pattern for references from vendor files to the shared runtime.
pub const DEFAULT_VENDOR_BUNDLE_PATTERN: &str = r"(\.\./)+common/vendor\.js";

/// Default pattern for references from subpackage files into `vendor_dir_name`.
pub fn default_vendor_reference_pattern(vendor_dir_name: &str) -> String {
    format!(r#"(\.\./)+{}/[^"']*"#, regex::escape(vendor_dir_name))
}

/// How a matched reference changes depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthShift {
    /// Drop one leading `../`.
    Up,
    /// Add one leading `../`.
    Down,
}

/// A reference pattern plus the depth change applied to every match.
#[derive(Debug, Clone)]
pub struct RelativePathRewriter {
    pattern: Regex,
    shift: DepthShift,
    extensions: Vec<&'static str>,
}

/// Files scanned by a rewrite pass.
#[derive(Debug, Default)]
pub struct RewriteOutcome {
    /// Files whose content changed and were written back.
    pub files: BatchResult<PathBuf>,
    /// Files scanned without a match (left untouched).
    pub unchanged: usize,
}

impl RelativePathRewriter {
    pub fn new(pattern: &str, shift: DepthShift) -> Result<Self, OptimizeError> {
        let pattern = Regex::new(pattern).map_err(|source| OptimizeError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        Ok(RelativePathRewriter {
            pattern,
            shift,
            extensions: vec!["js"],
        })
    }

    /// Also scan files with these extensions.
    pub fn with_extensions(mut self, extensions: &[&'static str]) -> Self {
        self.extensions = extensions.to_vec();
        self
    }

    /// Rewrite every match in `content`; borrowed when nothing matched.
    pub fn rewrite<'a>(&self, content: &'a str) -> Cow<'a, str> {
        self.pattern.replace_all(content, |caps: &regex::Captures<'_>| {
            let matched = &caps[0];
            match self.shift {
                DepthShift::Up => matched.strip_prefix("../").unwrap_or(matched).to_string(),
                DepthShift::Down => format!("../{}", matched),
            }
        })
    }

    /// Rewrite one file; returns whether it was written.
    pub fn rewrite_file(&self, path: &Path) -> anyhow::Result<bool> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        match self.rewrite(&content) {
            Cow::Borrowed(_) => Ok(false),
            Cow::Owned(updated) => {
                fs::write(path, updated)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                Ok(true)
            }
        }
    }

    /// Rewrite every matching file under `dir`. Failures are recorded per
    /// file and never stop the pass.
    pub fn rewrite_dir(&self, dir: &Path) -> RewriteOutcome {
        let mut outcome = RewriteOutcome::default();

        let patterns: Vec<String> = self
            .extensions
            .iter()
            .map(|ext| format!("**/*.{}", ext))
            .collect();

        let files = match glob_files(dir, &patterns) {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!("failed to scan {}: {:#}", dir.display(), e);
                outcome.files.push_err(dir.to_path_buf(), e);
                return outcome;
            }
        };

        for file in files {
            match self.rewrite_file(&file) {
                Ok(true) => {
                    tracing::debug!("rewrote {}", file.display());
                    outcome.files.push_ok(file);
                }
                Ok(false) => outcome.unchanged += 1,
                Err(e) => {
                    tracing::warn!("{:#}", e);
                    outcome.files.push_err(file, e);
                }
            }
        }

        outcome
    }
}

impl RewriteOutcome {
    pub fn extend(&mut self, other: RewriteOutcome) {
        self.files.extend(other.files);
        self.unchanged += other.unchanged;
    }
}
