//! Text transforms applied to template files while materializing an app.

pub mod code_custom_if;
pub mod code_inject;
pub mod condition;

use anyhow::{Context, Result};
use glob::Pattern;

pub use code_custom_if::code_custom_if;
pub use code_inject::code_inject;
pub use condition::{Condition, ConditionError};

use crate::core::project::{LoaderConfig, LoaderKind};
use crate::core::App;

/// A loader with its path rules compiled.
#[derive(Debug, Clone)]
pub struct Loader {
    kind: LoaderKind,
    rules: Vec<Pattern>,
}

impl Loader {
    pub fn new(config: &LoaderConfig) -> Result<Self> {
        let rules = config
            .rules
            .iter()
            .map(|rule| Pattern::new(rule).with_context(|| format!("invalid loader rule `{}`", rule)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Loader {
            kind: config.kind,
            rules,
        })
    }

    pub fn kind(&self) -> LoaderKind {
        self.kind
    }

    /// Whether `rel_path` (slash-separated, template-relative) is handled.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.rules.iter().any(|rule| rule.matches(rel_path))
    }

    pub fn apply(&self, source: &str, app: &App) -> Result<String> {
        match self.kind {
            LoaderKind::CodeInject => Ok(code_inject(source, app)),
            LoaderKind::CodeCustomIf => Ok(code_custom_if(source, app)?),
        }
    }
}

/// Compile every configured loader, in order.
pub fn compile_loaders(configs: &[LoaderConfig]) -> Result<Vec<Loader>> {
    configs.iter().map(Loader::new).collect()
}

/// Run every matching loader over `content`, in configuration order.
///
/// Files that are not UTF-8 pass through untouched.
pub fn apply_loaders(loaders: &[Loader], rel_path: &str, content: Vec<u8>, app: &App) -> Result<Vec<u8>> {
    let matching: Vec<&Loader> = loaders.iter().filter(|l| l.matches(rel_path)).collect();
    if matching.is_empty() {
        return Ok(content);
    }

    let mut text = match String::from_utf8(content) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("skipping loaders for non-UTF-8 file {}", rel_path);
            return Ok(e.into_bytes());
        }
    };

    for loader in matching {
        text = loader
            .apply(&text, app)
            .with_context(|| format!("{:?} loader failed on {}", loader.kind(), rel_path))?;
    }

    Ok(text.into_bytes())
}
