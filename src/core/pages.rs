//! `src/pages.json` of a uni-app project.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::util::fs::read_to_string;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PagesJson {
    pub sub_packages: Vec<SubPackage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubPackage {
    pub root: String,
    /// Plugin alias -> plugin settings, in declaration order
    pub plugins: serde_json::Map<String, serde_json::Value>,
}

impl SubPackage {
    /// `export` files of this subpackage's plugins, in declaration order.
    pub fn plugin_exports(&self) -> Vec<&str> {
        self.plugins
            .values()
            .filter_map(|plugin| plugin.get("export").and_then(|e| e.as_str()))
            .collect()
    }
}

impl PagesJson {
    pub fn load(path: &Path) -> Result<Self> {
        let content = read_to_string(path)?;
        Self::parse(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(&strip_line_comments(content))?)
    }
}

/// Drop `// ...` comments that are outside string literals.
pub fn strip_line_comments(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                // Skip to end of line, keep the newline
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            _ => out.push(c),
        }
    }

    out
}
