//! Configured apps and their derived identities.
//!
//! Every `[[apps]]` entry of `unipack.toml` becomes an [`App`] with a stable
//! key, a scoped npm package name, a directory under `apps_dir` and a sign
//! color used to tell interleaved output apart.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ordered environment values (`KEY = value`).
pub type EnvMap = serde_json::Map<String, serde_json::Value>;

/// Sign colors assigned to apps by index.
pub const SIGN_COLORS: &[&str] = &[
    "#ff6b6b", "#4ecdc4", "#ffa94d", "#a9e34b", "#74c0fc", "#da77f2", "#ffd43b", "#63e6be",
    "#ff8787", "#91a7ff", "#f783ac", "#38d9a9", "#e599f7", "#ffc078", "#66d9e8", "#b2f2bb",
];

/// Sign color for apps beyond the palette.
pub const FALLBACK_SIGN_COLOR: &str = "#f9ed69";

/// One `[[apps]]` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,

    /// Grouping directory under `apps_dir` (may be nested, e.g. `clinic/north`)
    pub dir_name: String,

    pub description: String,

    /// Mini-program appid written into `src/manifest.json`
    pub appid: Option<String>,

    /// WeChat-specific appid; wins over `appid`
    pub wx_appid: Option<String>,

    /// Values shared by every environment
    pub common_env: EnvMap,

    pub envs: Vec<AppEnv>,
}

/// One named environment of an app (`development`, `production`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppEnv {
    pub name: String,
    pub description: String,
    pub value: EnvMap,
}

/// An app with its derived identity.
#[derive(Debug, Clone, PartialEq)]
pub struct App {
    pub index: usize,
    /// `<dir_name>-<name>` with `/` flattened to `-`
    pub key: String,
    /// `@<root>-app/<key>`, lowercased
    pub package_name: String,
    pub path: PathBuf,
    pub sign_color: &'static str,
    pub dir_name: String,
    pub config: AppConfig,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("duplicate app package name `{package_name}`; check the dir_name/name of your apps")]
    DuplicatePackageName { package_name: String },

    #[error("app `{0}` has no name")]
    MissingName(usize),

    #[error("no app matches `{0}`")]
    NotFound(String),
}

impl App {
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn description(&self) -> &str {
        &self.config.description
    }

    /// Description, or the package name when empty.
    pub fn label(&self) -> &str {
        if self.config.description.is_empty() {
            &self.package_name
        } else {
            &self.config.description
        }
    }

    pub fn envs(&self) -> &[AppEnv] {
        &self.config.envs
    }

    pub fn env(&self, name: &str) -> Option<&AppEnv> {
        self.config.envs.iter().find(|e| e.name == name)
    }

    /// The appid for `src/manifest.json`, if any.
    pub fn manifest_appid(&self) -> Option<&str> {
        self.config
            .wx_appid
            .as_deref()
            .or(self.config.appid.as_deref())
    }

    /// The JSON injected for `__APP_CONFIG__`.
    pub fn base_config_json(&self) -> serde_json::Value {
        let envs: Vec<serde_json::Value> = self
            .config
            .envs
            .iter()
            .map(|env| {
                serde_json::json!({
                    "name": env.name,
                    "description": env.description,
                    "value": env.value,
                })
            })
            .collect();

        serde_json::json!({
            "name": self.config.name,
            "dirName": self.dir_name,
            "description": self.config.description,
            "comEnv": self.config.common_env,
            "envs": envs,
        })
    }
}

/// Backslashes become `/`; one leading and one trailing `/` are dropped.
pub fn normalize_dir_name(raw: &str) -> String {
    let slashed = raw.replace('\\', "/");
    let trimmed = slashed.strip_prefix('/').unwrap_or(&slashed);
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    trimmed.to_string()
}

/// `<dir_name>-<name>` (or `<name>`) with path separators flattened.
pub fn app_key(dir_name: &str, name: &str) -> String {
    let raw = if dir_name.is_empty() {
        name.to_string()
    } else {
        format!("{}-{}", dir_name, name)
    };
    raw.replace('\\', "/").replace('/', "-")
}

/// Derive every app's identity and reject duplicate package names.
pub fn resolve_apps(
    configs: &[AppConfig],
    root_package_name: &str,
    apps_dir: &Path,
) -> Result<Vec<App>, AppError> {
    let mut apps = Vec::with_capacity(configs.len());
    let mut seen = HashSet::new();

    for (index, config) in configs.iter().enumerate() {
        if config.name.is_empty() {
            return Err(AppError::MissingName(index));
        }

        let dir_name = normalize_dir_name(&config.dir_name);
        let key = app_key(&dir_name, &config.name);
        let package_name = format!("@{}-app/{}", root_package_name, key).to_lowercase();

        if !seen.insert(package_name.clone()) {
            return Err(AppError::DuplicatePackageName { package_name });
        }

        let mut path = apps_dir.to_path_buf();
        if !dir_name.is_empty() {
            path.push(&dir_name);
        }
        path.push(&config.name);

        apps.push(App {
            index,
            key,
            package_name,
            path,
            sign_color: SIGN_COLORS.get(index).copied().unwrap_or(FALLBACK_SIGN_COLOR),
            dir_name,
            config: config.clone(),
        });
    }

    Ok(apps)
}

/// Pick apps by package name, key, or index. An empty selector list selects
/// nothing; callers decide what "all" means.
pub fn select_apps<'a>(apps: &'a [App], selectors: &[String]) -> Result<Vec<&'a App>, AppError> {
    let mut selected: Vec<&App> = Vec::new();

    for selector in selectors {
        let selector = selector.trim();
        let found = apps.iter().find(|app| {
            app.package_name == selector
                || app.key == selector
                || selector.parse::<usize>().ok() == Some(app.index)
        });

        match found {
            Some(app) if !selected.iter().any(|s| s.index == app.index) => selected.push(app),
            Some(_) => {}
            None => return Err(AppError::NotFound(selector.to_string())),
        }
    }

    Ok(selected)
}
