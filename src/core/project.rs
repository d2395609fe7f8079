//! `unipack.toml` project configuration.
//!
//! The project file sits at the root of a uni-app monorepo. Its directory is
//! the project root; every relative path in it is resolved from there.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;

use super::app::{resolve_apps, App, AppConfig};
use super::env::EnvKey;
use crate::util::config::OptimizeConfig;
use crate::util::diagnostic::ConfigParseError;
use crate::util::fs::{ensure_dir, read_to_string};
use crate::util::GlobalContext;

/// Name of the project configuration file.
pub const PROJECT_FILE: &str = "unipack.toml";

/// Apps processed at once when `concurrency` is not set.
pub const DEFAULT_CONCURRENCY: usize = 3;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("could not find `unipack.toml` in {} or any parent directory", .dir.display())]
    NotFound { dir: PathBuf },
}

/// Deserialized `unipack.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Directory apps are materialized into
    pub apps_dir: PathBuf,

    /// Apps processed at once by batch commands
    pub concurrency: usize,

    /// Release logs directory
    pub logs_dir: PathBuf,

    pub template: TemplateConfig,

    pub env_keys: Vec<EnvKey>,

    pub apps: Vec<AppConfig>,

    pub optimize: OptimizeConfig,

    pub release: ReleaseConfig,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        ProjectConfig {
            apps_dir: PathBuf::from("apps"),
            concurrency: DEFAULT_CONCURRENCY,
            logs_dir: PathBuf::from("log"),
            template: TemplateConfig::default(),
            env_keys: Vec::new(),
            apps: Vec::new(),
            optimize: OptimizeConfig::default(),
            release: ReleaseConfig::default(),
        }
    }
}

/// The shared app template (`[template]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Template directory, relative to the project root
    pub dir: PathBuf,

    /// Extra globs (relative to the template) that are never copied
    pub ignore: Vec<String>,

    /// Template directories linked into apps instead of copied
    pub link_dirs: Vec<String>,

    /// package.json scripts; values may use `{name}`, `{key}` and `{package}`
    pub scripts: BTreeMap<String, String>,

    pub loaders: Vec<LoaderConfig>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        TemplateConfig {
            dir: PathBuf::from("template"),
            ignore: Vec::new(),
            link_dirs: Vec::new(),
            scripts: BTreeMap::new(),
            loaders: Vec::new(),
        }
    }
}

/// A text transform applied to template files whose path matches `rules`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoaderConfig {
    pub kind: LoaderKind,
    /// Globs over template-relative paths
    pub rules: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoaderKind {
    CodeInject,
    CodeCustomIf,
}

/// `[release]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Command run once per release target through the platform shell.
    /// Placeholders: `{package}`, `{key}`, `{env}`, `{type}`, `{bump}`, `{app_dir}`.
    pub command: Option<String>,

    /// Materialize selected apps before releasing
    pub create: bool,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        ReleaseConfig {
            command: None,
            create: true,
        }
    }
}

impl ProjectConfig {
    /// Parse project configuration, reporting the failing span.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigParseError> {
        toml::from_str(content).map_err(|e| ConfigParseError::from_toml(path, content, e))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = read_to_string(path)?;
        Ok(Self::parse(&content, path)?)
    }
}

/// A loaded project: its root directory and configuration.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    config: ProjectConfig,
}

impl Project {
    /// Load the project whose `unipack.toml` is at `manifest_path`.
    pub fn load(manifest_path: &Path) -> Result<Self> {
        let config = ProjectConfig::load(manifest_path)?;
        let root = manifest_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf();
        Ok(Project { root, config })
    }

    /// Find and load the nearest project from the context's cwd.
    pub fn discover(ctx: &GlobalContext) -> Result<Self> {
        let path = ctx.find_project_file().ok_or_else(|| ProjectError::NotFound {
            dir: ctx.cwd().to_path_buf(),
        })?;
        tracing::debug!("using project file {}", path.display());
        Self::load(&path)
    }

    /// Nearest project, if any. Parse errors still propagate.
    pub fn discover_optional(ctx: &GlobalContext) -> Result<Option<Self>> {
        match ctx.find_project_file() {
            Some(path) => Self::load(&path).map(Some),
            None => Ok(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn apps_dir(&self) -> PathBuf {
        self.resolve(&self.config.apps_dir)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.resolve(&self.config.logs_dir)
    }

    pub fn template_dir(&self) -> PathBuf {
        self.resolve(&self.config.template.dir)
    }

    /// Batch width, never below one.
    pub fn concurrency(&self) -> usize {
        self.config.concurrency.max(1)
    }

    /// `name` of the root package.json.
    pub fn package_name(&self) -> Result<String> {
        let path = self.root.join("package.json");
        let content = read_to_string(&path)?;
        let package: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        package
            .get("name")
            .and_then(|n| n.as_str())
            .map(str::to_string)
            .with_context(|| format!("{} has no `name`", path.display()))
    }

    /// Every configured app. Creates `apps_dir` when missing.
    pub fn apps(&self) -> Result<Vec<App>> {
        let apps_dir = self.apps_dir();
        ensure_dir(&apps_dir)?;
        let root_name = self.package_name()?;
        Ok(resolve_apps(&self.config.apps, &root_name, &apps_dir)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PROJECT: &str = r#"
apps_dir = "packages/apps"
concurrency = 2

[template]
dir = "packages/template"
ignore = ["*.log"]
link_dirs = ["src/uni_modules"]

[template.scripts]
"build:mp-weixin" = "uni build -p mp-weixin --mode {name}"

[[template.loaders]]
kind = "code-custom-if"
rules = ["src/**/*.vue"]

[[env_keys]]
value = "API"
label = "Backend address"

[[apps]]
name = "main"
dir_name = "shop"
description = "Shop"
wx_appid = "wx0001"

[apps.common_env]
TITLE = "Shop"

[[apps.envs]]
name = "production"
description = "Production"
value = { API = "https://api.example.com" }

[optimize]
only_optimize_main_package = true

[release]
command = "pnpm --filter {package} build"
"#;

    #[test]
    fn test_parse_project() {
        let config = ProjectConfig::parse(PROJECT, Path::new(PROJECT_FILE)).unwrap();

        assert_eq!(config.apps_dir, PathBuf::from("packages/apps"));
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.logs_dir, PathBuf::from("log"));
        assert_eq!(config.template.link_dirs, vec!["src/uni_modules"]);
        assert_eq!(config.template.loaders[0].kind, LoaderKind::CodeCustomIf);
        assert_eq!(config.env_keys[0].label, "Backend address");
        assert_eq!(config.apps[0].envs[0].value["API"], "https://api.example.com");
        assert_eq!(config.optimize.only_optimize_main_package, Some(true));
        assert!(config.release.create);
    }

    #[test]
    fn test_parse_error_has_span() {
        let err = ProjectConfig::parse("concurrency = \"many\"\n", Path::new(PROJECT_FILE))
            .unwrap_err();
        assert!(err.span.is_some());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(ProjectConfig::parse("app_dir = \"apps\"\n", Path::new(PROJECT_FILE)).is_err());
    }

    #[test]
    fn test_project_apps() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(PROJECT_FILE), PROJECT).unwrap();
        std::fs::write(tmp.path().join("package.json"), r#"{"name":"Acme"}"#).unwrap();

        let project = Project::load(&tmp.path().join(PROJECT_FILE)).unwrap();
        let apps = project.apps().unwrap();

        assert!(tmp.path().join("packages/apps").is_dir());
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].package_name, "@acme-app/shop-main");
        assert_eq!(apps[0].path, tmp.path().join("packages/apps/shop/main"));
    }

    #[test]
    fn test_discover_walks_upward() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(PROJECT_FILE), "").unwrap();
        let nested = tmp.path().join("packages/template/src");
        std::fs::create_dir_all(&nested).unwrap();

        let project = Project::discover(&GlobalContext::with_cwd(nested)).unwrap();
        assert_eq!(project.root(), tmp.path());
        assert_eq!(project.concurrency(), DEFAULT_CONCURRENCY);
    }
}
