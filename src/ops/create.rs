//! Implementation of `unipack create`: materialize apps from the template.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use glob::Pattern;
use regex::{Captures, Regex};
use walkdir::WalkDir;

use super::loader::{apply_loaders, compile_loaders, Loader};
use super::run_batch;
use crate::core::env::{merge_env, render_env_file, EnvKey};
use crate::core::project::LoaderConfig;
use crate::core::version::{to_package_json_string, DEFAULT_VERSION};
use crate::core::{App, Project};
use crate::optimizer::BatchResult;
use crate::util::fs::{ensure_dir, read_to_string, relative_path, slash_path, symlink_dir, write_string};

/// Template directories that are never copied into apps.
pub const ALWAYS_IGNORED_DIRS: &[&str] = &["node_modules", "dist"];

/// Template file rewritten with the app's appid.
pub const MANIFEST_PATH: &str = "src/manifest.json";

static MANIFEST_APPID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"("mp-weixin"\s*:\s*\{\s*)("appid"\s*:\s*".*?")"#)
        .expect("manifest appid pattern is valid")
});

/// Options for materializing apps.
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub template_dir: PathBuf,

    /// Extra globs over template-relative paths that are never copied
    pub ignore: Vec<String>,

    /// Template directories linked instead of copied
    pub link_dirs: Vec<String>,

    pub scripts: BTreeMap<String, String>,

    pub loaders: Vec<LoaderConfig>,

    pub env_keys: Vec<EnvKey>,

    /// Apps materialized at once
    pub concurrency: usize,
}

impl CreateOptions {
    pub fn from_project(project: &Project) -> Self {
        let config = project.config();
        CreateOptions {
            template_dir: project.template_dir(),
            ignore: config.template.ignore.clone(),
            link_dirs: config.template.link_dirs.clone(),
            scripts: config.template.scripts.clone(),
            loaders: config.template.loaders.clone(),
            env_keys: config.env_keys.clone(),
            concurrency: project.concurrency(),
        }
    }
}

/// What materializing one app produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeSummary {
    pub key: String,
    pub files: usize,
    pub env_files: Vec<String>,
    pub links: usize,
    pub version: String,
}

/// The template, scanned once and shared by every app.
pub struct Template {
    opts: CreateOptions,
    files: Vec<PathBuf>,
    loaders: Vec<Loader>,
    package_json: serde_json::Value,
}

impl Template {
    pub fn load(opts: CreateOptions) -> Result<Self> {
        if !opts.template_dir.is_dir() {
            bail!("template directory {} does not exist", opts.template_dir.display());
        }

        let files = template_files(&opts.template_dir, &opts.ignore, &opts.link_dirs)?;
        let loaders = compile_loaders(&opts.loaders)?;

        let package_path = opts.template_dir.join("package.json");
        let package_json: serde_json::Value = serde_json::from_str(&read_to_string(&package_path)?)
            .with_context(|| format!("failed to parse {}", package_path.display()))?;
        if !package_json.is_object() {
            bail!("{} is not a JSON object", package_path.display());
        }

        tracing::debug!(
            "template {} has {} files",
            opts.template_dir.display(),
            files.len()
        );

        Ok(Template {
            opts,
            files,
            loaders,
            package_json,
        })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Write one app: template files, env files, package.json, manifest and links.
    pub fn materialize(&self, app: &App) -> Result<MaterializeSummary> {
        ensure_dir(&app.path)?;
        let mut summary = MaterializeSummary {
            key: app.key.clone(),
            ..MaterializeSummary::default()
        };

        // Read before the template's own package.json is copied over it
        let existing = existing_version(&app.path);

        for rel in &self.files {
            self.copy_file(rel, app)?;
            summary.files += 1;
        }

        for env in app.envs() {
            let name = format!(".env.{}", env.name);
            let values = merge_env(&app.config.common_env, &env.value);
            write_string(&app.path.join(&name), &render_env_file(&values, &self.opts.env_keys))?;
            summary.env_files.push(name);
        }

        let package = self.app_package_json(app, existing)?;
        summary.version = package
            .get("version")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_VERSION)
            .to_string();
        write_string(&app.path.join("package.json"), &to_package_json_string(&package)?)?;

        self.write_manifest(app)?;
        summary.links = self.link_dirs(app)?;

        tracing::debug!("materialized {} into {}", app.key, app.path.display());
        Ok(summary)
    }

    fn copy_file(&self, rel: &Path, app: &App) -> Result<()> {
        let source = self.opts.template_dir.join(rel);
        let target = app.path.join(rel);
        if let Some(parent) = target.parent() {
            ensure_dir(parent)?;
        }

        let content =
            fs::read(&source).with_context(|| format!("failed to read {}", source.display()))?;
        let content = apply_loaders(&self.loaders, &slash_path(rel), content, app)?;
        fs::write(&target, content).with_context(|| format!("failed to write {}", target.display()))
    }

    /// The template package.json specialized for `app`, keeping the
    /// version the app already had.
    fn app_package_json(&self, app: &App, existing: Option<String>) -> Result<serde_json::Value> {
        let mut package = self.package_json.clone();
        let Some(object) = package.as_object_mut() else {
            bail!("template package.json is not a JSON object");
        };

        let template_version = object
            .get("version")
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_VERSION)
            .to_string();
        let version = existing.unwrap_or(template_version);

        object.insert("version".into(), version.into());
        object.insert("name".into(), app.package_name.clone().into());
        object.insert("description".into(), app.description().into());

        let scripts: serde_json::Map<String, serde_json::Value> = self
            .opts
            .scripts
            .iter()
            .map(|(name, script)| (name.clone(), fill_script(script, app).into()))
            .collect();
        object.insert("scripts".into(), scripts.into());

        for section in ["dependencies", "devDependencies"] {
            if let Some(deps) = object.get_mut(section).and_then(|d| d.as_object_mut()) {
                resolve_workspace_deps(deps, &self.opts.template_dir);
            }
        }

        Ok(package)
    }

    fn write_manifest(&self, app: &App) -> Result<()> {
        let source = self.opts.template_dir.join(MANIFEST_PATH);
        if !source.is_file() {
            return Ok(());
        }

        let content = read_to_string(&source)?;
        let content = match app.manifest_appid() {
            Some(appid) => replace_manifest_appid(&content, appid),
            None => content,
        };
        write_string(&app.path.join(MANIFEST_PATH), &content)
    }

    fn link_dirs(&self, app: &App) -> Result<usize> {
        let mut linked = 0;
        for dir in &self.opts.link_dirs {
            let from = self.opts.template_dir.join(dir);
            if !from.is_dir() {
                continue;
            }
            let to = app.path.join(dir);
            replace_with_link(&from, &to)?;
            linked += 1;
        }
        Ok(linked)
    }
}

/// Version of an already materialized app, if readable.
fn existing_version(app_path: &Path) -> Option<String> {
    let content = fs::read_to_string(app_path.join("package.json")).ok()?;
    let package: serde_json::Value = serde_json::from_str(&content).ok()?;
    package
        .get("version")
        .and_then(|v| v.as_str())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn fill_script(script: &str, app: &App) -> String {
    script
        .replace("{name}", app.name())
        .replace("{key}", &app.key)
        .replace("{package}", &app.package_name)
}

/// Replace `workspace:*` versions with the resolved target of the
/// template's `node_modules/<dep>` symlink, when there is one.
fn resolve_workspace_deps(deps: &mut serde_json::Map<String, serde_json::Value>, template_dir: &Path) {
    for (name, version) in deps.iter_mut() {
        if version.as_str() != Some("workspace:*") {
            continue;
        }

        let link = template_dir.join("node_modules").join(name);
        let is_symlink = fs::symlink_metadata(&link)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        if !is_symlink {
            continue;
        }

        match fs::canonicalize(&link) {
            Ok(target) => *version = serde_json::Value::from(slash_path(&target)),
            Err(e) => tracing::warn!("failed to resolve link {}: {}", link.display(), e),
        }
    }
}

/// Point the first `"mp-weixin": { "appid": ... }` at `appid`.
pub fn replace_manifest_appid(content: &str, appid: &str) -> String {
    MANIFEST_APPID
        .replace(content, |caps: &Captures<'_>| {
            format!("{}\"appid\": \"{}\"", &caps[1], appid)
        })
        .into_owned()
}

/// Make `to` a symlink to `from`, keeping an existing link to the same place.
fn replace_with_link(from: &Path, to: &Path) -> Result<()> {
    if let Ok(meta) = fs::symlink_metadata(to) {
        if meta.file_type().is_symlink() {
            let same = match (fs::canonicalize(to), fs::canonicalize(from)) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            };
            if same {
                return Ok(());
            }
            fs::remove_file(to)
                .or_else(|_| fs::remove_dir(to))
                .with_context(|| format!("failed to remove link {}", to.display()))?;
        } else if meta.is_dir() {
            fs::remove_dir_all(to)
                .with_context(|| format!("failed to remove {}", to.display()))?;
        } else {
            fs::remove_file(to).with_context(|| format!("failed to remove {}", to.display()))?;
        }
    }

    if let Some(parent) = to.parent() {
        ensure_dir(parent)?;
    }
    symlink_dir(from, to)
        .with_context(|| format!("failed to link {} to {}", to.display(), from.display()))
}

/// Files of the template, relative to it, sorted.
///
/// `node_modules`, `dist` and the link directories are skipped entirely;
/// `ignore` globs are matched against slash-separated relative paths.
pub fn template_files(template_dir: &Path, ignore: &[String], link_dirs: &[String]) -> Result<Vec<PathBuf>> {
    let ignore = ignore
        .iter()
        .map(|p| Pattern::new(p).with_context(|| format!("invalid ignore glob `{}`", p)))
        .collect::<Result<Vec<_>>>()?;
    let link_dirs: Vec<String> = link_dirs
        .iter()
        .map(|d| d.trim_matches('/').to_string())
        .collect();

    let skip_dir = |rel: &str| {
        ALWAYS_IGNORED_DIRS.contains(&rel) || link_dirs.iter().any(|d| d == rel)
    };

    let mut files = Vec::new();
    let walker = WalkDir::new(template_dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !entry.file_type().is_dir()
                || !skip_dir(&slash_path(&relative_path(template_dir, entry.path())))
        });

    for entry in walker {
        let entry = entry.with_context(|| format!("failed to walk {}", template_dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = relative_path(template_dir, entry.path());
        let rel_str = slash_path(&rel);
        if ignore.iter().any(|p| p.matches(&rel_str)) {
            continue;
        }
        files.push(rel);
    }

    Ok(files)
}

/// Materialize `apps`, `concurrency` at a time. Failures are per app.
pub fn create_apps(apps: &[&App], opts: CreateOptions) -> Result<(Vec<MaterializeSummary>, BatchResult<String>)> {
    let concurrency = opts.concurrency;
    let template = Template::load(opts)?;

    let results = run_batch(apps, concurrency, |app| (app.key.clone(), template.materialize(app)))?;

    let mut summaries = Vec::new();
    let mut batch = BatchResult::new();
    for (key, result) in results {
        match result {
            Ok(summary) => {
                summaries.push(summary);
                batch.push_ok(key);
            }
            Err(e) => {
                tracing::warn!("failed to create {}: {:#}", key, e);
                batch.push_err(key, e);
            }
        }
    }

    Ok((summaries, batch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::app::{resolve_apps, AppConfig, AppEnv};
    use crate::core::project::LoaderKind;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    struct Fixture {
        tmp: TempDir,
        apps: Vec<App>,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let template = tmp.path().join("template");
            write(
                &template.join("package.json"),
                r#"{"name":"template","version":"2.0.0","private":true,"dependencies":{"vue":"^3.4.0"}}"#,
            );
            write(
                &template.join(MANIFEST_PATH),
                "{\n  \"name\": \"app\",\n  \"mp-weixin\": {\n    \"appid\": \"wx-template\",\n    \"setting\": {}\n  }\n}\n",
            );
            write(
                &template.join("src/App.vue"),
                "<script>\n// TODO: #code_cu_if_app(app.name === \"main\")\nmain();\n// TODO: #end_code_cu_if_app\n</script>\n",
            );
            write(&template.join(".npmrc"), "shamefully-hoist=true\n");
            write(&template.join("node_modules/vue/index.js"), "");
            write(&template.join("dist/build/app.js"), "");
            write(&template.join("debug.log"), "");
            write(&template.join("src/uni_modules/ui/index.js"), "");

            let configs = vec![
                AppConfig {
                    name: "main".to_string(),
                    dir_name: "shop".to_string(),
                    description: "Shop".to_string(),
                    wx_appid: Some("wx-main".to_string()),
                    common_env: json!({ "TITLE": "Shop", "API": "common" })
                        .as_object()
                        .cloned()
                        .unwrap(),
                    envs: vec![AppEnv {
                        name: "production".to_string(),
                        description: "Production".to_string(),
                        value: json!({ "API": "https://api.example.com" })
                            .as_object()
                            .cloned()
                            .unwrap(),
                    }],
                    ..AppConfig::default()
                },
                AppConfig {
                    name: "lite".to_string(),
                    dir_name: "shop".to_string(),
                    ..AppConfig::default()
                },
            ];
            let apps = resolve_apps(&configs, "acme", &tmp.path().join("apps")).unwrap();

            Fixture { tmp, apps }
        }

        fn options(&self) -> CreateOptions {
            CreateOptions {
                template_dir: self.tmp.path().join("template"),
                ignore: vec!["*.log".to_string()],
                link_dirs: vec!["src/uni_modules".to_string()],
                scripts: BTreeMap::from([(
                    "build".to_string(),
                    "uni build --mode {name} # {package}".to_string(),
                )]),
                loaders: vec![LoaderConfig {
                    kind: LoaderKind::CodeCustomIf,
                    rules: vec!["src/**/*.vue".to_string()],
                }],
                env_keys: vec![EnvKey {
                    value: "API".to_string(),
                    label: "Backend".to_string(),
                }],
                concurrency: 2,
            }
        }

        fn app_file(&self, app: usize, rel: &str) -> PathBuf {
            self.apps[app].path.join(rel)
        }
    }

    #[test]
    fn test_template_files_skips_ignored() {
        let fx = Fixture::new();
        let opts = fx.options();
        let files = template_files(&opts.template_dir, &opts.ignore, &opts.link_dirs).unwrap();
        let files: Vec<String> = files.iter().map(|f| slash_path(f)).collect();

        assert_eq!(
            files,
            vec![".npmrc", "package.json", "src/App.vue", "src/manifest.json"]
        );
    }

    #[test]
    fn test_create_apps() {
        let fx = Fixture::new();
        let apps: Vec<&App> = fx.apps.iter().collect();
        let (summaries, batch) = create_apps(&apps, fx.options()).unwrap();

        assert!(batch.is_clean());
        assert_eq!(batch.succeeded, vec!["shop-main", "shop-lite"]);
        assert_eq!(summaries[0].env_files, vec![".env.production"]);

        let vue_main = fs::read_to_string(fx.app_file(0, "src/App.vue")).unwrap();
        let vue_lite = fs::read_to_string(fx.app_file(1, "src/App.vue")).unwrap();
        assert!(vue_main.contains("main();"));
        assert!(!vue_lite.contains("main();"));

        let env = fs::read_to_string(fx.app_file(0, ".env.production")).unwrap();
        assert_eq!(env, "VITE_TITLE = Shop\n\n# Backend\nVITE_API = https://api.example.com");

        let manifest = fs::read_to_string(fx.app_file(0, MANIFEST_PATH)).unwrap();
        assert!(manifest.contains("\"appid\": \"wx-main\""));
        let manifest_lite = fs::read_to_string(fx.app_file(1, MANIFEST_PATH)).unwrap();
        assert!(manifest_lite.contains("\"appid\": \"wx-template\""));

        let package: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(fx.app_file(0, "package.json")).unwrap())
                .unwrap();
        assert_eq!(package["name"], "@acme-app/shop-main");
        assert_eq!(package["version"], "2.0.0");
        assert_eq!(package["scripts"]["build"], "uni build --mode main # @acme-app/shop-main");
        assert_eq!(package["private"], true);

        assert!(!fx.app_file(0, "debug.log").exists());
        assert!(!fx.app_file(0, "dist").exists());
        assert!(fs::symlink_metadata(fx.app_file(0, "src/uni_modules"))
            .unwrap()
            .file_type()
            .is_symlink());
        assert!(fx.app_file(0, "src/uni_modules/ui/index.js").is_file());
    }

    #[test]
    fn test_recreate_keeps_version_and_link() {
        let fx = Fixture::new();
        let apps: Vec<&App> = fx.apps.iter().take(1).collect();
        create_apps(&apps, fx.options()).unwrap();

        crate::core::version::set_app_version(&fx.apps[0].path, "2.3.1").unwrap();
        let (summaries, batch) = create_apps(&apps, fx.options()).unwrap();

        assert!(batch.is_clean());
        assert_eq!(summaries[0].version, "2.3.1");
        assert_eq!(summaries[0].links, 1);
        assert_eq!(
            crate::core::version::read_app_version(&fx.apps[0].path).unwrap(),
            "2.3.1"
        );
    }

    #[test]
    fn test_replace_manifest_appid_first_only() {
        let content = r#"{"mp-weixin": {"appid": "old"}, "mp-alipay": {"appid": "keep"}}"#;
        assert_eq!(
            replace_manifest_appid(content, "wx1"),
            r#"{"mp-weixin": {"appid": "wx1"}, "mp-alipay": {"appid": "keep"}}"#
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_workspace_dependency_resolved() {
        let tmp = TempDir::new().unwrap();
        let template = tmp.path().join("template");
        fs::create_dir_all(tmp.path().join("packages/ui")).unwrap();
        fs::create_dir_all(template.join("node_modules/@acme")).unwrap();
        std::os::unix::fs::symlink("../../../packages/ui", template.join("node_modules/@acme/ui"))
            .unwrap();

        let mut deps = json!({ "@acme/ui": "workspace:*", "vue": "^3.4.0" })
            .as_object()
            .cloned()
            .unwrap();
        resolve_workspace_deps(&mut deps, &template);

        let expected = fs::canonicalize(tmp.path().join("packages/ui")).unwrap();
        assert_eq!(deps["@acme/ui"], slash_path(&expected));
        assert_eq!(deps["vue"], "^3.4.0");
    }

    #[test]
    fn test_missing_template() {
        let fx = Fixture::new();
        let mut opts = fx.options();
        opts.template_dir = fx.tmp.path().join("nope");
        assert!(Template::load(opts).is_err());
    }
}
