//! Implementation of `unipack release`: run the release command for a batch
//! of app/env targets and keep a markdown log per app.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};

use super::cleanup::cleanup_temp_hash_folders;
use super::run_batch;
use crate::core::version::bump_app_version;
use crate::core::{App, Project, VersionBump};
use crate::util::fs::ensure_dir;
use crate::util::process::{combined_output, ShellCommand};

/// Env that is never released.
pub const DEVELOPMENT_ENV: &str = "development";

/// The only env a `release` build may target.
pub const PRODUCTION_ENV: &str = "production";

/// Mini-program version channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReleaseType {
    #[default]
    Trial,
    Release,
}

impl ReleaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseType::Trial => "trial",
            ReleaseType::Release => "release",
        }
    }
}

impl fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trial" => Ok(ReleaseType::Trial),
            "release" => Ok(ReleaseType::Release),
            other => Err(format!(
                "invalid version type '{}'; expected 'trial' or 'release'",
                other
            )),
        }
    }
}

/// One release run: an app, one of its envs, a channel and a bump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseTarget {
    pub package_name: String,
    pub env: String,
    pub version_type: ReleaseType,
    pub bump: VersionBump,
}

impl ReleaseTarget {
    /// Parse `packageName=…&env=…&appVersionType=…&updateVersionNumType=…`.
    ///
    /// `appVersionType` defaults to `trial` and `updateVersionNumType` to
    /// `none`. Unknown keys are ignored.
    pub fn parse(query: &str) -> Result<Self> {
        let mut package_name = None;
        let mut env = None;
        let mut version_type = ReleaseType::default();
        let mut bump = VersionBump::default();

        for pair in query.split('&').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = value.trim();
            match key.trim() {
                "packageName" => package_name = Some(value.to_string()),
                "env" => env = Some(value.to_string()),
                "appVersionType" => version_type = value.parse().map_err(anyhow::Error::msg)?,
                "updateVersionNumType" => bump = value.parse().map_err(anyhow::Error::msg)?,
                other => tracing::debug!("ignoring release target key `{}`", other),
            }
        }

        let package_name = package_name
            .filter(|p| !p.is_empty())
            .with_context(|| format!("release target `{}` has no packageName", query))?;
        let env = env
            .filter(|e| !e.is_empty())
            .with_context(|| format!("release target `{}` has no env", query))?;

        Ok(ReleaseTarget {
            package_name,
            env,
            version_type,
            bump,
        })
    }

    /// Parse a comma-separated list of targets.
    pub fn parse_list(list: &str) -> Result<Vec<Self>> {
        list.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(Self::parse)
            .collect()
    }

    pub fn to_query(&self) -> String {
        format!(
            "packageName={}&env={}&appVersionType={}&updateVersionNumType={}",
            self.package_name, self.env, self.version_type, self.bump
        )
    }
}

impl fmt::Display for ReleaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query())
    }
}

/// `development` is never released and `release` builds only go to
/// `production`.
pub fn is_releasable(env: &str, version_type: ReleaseType) -> bool {
    env != DEVELOPMENT_ENV && (version_type != ReleaseType::Release || env == PRODUCTION_ENV)
}

/// Targets for every releasable env of `apps`, per version type.
/// An empty `envs` filter means every env.
pub fn expand_targets(
    apps: &[&App],
    envs: &[String],
    version_types: &[ReleaseType],
    bump: VersionBump,
) -> Vec<ReleaseTarget> {
    let mut targets = Vec::new();
    for app in apps {
        for &version_type in version_types {
            for env in app.envs() {
                if !envs.is_empty() && !envs.contains(&env.name) {
                    continue;
                }
                if !is_releasable(&env.name, version_type) {
                    continue;
                }
                targets.push(ReleaseTarget {
                    package_name: app.package_name.clone(),
                    env: env.name.clone(),
                    version_type,
                    bump,
                });
            }
        }
    }
    targets
}

#[derive(Debug, Clone)]
pub struct ReleaseOptions {
    /// Command template run once per target
    pub command: String,
    /// Working directory of the command
    pub project_root: PathBuf,
    pub logs_dir: PathBuf,
    pub concurrency: usize,
}

impl ReleaseOptions {
    pub fn from_project(project: &Project) -> Result<Self> {
        let Some(command) = project.config().release.command.clone() else {
            bail!("no release command configured; set `command` under [release] in unipack.toml");
        };
        Ok(ReleaseOptions {
            command,
            project_root: project.root().to_path_buf(),
            logs_dir: project.logs_dir(),
            concurrency: project.concurrency(),
        })
    }
}

/// Result of one target.
#[derive(Debug, Clone)]
pub struct TargetOutcome {
    pub target: ReleaseTarget,
    pub title: String,
    pub sign_color: &'static str,
    pub success: bool,
}

#[derive(Debug, Default)]
pub struct ReleaseReport {
    pub log_dir: PathBuf,
    pub outcomes: Vec<TargetOutcome>,
    /// Version changes, `(package, old, new)`
    pub bumps: Vec<(String, String, String)>,
    pub removed_temp_dirs: Vec<PathBuf>,
}

impl ReleaseReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &TargetOutcome> {
        self.outcomes.iter().filter(|o| o.success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &TargetOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }

    pub fn is_clean(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }

    /// `--targets` value that re-runs every failed target.
    pub fn rerun_targets(&self) -> Option<String> {
        let failed: Vec<String> = self.failed().map(|o| o.target.to_query()).collect();
        if failed.is_empty() {
            None
        } else {
            Some(failed.join(","))
        }
    }
}

/// `<logs_dir>/<YYYY-MM-DD_HH-mm-ss>`.
pub fn release_log_dir(logs_dir: &Path, now: DateTime<Local>) -> PathBuf {
    logs_dir.join(now.format("%Y-%m-%d_%H-%M-%S").to_string())
}

/// Substitute the release command placeholders.
pub fn fill_command(template: &str, app: &App, target: &ReleaseTarget) -> String {
    template
        .replace("{package}", &app.package_name)
        .replace("{key}", &app.key)
        .replace("{env}", &target.env)
        .replace("{type}", target.version_type.as_str())
        .replace("{bump}", target.bump.as_str())
        .replace("{app_dir}", &app.path.display().to_string())
}

/// `[index]:key#env-type-bump`
pub fn target_title(app: &App, target: &ReleaseTarget) -> String {
    format!(
        "[{}]:{}#{}-{}-{}",
        app.index, app.key, target.env, target.version_type, target.bump
    )
}

/// Check every target against the configured apps.
fn group_targets<'a>(apps: &'a [App], targets: &[ReleaseTarget]) -> Result<Vec<(&'a App, Vec<ReleaseTarget>)>> {
    let mut groups: Vec<(&App, Vec<ReleaseTarget>)> = Vec::new();

    for target in targets {
        let Some(app) = apps.iter().find(|a| a.package_name == target.package_name) else {
            bail!("no app with package name `{}`", target.package_name);
        };
        if app.env(&target.env).is_none() {
            bail!("app `{}` has no env `{}`", app.package_name, target.env);
        }
        if !is_releasable(&target.env, target.version_type) {
            bail!(
                "cannot release a {} build of `{}` to `{}`",
                target.version_type,
                app.package_name,
                target.env
            );
        }

        match groups.iter_mut().find(|(a, _)| a.index == app.index) {
            Some((_, group)) => {
                if !group.contains(target) {
                    group.push(target.clone());
                }
            }
            None => groups.push((app, vec![target.clone()])),
        }
    }

    Ok(groups)
}

/// Short hash, author and summary of the project's HEAD, if it is a git
/// checkout.
pub fn head_commit(root: &Path) -> Option<String> {
    let repo = git2::Repository::discover(root).ok()?;
    let commit = repo.head().ok()?.peel_to_commit().ok()?;
    let short = commit.as_object().short_id().ok()?;
    let author = commit.author();
    Some(format!(
        "{} {} {}",
        short.as_str().unwrap_or_default(),
        author.name().unwrap_or("unknown"),
        commit.summary().unwrap_or_default()
    ))
}

struct LogSection<'a> {
    title: &'a str,
    command: &'a str,
    commit: Option<&'a str>,
    success: bool,
    output: &'a str,
}

impl LogSection<'_> {
    fn render(&self) -> String {
        let mut lines = vec![
            String::new(),
            format!("## {}", self.title),
            String::new(),
            format!("### Command: {}", self.command),
            String::new(),
            format!("### Date: {}", Local::now().format("%Y-%m-%d %H:%M:%S")),
            String::new(),
        ];
        if let Some(commit) = self.commit {
            lines.push(format!("### Commit: {}", commit));
            lines.push(String::new());
        }
        lines.push(format!(
            "### Result: {}",
            if self.success { "success" } else { "failed" }
        ));
        lines.push(String::new());
        lines.push(format!("```log\n{}\n```", self.output.trim_end()));
        lines.join("\n")
    }
}

fn append_log(path: &Path, section: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    writeln!(file, "{}", section).with_context(|| format!("failed to write {}", path.display()))
}

struct AppRelease {
    outcomes: Vec<TargetOutcome>,
    bump: Option<(String, String, String)>,
}

/// Bump once, then run every target of one app in order.
fn release_app(
    app: &App,
    targets: &[ReleaseTarget],
    opts: &ReleaseOptions,
    log_dir: &Path,
    commit: Option<&str>,
) -> AppRelease {
    let log_file = log_dir.join(format!("{}-release-log.md", app.key));
    let mut outcomes = Vec::with_capacity(targets.len());
    let mut bumped = None;

    let bump = targets
        .iter()
        .map(|t| t.bump)
        .find(|b| *b != VersionBump::None)
        .unwrap_or_default();
    let bump_error = if bump == VersionBump::None {
        None
    } else {
        match bump_app_version(&app.path, bump) {
            Ok((old, new)) => {
                tracing::info!("{} version {} -> {}", app.package_name, old, new);
                bumped = Some((app.package_name.clone(), old, new));
                None
            }
            Err(e) => Some(format!("failed to bump version: {:#}", e)),
        }
    };

    for target in targets {
        let title = target_title(app, target);
        let command = fill_command(&opts.command, app, target);

        let (success, output) = match &bump_error {
            Some(err) => (false, err.clone()),
            None => {
                tracing::info!("running {}", title);
                match ShellCommand::new(command.as_str()).cwd(&opts.project_root).exec() {
                    Ok(out) => (out.status.success(), combined_output(&out)),
                    Err(e) => (false, format!("{:#}", e)),
                }
            }
        };

        let section = LogSection {
            title: &title,
            command: &command,
            commit,
            success,
            output: &output,
        };
        if let Err(e) = append_log(&log_file, &section.render()) {
            tracing::warn!("{:#}", e);
        }

        outcomes.push(TargetOutcome {
            target: target.clone(),
            title,
            sign_color: app.sign_color,
            success,
        });
    }

    AppRelease {
        outcomes,
        bump: bumped,
    }
}

/// Release `targets`, one app per worker, `concurrency` apps at a time.
///
/// Command failures are recorded in the report; only invalid targets and an
/// unwritable log directory are errors.
pub fn release(apps: &[App], targets: &[ReleaseTarget], opts: &ReleaseOptions) -> Result<ReleaseReport> {
    if targets.is_empty() {
        bail!("nothing to release");
    }
    let groups = group_targets(apps, targets)?;

    let log_dir = release_log_dir(&opts.logs_dir, Local::now());
    ensure_dir(&log_dir)?;

    let commit = head_commit(&opts.project_root);
    let results = run_batch(&groups, opts.concurrency, |(app, targets)| {
        release_app(app, targets, opts, &log_dir, commit.as_deref())
    })?;

    let mut report = ReleaseReport {
        log_dir,
        ..ReleaseReport::default()
    };
    for result in results {
        report.outcomes.extend(result.outcomes);
        report.bumps.extend(result.bump);
    }

    match cleanup_temp_hash_folders(&opts.project_root) {
        Ok(removed) => report.removed_temp_dirs = removed,
        Err(e) => tracing::warn!("failed to clean temp folders: {:#}", e),
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::app::{resolve_apps, AppConfig, AppEnv};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn env(name: &str) -> AppEnv {
        AppEnv {
            name: name.to_string(),
            ..AppEnv::default()
        }
    }

    fn apps(root: &Path) -> Vec<App> {
        let configs = vec![
            AppConfig {
                name: "main".to_string(),
                dir_name: "shop".to_string(),
                envs: vec![env("development"), env("test"), env("production")],
                ..AppConfig::default()
            },
            AppConfig {
                name: "lite".to_string(),
                envs: vec![env("production")],
                ..AppConfig::default()
            },
        ];
        resolve_apps(&configs, "acme", &root.join("apps")).unwrap()
    }

    #[test]
    fn test_parse_target() {
        let target = ReleaseTarget::parse(
            "packageName=@acme-app/shop-main&env=production&appVersionType=release&updateVersionNumType=minor",
        )
        .unwrap();

        assert_eq!(target.package_name, "@acme-app/shop-main");
        assert_eq!(target.env, "production");
        assert_eq!(target.version_type, ReleaseType::Release);
        assert_eq!(target.bump, VersionBump::Minor);
        assert_eq!(ReleaseTarget::parse(&target.to_query()).unwrap(), target);
    }

    #[test]
    fn test_parse_target_defaults_and_errors() {
        let target = ReleaseTarget::parse("packageName=@acme-app/lite&env=test").unwrap();
        assert_eq!(target.version_type, ReleaseType::Trial);
        assert_eq!(target.bump, VersionBump::None);

        assert!(ReleaseTarget::parse("env=test").is_err());
        assert!(ReleaseTarget::parse("packageName=x&env=test&appVersionType=beta").is_err());
    }

    #[test]
    fn test_parse_list() {
        let targets =
            ReleaseTarget::parse_list(" packageName=a&env=test , ,packageName=b&env=production").unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[1].package_name, "b");
    }

    #[test]
    fn test_expand_targets_rules() {
        let tmp = TempDir::new().unwrap();
        let apps = apps(tmp.path());
        let selected: Vec<&App> = apps.iter().collect();

        let targets = expand_targets(
            &selected,
            &[],
            &[ReleaseType::Trial, ReleaseType::Release],
            VersionBump::Patch,
        );
        let summary: Vec<(String, String, ReleaseType)> = targets
            .iter()
            .map(|t| (t.package_name.clone(), t.env.clone(), t.version_type))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("@acme-app/shop-main".into(), "test".into(), ReleaseType::Trial),
                ("@acme-app/shop-main".into(), "production".into(), ReleaseType::Trial),
                ("@acme-app/shop-main".into(), "production".into(), ReleaseType::Release),
                ("@acme-app/lite".into(), "production".into(), ReleaseType::Trial),
                ("@acme-app/lite".into(), "production".into(), ReleaseType::Release),
            ]
        );

        let only_test = expand_targets(&selected, &["test".to_string()], &[ReleaseType::Trial], VersionBump::None);
        assert_eq!(only_test.len(), 1);
    }

    #[test]
    fn test_release_log_dir_format() {
        let now = Local.with_ymd_and_hms(2026, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(
            release_log_dir(Path::new("log"), now),
            PathBuf::from("log/2026-03-07_09-05-01")
        );
    }

    #[test]
    fn test_fill_command() {
        let tmp = TempDir::new().unwrap();
        let apps = apps(tmp.path());
        let target = ReleaseTarget::parse("packageName=@acme-app/shop-main&env=test").unwrap();

        assert_eq!(
            fill_command("pnpm --filter {package} build:{env} -- {key} {type} {bump}", &apps[0], &target),
            "pnpm --filter @acme-app/shop-main build:test -- shop-main trial none"
        );
        assert_eq!(target_title(&apps[0], &target), "[0]:shop-main#test-trial-none");
    }

    #[test]
    fn test_invalid_targets_rejected() {
        let tmp = TempDir::new().unwrap();
        let apps = apps(tmp.path());
        let opts = ReleaseOptions {
            command: "true".to_string(),
            project_root: tmp.path().to_path_buf(),
            logs_dir: tmp.path().join("log"),
            concurrency: 1,
        };

        for query in [
            "packageName=@acme-app/nope&env=test",
            "packageName=@acme-app/lite&env=test",
            "packageName=@acme-app/shop-main&env=development",
            "packageName=@acme-app/shop-main&env=test&appVersionType=release",
        ] {
            let targets = ReleaseTarget::parse_list(query).unwrap();
            assert!(release(&apps, &targets, &opts).is_err(), "{}", query);
        }
        assert!(!tmp.path().join("log").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_release_runs_and_logs() {
        let tmp = TempDir::new().unwrap();
        let apps = apps(tmp.path());
        std::fs::create_dir_all(&apps[0].path).unwrap();
        std::fs::write(
            apps[0].path.join("package.json"),
            r#"{"name":"@acme-app/shop-main","version":"1.0.0"}"#,
        )
        .unwrap();
        let hash_dir = tmp.path().join("0123456789abcdef0123456789abcdef");
        std::fs::create_dir(&hash_dir).unwrap();

        let opts = ReleaseOptions {
            command: "echo releasing {package} {env}; test {env} = test".to_string(),
            project_root: tmp.path().to_path_buf(),
            logs_dir: tmp.path().join("log"),
            concurrency: 2,
        };
        let targets = ReleaseTarget::parse_list(
            "packageName=@acme-app/shop-main&env=test&updateVersionNumType=patch,\
             packageName=@acme-app/shop-main&env=production&updateVersionNumType=patch,\
             packageName=@acme-app/lite&env=production",
        )
        .unwrap();

        let report = release(&apps, &targets, &opts).unwrap();

        assert_eq!(report.succeeded().count(), 1);
        assert_eq!(report.failed().count(), 2);
        assert!(!report.is_clean());
        assert_eq!(
            report.bumps,
            vec![("@acme-app/shop-main".to_string(), "1.0.0".to_string(), "1.0.1".to_string())]
        );
        assert_eq!(
            crate::core::version::read_app_version(&apps[0].path).unwrap(),
            "1.0.1"
        );
        assert_eq!(
            report.rerun_targets().unwrap(),
            "packageName=@acme-app/shop-main&env=production&appVersionType=trial&updateVersionNumType=patch,\
             packageName=@acme-app/lite&env=production&appVersionType=trial&updateVersionNumType=none"
        );

        let log = std::fs::read_to_string(report.log_dir.join("shop-main-release-log.md")).unwrap();
        assert!(log.contains("## [0]:shop-main#test-trial-patch"));
        assert!(log.contains("### Result: success"));
        assert!(log.contains("### Result: failed"));
        assert!(log.contains("releasing @acme-app/shop-main test"));
        assert!(report.log_dir.join("lite-release-log.md").is_file());

        assert_eq!(report.removed_temp_dirs, vec![hash_dir.clone()]);
        assert!(!hash_dir.exists());
    }
}
