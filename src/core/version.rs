//! App version bumps.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use semver::Version;

use crate::util::fs::{read_to_string, write_string};

/// Version used when an app or template declares none.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Which component of the version to increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum VersionBump {
    #[default]
    None,
    Patch,
    Minor,
    Major,
}

impl VersionBump {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionBump::None => "none",
            VersionBump::Patch => "patch",
            VersionBump::Minor => "minor",
            VersionBump::Major => "major",
        }
    }
}

impl fmt::Display for VersionBump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersionBump {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" => Ok(VersionBump::None),
            "patch" => Ok(VersionBump::Patch),
            "minor" => Ok(VersionBump::Minor),
            "major" => Ok(VersionBump::Major),
            other => Err(format!(
                "invalid version bump '{}'; expected 'none', 'patch', 'minor', or 'major'",
                other
            )),
        }
    }
}

/// Parse `major.minor.patch`, tolerating missing or non-numeric parts
/// (they read as 0). A blank version reads as [`DEFAULT_VERSION`].
pub fn parse_lenient(version: &str) -> Version {
    let version = version.trim();
    if let Ok(parsed) = Version::parse(version) {
        return parsed;
    }
    if version.is_empty() {
        return Version::new(1, 0, 0);
    }

    let mut parts = version
        .trim_start_matches('v')
        .split('.')
        .map(|part| {
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse::<u64>().unwrap_or(0)
        });
    Version::new(
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    )
}

/// Apply `kind` to `version`. `None` returns the version unchanged.
pub fn bump(version: &str, kind: VersionBump) -> String {
    let current = parse_lenient(version);
    let next = match kind {
        VersionBump::None => {
            return if version.trim().is_empty() {
                DEFAULT_VERSION.to_string()
            } else {
                version.trim().to_string()
            };
        }
        VersionBump::Patch => Version::new(current.major, current.minor, current.patch + 1),
        VersionBump::Minor => Version::new(current.major, current.minor + 1, 0),
        VersionBump::Major => Version::new(current.major + 1, 0, 0),
    };
    next.to_string()
}

fn read_package_json(app_path: &Path) -> Result<serde_json::Value> {
    let path = app_path.join("package.json");
    if !path.is_file() {
        bail!("package.json does not exist in {}", app_path.display());
    }
    let content = read_to_string(&path)?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

/// Render JSON the way npm writes package.json: two-space indent plus a
/// trailing newline.
pub fn to_package_json_string(value: &serde_json::Value) -> Result<String> {
    let mut text = serde_json::to_string_pretty(value).context("failed to serialize package.json")?;
    text.push('\n');
    Ok(text)
}

/// The `version` of an app's package.json, or [`DEFAULT_VERSION`].
pub fn read_app_version(app_path: &Path) -> Result<String> {
    let package = read_package_json(app_path)?;
    Ok(package
        .get("version")
        .and_then(|v| v.as_str())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_VERSION)
        .to_string())
}

/// Rewrite the `version` of an app's package.json.
pub fn set_app_version(app_path: &Path, version: &str) -> Result<()> {
    let mut package = read_package_json(app_path)?;
    match package.as_object_mut() {
        Some(object) => {
            object.insert("version".to_string(), serde_json::Value::from(version));
        }
        None => bail!("package.json in {} is not an object", app_path.display()),
    }
    write_string(&app_path.join("package.json"), &to_package_json_string(&package)?)
}

/// Bump an app's version in place. Returns `(old, new)`.
pub fn bump_app_version(app_path: &Path, kind: VersionBump) -> Result<(String, String)> {
    let old = read_app_version(app_path)?;
    let new = bump(&old, kind);
    if new != old {
        set_app_version(app_path, &new)?;
    }
    Ok((old, new))
}
