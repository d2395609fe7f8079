//! Core data structures for unipack.
//!
//! - Project configuration (`unipack.toml`)
//! - Apps and their derived identities
//! - Environment files, versions and `pages.json`

pub mod app;
pub mod env;
pub mod pages;
pub mod project;
pub mod version;

pub use app::{App, AppConfig, AppEnv, EnvMap};
pub use env::EnvKey;
pub use project::{LoaderKind, Project, ProjectConfig, PROJECT_FILE};
pub use version::VersionBump;
