//! unipack - build and release orchestration for uni-app mini-program monorepos
//!
//! This crate provides the core library functionality for unipack,
//! including the subpackage vendor optimizer, app materialization from a
//! shared template, and batch releases.

pub mod core;
pub mod ops;
pub mod optimizer;
pub mod util;

/// Test utilities for unipack unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides builders for compiled mini-program output
/// trees.
#[cfg(test)]
pub mod test_support;

pub use core::{App, AppConfig, Project, ProjectConfig, VersionBump};
pub use optimizer::{optimize, BatchResult, OptimizeError, OptimizeOptions, OptimizeReport};
pub use util::context::GlobalContext;
