//! High-level operations.
//!
//! This module contains the implementation of unipack commands that act on
//! a project's apps. The build output optimizer lives in [`crate::optimizer`].

pub mod cleanup;
pub mod copy_plugin;
pub mod create;
pub mod elder;
pub mod loader;
pub mod release;

use anyhow::{Context, Result};
use rayon::prelude::*;

pub use cleanup::{cleanup_temp_hash_folders, is_temp_hash_name};
pub use copy_plugin::{copy_plugin_exports, CopyPluginReport};
pub use create::{create_apps, CreateOptions, MaterializeSummary, Template};
pub use elder::{elder_transform, ElderReport};
pub use release::{release, ReleaseOptions, ReleaseReport, ReleaseTarget, ReleaseType};

/// Map `f` over `items` on a dedicated pool of `concurrency` threads.
/// Results keep the order of `items`.
pub fn run_batch<T, R, F>(items: &[T], concurrency: usize, f: F) -> Result<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(concurrency.max(1))
        .build()
        .context("failed to start worker pool")?;
    Ok(pool.install(|| items.par_iter().map(f).collect()))
}
