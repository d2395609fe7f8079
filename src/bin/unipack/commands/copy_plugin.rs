//! `unipack copy-plugin` command

use std::sync::Arc;

use anyhow::{bail, Result};

use crate::cli::CopyPluginArgs;
use unipack::ops::copy_plugin_exports;
use unipack::optimizer::DEFAULT_DIST_PATH;
use unipack::util::{GlobalContext, Shell, Status};

pub fn execute(args: CopyPluginArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let project_dir = match args.project {
        Some(dir) => ctx.resolve(&dir),
        None => ctx.cwd().to_path_buf(),
    };
    let dist = match args.project_dist_path {
        Some(dist) => ctx.resolve(&dist),
        None => project_dir.join(DEFAULT_DIST_PATH),
    };

    let report = copy_plugin_exports(&project_dir, &dist)?;

    for path in &report.copies.succeeded {
        shell.status(Status::Copied, path.display());
    }
    for path in &report.missing {
        shell.status(Status::Skipped, format!("{} does not exist", path.display()));
    }
    for line in report.copies.failure_lines() {
        shell.status(Status::Failed, line);
    }

    if !report.copies.is_clean() {
        bail!("{} plugin exports failed to copy", report.copies.failed.len());
    }
    Ok(())
}
