//! `unipack create` command

use std::sync::Arc;

use anyhow::{bail, Result};

use super::{load_project, select};
use crate::cli::CreateArgs;
use unipack::ops::{create_apps, CreateOptions};
use unipack::util::{GlobalContext, Shell, Status};
use unipack::App;

pub fn execute(args: CreateArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let project = load_project(&ctx, shell)?;
    let apps = project.apps()?;
    let selected = select(&apps, &args.apps, args.all, shell)?;

    let span = shell.span(format!("creating {} apps", selected.len()));
    create(&selected, CreateOptions::from_project(&project), shell)?;
    span.finish();
    Ok(())
}

/// Materialize `apps` and report each one. Fails if any app failed.
pub fn create(apps: &[&App], opts: CreateOptions, shell: &Shell) -> Result<()> {
    shell.status(Status::Creating, format!("{} apps from {}", apps.len(), opts.template_dir.display()));

    let progress = shell.progress(apps.len() as u64, "creating");
    let (summaries, batch) = create_apps(apps, opts)?;
    progress.inc(apps.len() as u64);
    progress.finish();

    for summary in &summaries {
        let color = apps
            .iter()
            .find(|a| a.key == summary.key)
            .map(|a| a.sign_color)
            .unwrap_or_default();
        shell.status(
            Status::Created,
            format!(
                "{} v{} ({} files, {} env files, {} links)",
                shell.paint_hex(color, &summary.key),
                summary.version,
                summary.files,
                summary.env_files.len(),
                summary.links
            ),
        );
    }
    for (key, err) in &batch.failed {
        shell.status(Status::Failed, format!("{}: {:#}", key, err));
    }

    if !batch.is_clean() {
        bail!("{} of {} apps failed to create", batch.failed.len(), batch.len());
    }
    Ok(())
}
