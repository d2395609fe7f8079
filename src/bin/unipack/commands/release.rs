//! `unipack release` command

use std::sync::Arc;

use anyhow::{bail, Result};

use super::{load_project, select};
use crate::cli::ReleaseArgs;
use unipack::ops::release::{expand_targets, release, ReleaseOptions, ReleaseReport, ReleaseTarget};
use unipack::ops::CreateOptions;
use unipack::util::{GlobalContext, Shell, Status};
use unipack::App;

pub fn execute(args: ReleaseArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let project = load_project(&ctx, shell)?;
    let apps = project.apps()?;
    let opts = ReleaseOptions::from_project(&project)?;

    let targets = match &args.targets {
        Some(list) => ReleaseTarget::parse_list(list)?,
        None => {
            let selected = select(&apps, &args.apps, args.all, shell)?;
            expand_targets(&selected, &args.envs, &args.types, args.bump)
        }
    };
    if targets.is_empty() {
        bail!("nothing to release; no selected app has a releasable env");
    }

    let mut release_apps: Vec<&App> = Vec::new();
    for target in &targets {
        if let Some(app) = apps.iter().find(|a| a.package_name == target.package_name) {
            if !release_apps.iter().any(|a| a.index == app.index) {
                release_apps.push(app);
            }
        }
    }

    for app in &release_apps {
        let lines: Vec<String> = targets
            .iter()
            .filter(|t| t.package_name == app.package_name)
            .map(|t| format!("{}-{}-{}", t.version_type, t.env, t.bump))
            .collect();
        shell.status(
            Status::Releasing,
            format!(
                "{} [{}]: {}",
                shell.paint_hex(app.sign_color, app.label()),
                app.key,
                lines.join(", ")
            ),
        );
    }

    if project.config().release.create && !args.no_create {
        super::create::create(&release_apps, CreateOptions::from_project(&project), shell)?;
    }

    let span = shell.span(format!("release of {} targets", targets.len()));
    let report = release(&apps, &targets, &opts)?;
    print_report(&report, shell);

    if let Some(rerun) = report.rerun_targets() {
        shell.note("re-run the failed targets from the project root with:");
        shell.println(format!("unipack release --targets \"{}\"", rerun));
        bail!(
            "{} of {} release targets failed",
            report.failed().count(),
            report.outcomes.len()
        );
    }

    span.finish();
    Ok(())
}

fn print_report(report: &ReleaseReport, shell: &Shell) {
    for (package, old, new) in &report.bumps {
        shell.status(Status::Updated, format!("{} {} -> {}", package, old, new));
    }
    for outcome in report.succeeded() {
        shell.status(Status::Released, shell.paint_hex(outcome.sign_color, &outcome.title));
    }
    for outcome in report.failed() {
        shell.status(Status::Failed, shell.paint_hex(outcome.sign_color, &outcome.title));
    }
    if !report.removed_temp_dirs.is_empty() {
        shell.verbose_status(
            Status::Removed,
            format!("{} temp folders", report.removed_temp_dirs.len()),
        );
    }
    shell.note(format!("logs in {}", report.log_dir.display()));
}
