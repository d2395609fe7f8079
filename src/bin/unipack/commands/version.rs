//! `unipack version` command

use std::sync::Arc;

use anyhow::Result;

use super::{load_project, select};
use crate::cli::VersionArgs;
use unipack::core::version::{bump_app_version, parse_lenient, read_app_version, set_app_version};
use unipack::util::diagnostic::{suggestions, Diagnostic};
use unipack::util::{GlobalContext, Shell, Status};

pub fn execute(args: VersionArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let project = load_project(&ctx, shell)?;
    let apps = project.apps()?;

    // No selection lists every app
    let selected = if args.apps.is_empty() && !args.all && args.bump.is_none() && args.set.is_none() {
        apps.iter().collect()
    } else {
        select(&apps, &args.apps, args.all, shell)?
    };

    if let Some(version) = &args.set {
        // Normalize `2.1` to `2.1.0`
        let version = parse_lenient(version).to_string();
        for app in &selected {
            set_app_version(&app.path, &version).map_err(|e| not_created(e, shell))?;
            shell.status(Status::Updated, format!("{} to {}", app.package_name, version));
        }
        return Ok(());
    }

    for app in &selected {
        match args.bump {
            Some(kind) => {
                let (old, new) = bump_app_version(&app.path, kind).map_err(|e| not_created(e, shell))?;
                shell.status(
                    Status::Updated,
                    format!("{} {} -> {}", app.package_name, old, new),
                );
            }
            None => {
                let version = read_app_version(&app.path).map_err(|e| not_created(e, shell))?;
                shell.println(format!("{} {}", app.package_name, version));
            }
        }
    }

    Ok(())
}

fn not_created(err: anyhow::Error, shell: &Shell) -> anyhow::Error {
    super::report(
        Diagnostic::error(format!("{:#}", err)).with_suggestion(suggestions::APP_NOT_CREATED),
        shell,
    )
}
