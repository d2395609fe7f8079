//! `unipack apps` command

use std::sync::Arc;

use anyhow::Result;

use super::load_project;
use crate::cli::AppsArgs;
use unipack::util::fs::relative_path;
use unipack::util::{GlobalContext, Shell};

pub fn execute(_args: AppsArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let project = load_project(&ctx, shell)?;
    let apps = project.apps()?;

    if apps.is_empty() {
        shell.note("no apps configured");
        return Ok(());
    }

    // Zero-pad indices to the widest one
    let width = (apps.len() - 1).to_string().len();
    for app in &apps {
        let path = relative_path(project.root(), &app.path);
        shell.println(format!(
            "[{:0width$}] {} {} @{}",
            app.index,
            shell.paint_hex(app.sign_color, app.label()),
            app.package_name,
            path.display(),
            width = width
        ));
    }

    Ok(())
}
