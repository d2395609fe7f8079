//! `unipack elder-transform` command

use std::sync::Arc;

use anyhow::{bail, Result};

use crate::cli::ElderTransformArgs;
use unipack::ops::elder_transform;
use unipack::util::{GlobalContext, Shell, Status};

pub fn execute(args: ElderTransformArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let root = ctx.resolve(&args.project_dist_path);

    let report = elder_transform(&root)?;

    for path in report.wxml.succeeded.iter().chain(&report.wxss.succeeded) {
        shell.verbose_status(Status::Updated, path.display());
    }
    shell.status(
        Status::Updated,
        format!(
            "{} of {} wxml, {} of {} wxss",
            report.wxml.succeeded.len(),
            report.wxml_total,
            report.wxss.succeeded.len(),
            report.wxss_total
        ),
    );
    for line in report.wxml.failure_lines().into_iter().chain(report.wxss.failure_lines()) {
        shell.status(Status::Failed, line);
    }

    if !report.is_clean() {
        bail!("elder transform failed for some files");
    }
    Ok(())
}
