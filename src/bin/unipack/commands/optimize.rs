//! `unipack optimize` command

use std::sync::Arc;

use anyhow::{bail, Result};

use crate::cli::OptimizeArgs;
use unipack::optimizer::{optimize, OptimizeError, OptimizeReport};
use unipack::util::config::{load_optimize_config, OptimizeConfig};
use unipack::util::diagnostic::{suggestions, Diagnostic};
use unipack::util::{GlobalContext, Shell, Status};
use unipack::Project;

pub fn execute(args: OptimizeArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = GlobalContext::new()?;

    // Global < project < flags
    let project = Project::discover_optional(&ctx)?;
    let mut config = load_optimize_config(
        ctx.config_path().as_deref(),
        project.as_ref().map(|p| &p.config().optimize),
    );
    config.merge(OptimizeConfig {
        project_dist_path: args.project_dist_path,
        origin_dir_name: args.origin_dir_name,
        target_dir_tag: args.target_dir_tag,
        only_optimize_main_package: args.only_optimize_main_package,
        deep_page_closure: args.deep_page_closure,
        vendor_path_pattern: args.vendor_path_pattern,
        node_modules_path_pattern: args.node_modules_path_pattern,
    });
    let opts = config.to_options();

    let root = opts.dist_root(ctx.cwd());
    shell.status(Status::Optimizing, root.display());
    let span = shell.span("optimize");

    let report = match optimize(&opts, ctx.cwd()) {
        Ok(report) => report,
        Err(e @ OptimizeError::VendorNotFound { .. }) => {
            let mut diag = Diagnostic::error(e.to_string()).with_suggestion(suggestions::NO_VENDOR);
            if let OptimizeError::VendorNotFound { searched, .. } = &e {
                for path in searched {
                    diag = diag.with_context(format!("searched {}", path.display()));
                }
            }
            return Err(super::report(diag, shell));
        }
        Err(e) => return Err(e.into()),
    };

    print_report(&report, shell);

    if args.strict && !report.is_clean() {
        bail!("optimize finished with {} failures", report.failure_count());
    }

    span.finish();
    Ok(())
}

fn print_report(report: &OptimizeReport, shell: &Shell) {
    let rewritten = report.subpackage_rewrites.files.succeeded.len();
    let vendor_rewritten = report.vendor_rewrites.files.succeeded.len();
    shell.status(
        Status::Rewrote,
        format!(
            "{} subpackage files, {} vendor files",
            rewritten, vendor_rewritten
        ),
    );

    for line in report
        .subpackage_rewrites
        .files
        .failure_lines()
        .into_iter()
        .chain(report.vendor_rewrites.files.failure_lines())
    {
        shell.warn(format!("rewrite failed: {}", line));
    }

    for sub in &report.copies.succeeded {
        shell.verbose_status(Status::Copied, format!("vendor into {}", sub));
    }
    shell.status(
        Status::Copied,
        format!("vendor into {} subpackages", report.copies.succeeded.len()),
    );
    for sub in &report.skipped_copies {
        shell.status(Status::Skipped, format!("{} already holds the vendor directory", sub));
    }
    for (sub, err) in &report.copies.failed {
        shell.warn(format!("copy into {} failed: {:#}", sub, err));
    }

    for summary in &report.prune_summaries {
        if summary.vendor_copy.is_none() {
            shell.verbose_status(Status::Skipped, format!("{} has no vendor pages", summary.subpackage));
            continue;
        }
        let components = if summary.components_untouched {
            "components untouched".to_string()
        } else {
            format!(
                "kept {} components, removed {}",
                summary.kept_components.len(),
                summary.removed_components.len()
            )
        };
        shell.status(
            Status::Pruned,
            format!(
                "{} (kept {} pages, removed {}; {})",
                summary.subpackage,
                summary.kept_pages.len(),
                summary.removed_pages.len(),
                components
            ),
        );
        for manifest in &summary.unreadable_manifests {
            shell.warn(format!("unreadable manifest {}", manifest.display()));
        }
    }
    for (sub, err) in &report.pruned.failed {
        shell.warn(format!("prune of {} failed: {:#}", sub, err));
    }

    match &report.origin_removed {
        Ok(true) => shell.status(Status::Removed, report.vendor.path.display()),
        Ok(false) => shell.status(
            Status::Skipped,
            format!("{} is kept in place", report.vendor.path.display()),
        ),
        Err(e) => shell.warn(format!("{:#}", e)),
    }
}
