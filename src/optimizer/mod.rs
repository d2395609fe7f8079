//! Mini-program subpackage optimizer.
//!
//! Moves the shared vendor directory of a compiled `mp-weixin` build into
//! every subpackage and prunes each copy down to the pages and components
//! that subpackage actually reaches.
//!
//! Stages, in order:
//!
//! 1. locate the vendor directory (`<root>/<vendor>` or `<root>/<tag>/<vendor>`)
//! 2. list subpackages (`<root>/<tag>*`)
//! 3. shorten subpackage references into vendor by one level
//! 4. lengthen vendor references to `common/vendor.js` by one level
//! 5. copy vendor into every subpackage
//! 6. prune every copy (in parallel)
//! 7. delete the original vendor directory
//!
//! Only stage 1 can fail the run. Every later stage is best effort and
//! reports per-item failures in the returned [`OptimizeReport`].

pub mod batch;
pub mod closure;
pub mod errors;
pub mod locate;
pub mod manifest;
pub mod prune;
pub mod rewrite;

use std::path::{Path, PathBuf};

use rayon::prelude::*;

pub use batch::BatchResult;
pub use closure::{resolve_closure, ClosureOptions, DependencyClosure, NodeId, VendorLayout};
pub use errors::OptimizeError;
pub use locate::{list_subpackages, locate_vendor, VendorLocation};
pub use prune::{prune_subpackage, PruneOptions, PruneSummary};
pub use rewrite::{DepthShift, RelativePathRewriter, RewriteOutcome};

use crate::util::fs::copy_dir_all;

/// Default build output, relative to the working directory.
pub const DEFAULT_DIST_PATH: &str = "./dist/build/mp-weixin";
/// Default name of the shared vendor directory.
pub const DEFAULT_VENDOR_DIR: &str = "node-modules";
/// Default subpackage directory prefix.
pub const DEFAULT_TARGET_TAG: &str = "pages";

/// Options for one optimizer run.
#[derive(Debug, Clone)]
pub struct OptimizeOptions {
    /// Build output root. Relative paths resolve against the working directory.
    pub project_dist_path: PathBuf,
    /// Name of the shared vendor directory.
    pub origin_dir_name: String,
    /// Prefix identifying subpackage directories and the vendor pages tree.
    pub target_dir_tag: String,
    /// Only prune vendor components in the main (`<tag>`) subpackage.
    pub only_optimize_main_package: bool,
    /// Walk vendor pages reached through other vendor pages.
    pub deep_page_closure: bool,
    /// Override for the vendor -> `common/vendor.js` reference pattern.
    pub vendor_path_pattern: Option<String>,
    /// Override for the subpackage -> vendor reference pattern.
    pub node_modules_path_pattern: Option<String>,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        OptimizeOptions {
            project_dist_path: PathBuf::from(DEFAULT_DIST_PATH),
            origin_dir_name: DEFAULT_VENDOR_DIR.to_string(),
            target_dir_tag: DEFAULT_TARGET_TAG.to_string(),
            only_optimize_main_package: false,
            deep_page_closure: false,
            vendor_path_pattern: None,
            node_modules_path_pattern: None,
        }
    }
}

impl OptimizeOptions {
    /// Absolute build output root.
    pub fn dist_root(&self, cwd: &Path) -> PathBuf {
        if self.project_dist_path.is_absolute() {
            self.project_dist_path.clone()
        } else {
            cwd.join(&self.project_dist_path)
        }
    }

    fn subpackage_rewriter(&self) -> Result<RelativePathRewriter, OptimizeError> {
        let pattern = self
            .node_modules_path_pattern
            .clone()
            .unwrap_or_else(|| rewrite::default_vendor_reference_pattern(&self.origin_dir_name));
        Ok(RelativePathRewriter::new(&pattern, DepthShift::Up)?.with_extensions(&["js", "json"]))
    }

    fn vendor_rewriter(&self) -> Result<RelativePathRewriter, OptimizeError> {
        let pattern = self
            .vendor_path_pattern
            .as_deref()
            .unwrap_or(rewrite::DEFAULT_VENDOR_BUNDLE_PATTERN);
        RelativePathRewriter::new(pattern, DepthShift::Down)
    }

    fn prune_options(&self) -> PruneOptions {
        PruneOptions {
            vendor_dir_name: self.origin_dir_name.clone(),
            target_dir_tag: self.target_dir_tag.clone(),
            only_optimize_main_package: self.only_optimize_main_package,
            deep_page_closure: self.deep_page_closure,
        }
    }
}

/// Everything an optimizer run did.
#[derive(Debug)]
pub struct OptimizeReport {
    pub root: PathBuf,
    pub vendor: VendorLocation,
    pub subpackages: Vec<String>,
    /// Stage 3.
    pub subpackage_rewrites: RewriteOutcome,
    /// Stage 4. Empty when vendor was nested (it already sits at subpackage depth).
    pub vendor_rewrites: RewriteOutcome,
    /// Stage 5, by subpackage name.
    pub copies: BatchResult<String>,
    /// Subpackages that already held the vendor directory in place.
    pub skipped_copies: Vec<String>,
    /// Stage 6, by subpackage name.
    pub pruned: BatchResult<String>,
    pub prune_summaries: Vec<PruneSummary>,
    /// Stage 7. `Ok(false)` when the origin was kept as a subpackage's own copy.
    pub origin_removed: anyhow::Result<bool>,
}

impl OptimizeReport {
    /// True when no stage recorded a failure.
    pub fn is_clean(&self) -> bool {
        self.subpackage_rewrites.files.is_clean()
            && self.vendor_rewrites.files.is_clean()
            && self.copies.is_clean()
            && self.pruned.is_clean()
            && self.origin_removed.is_ok()
    }

    /// Number of recorded failures across stages.
    pub fn failure_count(&self) -> usize {
        self.subpackage_rewrites.files.failed.len()
            + self.vendor_rewrites.files.failed.len()
            + self.copies.failed.len()
            + self.pruned.failed.len()
            + usize::from(self.origin_removed.is_err())
    }

    /// Summary for one subpackage.
    pub fn summary(&self, subpackage: &str) -> Option<&PruneSummary> {
        self.prune_summaries.iter().find(|s| s.subpackage == subpackage)
    }
}

/// Run every stage against the build output selected by `opts`.
pub fn optimize(opts: &OptimizeOptions, cwd: &Path) -> Result<OptimizeReport, OptimizeError> {
    let root = opts.dist_root(cwd);

    let vendor = locate_vendor(&root, &opts.origin_dir_name, &opts.target_dir_tag)?;
    let subpackages = list_subpackages(&root, &opts.target_dir_tag)?;
    let subpackage_rewriter = opts.subpackage_rewriter()?;
    let vendor_rewriter = opts.vendor_rewriter()?;

    tracing::info!(
        "optimizing {} subpackages against {}",
        subpackages.len(),
        vendor.path.display()
    );

    // Stages 3 and 4 touch disjoint directories.
    let (subpackage_rewrites, vendor_rewrites) = rayon::join(
        || rewrite_subpackages(&root, &subpackages, &vendor, &subpackage_rewriter),
        || {
            if vendor.is_nested() {
                RewriteOutcome::default()
            } else {
                vendor_rewriter.rewrite_dir(&vendor.path)
            }
        },
    );

    let (copies, skipped_copies) = copy_vendor(&root, &subpackages, &vendor, &opts.origin_dir_name);

    let prune_opts = opts.prune_options();
    let results: Vec<_> = subpackages
        .par_iter()
        .map(|sub| (sub.clone(), prune_subpackage(&root, sub, &prune_opts)))
        .collect();

    let mut pruned = BatchResult::new();
    let mut prune_summaries = Vec::new();
    for (sub, result) in results {
        match result {
            Ok(summary) => {
                if summary.failed_removals.is_empty() {
                    pruned.push_ok(sub);
                } else {
                    let err = anyhow::anyhow!(
                        "{} vendor directories could not be removed",
                        summary.failed_removals.len()
                    );
                    pruned.push_err(sub, err);
                }
                prune_summaries.push(summary);
            }
            Err(e) => {
                tracing::warn!("failed to prune {}: {:#}", sub, e);
                pruned.push_err(sub, e);
            }
        }
    }

    let origin_removed = remove_origin(&vendor);

    Ok(OptimizeReport {
        root,
        vendor,
        subpackages,
        subpackage_rewrites,
        vendor_rewrites,
        copies,
        skipped_copies,
        pruned,
        prune_summaries,
        origin_removed,
    })
}

fn rewrite_subpackages(
    root: &Path,
    subpackages: &[String],
    vendor: &VendorLocation,
    rewriter: &RelativePathRewriter,
) -> RewriteOutcome {
    let mut outcome = RewriteOutcome::default();
    for sub in subpackages {
        // The in-place owner already references vendor at the right depth
        if vendor.nested_in.as_deref() == Some(sub.as_str()) {
            continue;
        }
        outcome.extend(rewriter.rewrite_dir(&root.join(sub)));
    }
    outcome
}

fn copy_vendor(
    root: &Path,
    subpackages: &[String],
    vendor: &VendorLocation,
    vendor_dir_name: &str,
) -> (BatchResult<String>, Vec<String>) {
    let mut copies = BatchResult::new();
    let mut skipped = Vec::new();

    for sub in subpackages {
        let target = root.join(sub).join(vendor_dir_name);
        if target == vendor.path {
            tracing::info!("skipping copy for {}: source and target are the same", sub);
            skipped.push(sub.clone());
            continue;
        }

        let result = copy_dir_all(&vendor.path, &target);
        if let Err(e) = &result {
            tracing::warn!("failed to copy {} into {}: {:#}", vendor_dir_name, sub, e);
        }
        copies.record(sub.clone(), result);
    }

    (copies, skipped)
}

fn remove_origin(vendor: &VendorLocation) -> anyhow::Result<bool> {
    if vendor.is_nested() {
        return Ok(false);
    }

    std::fs::remove_dir_all(&vendor.path).map_err(|e| {
        tracing::warn!("failed to delete {}: {}", vendor.path.display(), e);
        anyhow::Error::new(e).context(format!("failed to delete {}", vendor.path.display()))
    })?;
    Ok(true)
}
