//! Removing unused vendor pages and components from one subpackage.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::closure::{resolve_closure, ClosureOptions, VendorLayout, COMPONENTS_DIR};
use crate::util::fs::{child_dir_names, find_dir_named};

/// Settings shared by every subpackage.
#[derive(Debug, Clone)]
pub struct PruneOptions {
    pub vendor_dir_name: String,
    pub target_dir_tag: String,
    pub only_optimize_main_package: bool,
    pub deep_page_closure: bool,
}

/// What pruning did to one subpackage's vendor copy.
#[derive(Debug, Default)]
pub struct PruneSummary {
    pub subpackage: String,
    /// `None` when the subpackage has no vendor copy or no vendor pages tree.
    pub vendor_copy: Option<PathBuf>,
    pub kept_pages: BTreeSet<String>,
    pub removed_pages: Vec<String>,
    pub kept_components: BTreeSet<String>,
    pub removed_components: Vec<String>,
    /// Component pruning was skipped: a non-main subpackage under
    /// `only_optimize_main_package`, or no component is needed at all.
    pub components_untouched: bool,
    /// Manifests that could not be read during the walk.
    pub unreadable_manifests: Vec<PathBuf>,
    /// Directories that could not be removed.
    pub failed_removals: Vec<(PathBuf, anyhow::Error)>,
}

impl PruneSummary {
    fn empty(subpackage: &str) -> Self {
        PruneSummary {
            subpackage: subpackage.to_string(),
            ..Default::default()
        }
    }
}

/// Find the pages and components trees inside a vendor copy.
pub fn vendor_layout(vendor_copy: &Path, tag: &str) -> Option<VendorLayout> {
    let pages_dir = find_dir_named(vendor_copy, tag)?;

    let sibling = pages_dir
        .parent()
        .map(|p| p.join(COMPONENTS_DIR))
        .filter(|p| p.is_dir());
    let components_dir = sibling.or_else(|| {
        find_dir_named(vendor_copy, COMPONENTS_DIR).filter(|p| !p.starts_with(&pages_dir))
    });

    Some(VendorLayout {
        pages_dir,
        components_dir,
    })
}

/// Prune `<root>/<subpackage>/<vendor>` down to what the subpackage's own
/// pages reach.
pub fn prune_subpackage(root: &Path, subpackage: &str, opts: &PruneOptions) -> Result<PruneSummary> {
    let mut summary = PruneSummary::empty(subpackage);
    let sub_dir = root.join(subpackage);
    let vendor_copy = sub_dir.join(&opts.vendor_dir_name);

    if !vendor_copy.is_dir() {
        tracing::debug!("{} has no vendor copy", subpackage);
        return Ok(summary);
    }

    let seeds = child_dir_names(&sub_dir)
        .with_context(|| format!("failed to list pages of subpackage {}", subpackage))?;

    let Some(layout) = vendor_layout(&vendor_copy, &opts.target_dir_tag) else {
        tracing::debug!("{} vendor copy has no {} directory", subpackage, opts.target_dir_tag);
        return Ok(summary);
    };
    summary.vendor_copy = Some(vendor_copy);

    let closure = resolve_closure(
        &layout,
        &seeds,
        &ClosureOptions {
            vendor_dir_name: opts.vendor_dir_name.clone(),
            deep_page_closure: opts.deep_page_closure,
        },
    );
    summary.unreadable_manifests = closure.unreadable.iter().map(|(p, _)| p.clone()).collect();

    let needed_pages = closure.needed_pages();
    let (kept, removed) = remove_unlisted(&layout.pages_dir, &needed_pages, &mut summary.failed_removals)?;
    summary.kept_pages = kept;
    summary.removed_pages = removed;

    let is_main = subpackage == opts.target_dir_tag;
    if opts.only_optimize_main_package && !is_main {
        summary.components_untouched = true;
        return Ok(summary);
    }

    // Nothing needed leaves the components tree as copied
    let needed_components = closure.needed_components();
    if needed_components.is_empty() {
        summary.components_untouched = true;
        return Ok(summary);
    }

    if let Some(components_dir) = &layout.components_dir {
        let (kept, removed) =
            remove_unlisted(components_dir, &needed_components, &mut summary.failed_removals)?;
        summary.kept_components = kept;
        summary.removed_components = removed;
    }

    Ok(summary)
}

/// Remove child directories of `dir` whose names are not in `keep`.
fn remove_unlisted(
    dir: &Path,
    keep: &BTreeSet<String>,
    failures: &mut Vec<(PathBuf, anyhow::Error)>,
) -> Result<(BTreeSet<String>, Vec<String>)> {
    let mut kept = BTreeSet::new();
    let mut removed = Vec::new();

    for name in child_dir_names(dir)? {
        if keep.contains(&name) {
            kept.insert(name);
            continue;
        }

        let path = dir.join(&name);
        match fs::remove_dir_all(&path) {
            Ok(()) => {
                tracing::debug!("removed {}", path.display());
                removed.push(name);
            }
            Err(e) => {
                tracing::warn!("failed to remove {}: {}", path.display(), e);
                let err = anyhow::Error::new(e)
                    .context(format!("failed to remove {}", path.display()));
                failures.push((path, err));
            }
        }
    }

    Ok((kept, removed))
}
