//! Locating the shared vendor directory and the subpackages of a build.

use std::fs;
use std::path::{Path, PathBuf};

use super::errors::OptimizeError;

/// Where the shared vendor directory was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorLocation {
    /// Absolute path of the vendor directory.
    pub path: PathBuf,
    /// Set when the bundler placed vendor under `<root>/<tag>/` instead of
    /// the build root. That tag directory then owns the vendor copy in place.
    pub nested_in: Option<String>,
}

impl VendorLocation {
    pub fn is_nested(&self) -> bool {
        self.nested_in.is_some()
    }
}

/// Find `<root>/<vendor>`, falling back to `<root>/<tag>/<vendor>`.
pub fn locate_vendor(
    root: &Path,
    vendor_dir_name: &str,
    tag: &str,
) -> Result<VendorLocation, OptimizeError> {
    let at_root = root.join(vendor_dir_name);
    if at_root.is_dir() {
        return Ok(VendorLocation {
            path: at_root,
            nested_in: None,
        });
    }

    let nested = root.join(tag).join(vendor_dir_name);
    if nested.is_dir() {
        return Ok(VendorLocation {
            path: nested,
            nested_in: Some(tag.to_string()),
        });
    }

    Err(OptimizeError::VendorNotFound {
        root: root.to_path_buf(),
        vendor_dir_name: vendor_dir_name.to_string(),
        searched: vec![at_root, nested],
    })
}

/// Immediate child directories of `root` whose name starts with `tag`,
/// sorted by name.
pub fn list_subpackages(root: &Path, tag: &str) -> Result<Vec<String>, OptimizeError> {
    let unreadable = |source| OptimizeError::UnreadableRoot {
        path: root.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(root).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(tag) && entry.path().is_dir() {
            names.push(name);
        }
    }

    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_vendor_at_root() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("node-modules")).unwrap();
        fs::create_dir_all(tmp.path().join("pages/node-modules")).unwrap();

        let loc = locate_vendor(tmp.path(), "node-modules", "pages").unwrap();
        assert_eq!(loc.path, tmp.path().join("node-modules"));
        assert!(!loc.is_nested());
    }

    #[test]
    fn test_vendor_nested_under_tag() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("pages/node-modules")).unwrap();

        let loc = locate_vendor(tmp.path(), "node-modules", "pages").unwrap();
        assert_eq!(loc.path, tmp.path().join("pages/node-modules"));
        assert_eq!(loc.nested_in.as_deref(), Some("pages"));
    }

    #[test]
    fn test_vendor_missing() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("pagesA")).unwrap();

        let err = locate_vendor(tmp.path(), "node-modules", "pages").unwrap_err();
        match err {
            OptimizeError::VendorNotFound { searched, .. } => assert_eq!(searched.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_list_subpackages_filters_and_sorts() {
        let tmp = TempDir::new().unwrap();
        for dir in ["pagesB", "pages", "pagesA", "common", "static"] {
            fs::create_dir_all(tmp.path().join(dir)).unwrap();
        }
        fs::write(tmp.path().join("pages.json"), "{}").unwrap();

        let names = list_subpackages(tmp.path(), "pages").unwrap();
        assert_eq!(names, vec!["pages", "pagesA", "pagesB"]);
    }
}
