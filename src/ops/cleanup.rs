//! Removal of the empty hash-named directories left behind by build tooling.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::util::fs::is_empty_dir;

/// Whether `name` is exactly 32 lowercase hex characters.
pub fn is_temp_hash_name(name: &str) -> bool {
    name.len() == 32 && name.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Delete every empty directory directly in `dir` whose name looks like a
/// temp hash. Returns the removed paths, sorted.
pub fn cleanup_temp_hash_folders(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read directory {}", dir.display()))?;

    let mut removed = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        let name = entry.file_name();

        if !is_dir || !is_temp_hash_name(&name.to_string_lossy()) || !is_empty_dir(&path) {
            continue;
        }

        match fs::remove_dir(&path) {
            Ok(()) => {
                tracing::debug!("removed temp folder {}", path.display());
                removed.push(path);
            }
            Err(e) => tracing::warn!("failed to remove {}: {}", path.display(), e),
        }
    }

    removed.sort();
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HASH: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_is_temp_hash_name() {
        assert!(is_temp_hash_name(HASH));
        assert!(!is_temp_hash_name("0123456789ABCDEF0123456789ABCDEF"));
        assert!(!is_temp_hash_name("0123456789abcdef"));
        assert!(!is_temp_hash_name("0123456789abcdef0123456789abcdeg"));
    }

    #[test]
    fn test_cleanup_only_empty_hash_dirs() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir(root.join(HASH)).unwrap();

        let busy = "ffffffffffffffffffffffffffffffff";
        fs::create_dir(root.join(busy)).unwrap();
        fs::write(root.join(busy).join("keep"), "").unwrap();

        fs::create_dir(root.join("apps")).unwrap();
        fs::write(root.join("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"), "").unwrap();

        let removed = cleanup_temp_hash_folders(root).unwrap();

        assert_eq!(removed, vec![root.join(HASH)]);
        assert!(root.join(busy).is_dir());
        assert!(root.join("apps").is_dir());
        assert!(root.join("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").is_file());
    }
}
