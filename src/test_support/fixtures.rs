//! On-disk fixtures for build output trees.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::optimizer::closure::{VendorLayout, COMPONENTS_DIR};

/// Render an `index.json` with the given `usingComponents` entries.
pub fn manifest_json(using: &[(&str, &str)]) -> String {
    let entries: serde_json::Map<String, serde_json::Value> = using
        .iter()
        .map(|(tag, path)| (tag.to_string(), serde_json::Value::from(*path)))
        .collect();
    serde_json::json!({ "component": true, "usingComponents": entries }).to_string()
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// A standalone vendor copy: `<tmp>/node-modules/{pages,components}`.
pub struct VendorFixture {
    tmp: TempDir,
}

impl VendorFixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("node-modules/pages")).unwrap();
        fs::create_dir_all(tmp.path().join("node-modules").join(COMPONENTS_DIR)).unwrap();
        VendorFixture { tmp }
    }

    pub fn root(&self) -> PathBuf {
        self.tmp.path().join("node-modules")
    }

    pub fn page(self, name: &str, using: &[(&str, &str)]) -> Self {
        let path = format!("pages/{}/index.json", name);
        self.file(&path, &manifest_json(using))
    }

    pub fn page_component(self, page: &str, name: &str, using: &[(&str, &str)]) -> Self {
        let path = format!("pages/{}/components/{}/index.json", page, name);
        self.file(&path, &manifest_json(using))
    }

    pub fn component(self, name: &str, using: &[(&str, &str)]) -> Self {
        let path = format!("components/{}/index.json", name);
        self.file(&path, &manifest_json(using))
    }

    /// Write a raw file relative to the vendor root.
    pub fn file(self, rel: &str, content: &str) -> Self {
        write_file(&self.root().join(rel), content);
        self
    }

    pub fn layout(&self) -> VendorLayout {
        VendorLayout {
            pages_dir: self.root().join("pages"),
            components_dir: Some(self.root().join(COMPONENTS_DIR)),
        }
    }
}

impl Default for VendorFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A compiled `mp-weixin` output tree with a shared vendor directory.
pub struct BuildFixture {
    tmp: TempDir,
    vendor: PathBuf,
}

impl BuildFixture {
    /// Vendor at `<root>/node-modules`.
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let vendor = PathBuf::from("node-modules");
        fs::create_dir_all(tmp.path().join(&vendor)).unwrap();
        BuildFixture { tmp, vendor }
    }

    /// Vendor already placed at `<root>/pages/node-modules`.
    pub fn nested() -> Self {
        let tmp = TempDir::new().unwrap();
        let vendor = PathBuf::from("pages/node-modules");
        fs::create_dir_all(tmp.path().join(&vendor)).unwrap();
        BuildFixture { tmp, vendor }
    }

    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    pub fn vendor_root(&self) -> PathBuf {
        self.tmp.path().join(&self.vendor)
    }

    /// An own page of a subpackage: `<root>/<sub>/<page>/index.json`.
    pub fn subpackage_page(self, sub: &str, page: &str) -> Self {
        let path = format!("{}/{}/index.json", sub, page);
        self.file(&path, &manifest_json(&[]))
    }

    pub fn vendor_page(self, name: &str, using: &[(&str, &str)]) -> Self {
        let path = self.vendor.join("pages").join(name).join("index.json");
        write_file(&self.tmp.path().join(path), &manifest_json(using));
        self
    }

    pub fn vendor_component(self, name: &str, using: &[(&str, &str)]) -> Self {
        let path = self.vendor.join(COMPONENTS_DIR).join(name).join("index.json");
        write_file(&self.tmp.path().join(path), &manifest_json(using));
        self
    }

    /// Write a raw file relative to the build root.
    pub fn file(self, rel: &str, content: &str) -> Self {
        write_file(&self.tmp.path().join(rel), content);
        self
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.tmp.path().join(rel)).unwrap()
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.tmp.path().join(rel).exists()
    }
}

impl Default for BuildFixture {
    fn default() -> Self {
        Self::new()
    }
}
