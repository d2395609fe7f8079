//! Large-font adaptation of a compiled `mp-weixin` build.
//!
//! Every `.wxml` page gets a `<page-meta root-font-size="system"/>` line so
//! `rem` follows the system font size, and every `rpx` value inside a
//! `font-size` declaration in `.wxss` grows by half of the difference
//! between `1rem` and the default `16px`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use regex::{Captures, Regex};

use crate::optimizer::BatchResult;
use crate::util::fs::glob_files;

pub const PAGE_META: &str = r#"<page-meta root-font-size="system"/>"#;

/// Added to every scaled `rpx` value.
const FONT_SCALE_SUFFIX: &str = " + 0.5 * (1rem - 16px)";

static FONT_SIZE_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)font-size\s*:[^;]*\d+\s*rpx[^;]*;").expect("valid font-size pattern")
});

static RPX_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*rpx").expect("valid rpx pattern")
});

/// Files touched by one pass over the build output.
#[derive(Debug, Default)]
pub struct ElderReport {
    /// `.wxml` files that received the page-meta line.
    pub wxml: BatchResult<PathBuf>,
    pub wxml_total: usize,
    /// `.wxss` files with at least one scaled font size.
    pub wxss: BatchResult<PathBuf>,
    pub wxss_total: usize,
}

impl ElderReport {
    pub fn is_clean(&self) -> bool {
        self.wxml.is_clean() && self.wxss.is_clean()
    }
}

/// Prefix `content` with the page-meta line unless it already has one.
pub fn add_page_meta(content: &str) -> Option<String> {
    if content.contains(PAGE_META) {
        return None;
    }
    Some(format!("{}\n{}", PAGE_META, content))
}

/// Scale every `rpx` value inside `font-size` declarations.
///
/// Declarations that were already scaled are left alone, so a second pass
/// changes nothing.
pub fn scale_font_sizes(content: &str) -> Option<String> {
    let mut replaced = false;

    let updated = FONT_SIZE_DECL.replace_all(content, |decl: &Captures<'_>| {
        let decl = &decl[0];
        if decl.contains(FONT_SCALE_SUFFIX) {
            return decl.to_string();
        }
        replaced = true;
        RPX_VALUE
            .replace_all(decl, |value: &Captures<'_>| {
                format!("calc({}rpx{})", &value[1], FONT_SCALE_SUFFIX)
            })
            .into_owned()
    });

    replaced.then(|| updated.into_owned())
}

fn transform_files(
    files: &[PathBuf],
    transform: impl Fn(&str) -> Option<String>,
    result: &mut BatchResult<PathBuf>,
) {
    for file in files {
        let outcome = fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))
            .and_then(|content| match transform(&content) {
                Some(updated) => fs::write(file, updated)
                    .with_context(|| format!("failed to write {}", file.display()))
                    .map(|()| true),
                None => Ok(false),
            });

        match outcome {
            Ok(true) => {
                tracing::debug!("transformed {}", file.display());
                result.push_ok(file.clone());
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!("{:#}", e);
                result.push_err(file.clone(), e);
            }
        }
    }
}

/// Apply both transforms to every page and stylesheet under `root`.
pub fn elder_transform(root: &Path) -> Result<ElderReport> {
    if !root.is_dir() {
        bail!("build output {} does not exist", root.display());
    }

    let wxml_files = glob_files(root, &["**/*.wxml".to_string()])?;
    let wxss_files = glob_files(root, &["**/*.wxss".to_string()])?;
    tracing::info!(
        "elder transform over {}: {} wxml, {} wxss",
        root.display(),
        wxml_files.len(),
        wxss_files.len()
    );

    let mut report = ElderReport {
        wxml_total: wxml_files.len(),
        wxss_total: wxss_files.len(),
        ..ElderReport::default()
    };
    transform_files(&wxml_files, add_page_meta, &mut report.wxml);
    transform_files(&wxss_files, scale_font_sizes, &mut report.wxss);

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::BuildFixture;

    #[test]
    fn test_page_meta_added_once() {
        let once = add_page_meta("<view/>").unwrap();
        assert_eq!(once, "<page-meta root-font-size=\"system\"/>\n<view/>");
        assert!(add_page_meta(&once).is_none());
    }

    #[test]
    fn test_scales_only_font_size() {
        let css = ".a{font-size:28rpx;padding:20rpx}.b{FONT-SIZE: 24.5rpx !important;}";
        let out = scale_font_sizes(css).unwrap();
        assert_eq!(
            out,
            ".a{font-size:calc(28rpx + 0.5 * (1rem - 16px));padding:20rpx}\
             .b{FONT-SIZE: calc(24.5rpx + 0.5 * (1rem - 16px)) !important;}"
        );
        assert!(scale_font_sizes(&out).is_none());
    }

    #[test]
    fn test_no_rpx_font_size_is_untouched() {
        assert!(scale_font_sizes(".a{font-size:14px;width:10rpx}").is_none());
    }

    #[test]
    fn test_elder_transform_writes_changed_files() {
        let fx = BuildFixture::new()
            .file("pages/index/index.wxml", "<view/>")
            .file("pagesA/p1/index.wxml", "<page-meta root-font-size=\"system\"/>\n<text/>")
            .file("pages/index/index.wxss", ".t{font-size: 32rpx;}")
            .file("app.wxss", ".t{color:red;}");

        let report = elder_transform(fx.root()).unwrap();

        assert!(report.is_clean());
        assert_eq!(report.wxml_total, 2);
        assert_eq!(report.wxml.succeeded, vec![fx.root().join("pages/index/index.wxml")]);
        assert_eq!(report.wxss_total, 2);
        assert_eq!(report.wxss.succeeded, vec![fx.root().join("pages/index/index.wxss")]);
        assert_eq!(
            fx.read("pages/index/index.wxss"),
            ".t{font-size: calc(32rpx + 0.5 * (1rem - 16px));}"
        );
        assert_eq!(fx.read("app.wxss"), ".t{color:red;}");
    }

    #[test]
    fn test_missing_root_fails() {
        let fx = BuildFixture::new();
        assert!(elder_transform(&fx.root().join("missing")).is_err());
    }
}
