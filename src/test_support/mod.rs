//! Test utilities for unipack unit tests.
//!
//! Builders that lay out compiled mini-program output trees and vendor
//! copies in temporary directories.
//!
//! # Example
//!
//! ```rust,ignore
//! use unipack::test_support::BuildFixture;
//!
//! let fx = BuildFixture::new()
//!     .subpackage_page("pagesA", "p1")
//!     .vendor_page("p1", &[("c1", "../../components/c1/index")])
//!     .vendor_component("c1", &[]);
//! ```

pub mod fixtures;

pub use fixtures::*;
