//! Optimizer error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that stop the optimizer before it touches the build output.
#[derive(Debug, Error)]
pub enum OptimizeError {
    /// Neither `<root>/<vendor>` nor `<root>/<tag>/<vendor>` exists.
    #[error("{vendor_dir_name} does not exist in {}", .root.display())]
    VendorNotFound {
        root: PathBuf,
        vendor_dir_name: String,
        searched: Vec<PathBuf>,
    },

    /// The build output root itself is missing or unreadable.
    #[error("failed to read build output directory {}", .path.display())]
    UnreadableRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configured reference pattern is not a valid regex.
    #[error("invalid reference pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
