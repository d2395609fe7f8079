//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell as CompletionShell;

use unipack::ops::release::ReleaseType;
use unipack::optimizer::DEFAULT_DIST_PATH;
use unipack::VersionBump;

/// unipack - build and release orchestration for uni-app mini-program monorepos
#[derive(Parser)]
#[command(name = "unipack")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Move the shared vendor directory into every subpackage and prune it
    Optimize(OptimizeArgs),

    /// Materialize apps from the template
    Create(CreateArgs),

    /// Show, bump or set app versions
    Version(VersionArgs),

    /// Run the release command for a batch of app targets
    Release(ReleaseArgs),

    /// Remove empty temp hash folders
    Cleanup(CleanupArgs),

    /// Copy subpackage plugin export files into the build output
    CopyPlugin(CopyPluginArgs),

    /// Adapt the build output to the system font size
    ElderTransform(ElderTransformArgs),

    /// List configured apps
    Apps(AppsArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct OptimizeArgs {
    /// Build output directory
    #[arg(short, long)]
    pub project_dist_path: Option<PathBuf>,

    /// Shared vendor directory name
    #[arg(short, long)]
    pub origin_dir_name: Option<String>,

    /// Subpackage directory prefix
    #[arg(short, long)]
    pub target_dir_tag: Option<String>,

    /// Only prune vendor components in the main subpackage (`=false` overrides config)
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub only_optimize_main_package: Option<bool>,

    /// Keep vendor pages reached through other vendor pages (`=false` overrides config)
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub deep_page_closure: Option<bool>,

    /// Regex for vendor references to the shared runtime bundle
    #[arg(long)]
    pub vendor_path_pattern: Option<String>,

    /// Regex for subpackage references into the vendor directory
    #[arg(long)]
    pub node_modules_path_pattern: Option<String>,

    /// Exit with an error if any stage reported a failure
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args)]
pub struct CreateArgs {
    /// Apps to create, by package name, key or index
    #[arg(value_name = "APP")]
    pub apps: Vec<String>,

    /// Create every configured app
    #[arg(short, long, conflicts_with = "apps")]
    pub all: bool,
}

#[derive(Args)]
pub struct VersionArgs {
    /// Apps to update, by package name, key or index
    #[arg(value_name = "APP")]
    pub apps: Vec<String>,

    /// Apply to every configured app
    #[arg(short, long, conflicts_with = "apps")]
    pub all: bool,

    /// Bump kind (none, patch, minor, major)
    #[arg(short, long, conflicts_with = "set")]
    pub bump: Option<VersionBump>,

    /// Set an exact version
    #[arg(long)]
    pub set: Option<String>,
}

#[derive(Args)]
pub struct ReleaseArgs {
    /// Comma-separated targets: packageName=…&env=…&appVersionType=…&updateVersionNumType=…
    #[arg(short = 's', long, conflicts_with_all = ["apps", "all"])]
    pub targets: Option<String>,

    /// Apps to release, by package name, key or index
    #[arg(long = "app", value_name = "APP")]
    pub apps: Vec<String>,

    /// Release every configured app
    #[arg(short, long)]
    pub all: bool,

    /// Envs to release (default: every releasable env of each app)
    #[arg(short, long = "env", value_name = "ENV")]
    pub envs: Vec<String>,

    /// Version types (trial, release)
    #[arg(short = 't', long = "type", value_name = "TYPE", default_value = "trial")]
    pub types: Vec<ReleaseType>,

    /// Version bump applied once per app
    #[arg(short, long, default_value = "patch")]
    pub bump: VersionBump,

    /// Skip materializing apps before releasing
    #[arg(long)]
    pub no_create: bool,
}

#[derive(Args)]
pub struct CleanupArgs {
    /// Directory to clean (defaults to the current directory)
    pub dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct CopyPluginArgs {
    /// Project directory containing src/pages.json
    #[arg(long)]
    pub project: Option<PathBuf>,

    /// Build output directory
    #[arg(short = 'p', long)]
    pub project_dist_path: Option<PathBuf>,
}

#[derive(Args)]
pub struct ElderTransformArgs {
    /// Build output directory
    #[arg(short = 'p', long, default_value = DEFAULT_DIST_PATH)]
    pub project_dist_path: PathBuf,
}

#[derive(Args)]
pub struct AppsArgs {}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: CompletionShell,
}
