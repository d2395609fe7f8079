//! Centralized shell output and progress management.
//!
//! Every user-facing line goes through [`Shell`]: a right-aligned colored
//! status word followed by the message, in the style of
//!
//! ```text
//!      Rewrote 12 files in 3 subpackages
//!       Copied node-modules into pagesA
//!       Pruned pagesA (kept 2 pages, removed 5)
//! ```
//!
//! Progress bars (via indicatif) are only drawn in normal verbosity.

use std::fmt::Display;
use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// --quiet: errors only, no progress
    Quiet,
    #[default]
    Normal,
    /// --verbose: immediate status lines, no progress bars
    Verbose,
}

/// Color output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl std::str::FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(format!(
                "invalid color choice '{}'; expected 'auto', 'always', or 'never'",
                s
            )),
        }
    }
}

/// Semantic status of an output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    // Done (green)
    Rewrote,
    Copied,
    Pruned,
    Removed,
    Created,
    Updated,
    Released,
    Finished,

    // Running (cyan)
    Optimizing,
    Creating,
    Releasing,

    Info,

    // Attention (yellow)
    Skipped,
    Warning,

    Failed,
    Error,
}

impl Status {
    fn as_str(&self) -> &'static str {
        match self {
            Status::Rewrote => "Rewrote",
            Status::Copied => "Copied",
            Status::Pruned => "Pruned",
            Status::Removed => "Removed",
            Status::Created => "Created",
            Status::Updated => "Updated",
            Status::Released => "Released",
            Status::Finished => "Finished",
            Status::Optimizing => "Optimizing",
            Status::Creating => "Creating",
            Status::Releasing => "Releasing",
            Status::Info => "Info",
            Status::Skipped => "Skipped",
            Status::Warning => "Warning",
            Status::Failed => "Failed",
            Status::Error => "error",
        }
    }

    fn color_code(&self) -> &'static str {
        match self {
            Status::Rewrote
            | Status::Copied
            | Status::Pruned
            | Status::Removed
            | Status::Created
            | Status::Updated
            | Status::Released
            | Status::Finished => "\x1b[1;32m",
            Status::Optimizing | Status::Creating | Status::Releasing => "\x1b[1;36m",
            Status::Info => "\x1b[1;34m",
            Status::Skipped | Status::Warning => "\x1b[1;33m",
            Status::Failed | Status::Error => "\x1b[1;31m",
        }
    }

    fn is_error(&self) -> bool {
        matches!(self, Status::Failed | Status::Error)
    }
}

const STATUS_WIDTH: usize = 12;

/// Central shell for all CLI output.
#[derive(Debug)]
pub struct Shell {
    verbosity: Verbosity,
    use_color: bool,
}

impl Shell {
    pub fn new(verbosity: Verbosity, color: ColorChoice) -> Self {
        let use_color = match color {
            ColorChoice::Auto => io::stderr().is_terminal(),
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        };

        Shell {
            verbosity,
            use_color,
        }
    }

    /// Create a shell from CLI flags. Quiet wins over verbose.
    pub fn from_flags(quiet: bool, verbose: bool, no_color: bool) -> Self {
        let verbosity = if quiet {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        };
        let color = if no_color {
            ColorChoice::Never
        } else {
            ColorChoice::Auto
        };
        Shell::new(verbosity, color)
    }

    pub fn is_quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }

    pub fn is_verbose(&self) -> bool {
        self.verbosity == Verbosity::Verbose
    }

    pub fn use_color(&self) -> bool {
        self.use_color
    }

    /// Print `{status:>12} {message}` to stderr.
    ///
    /// In quiet mode only error statuses are printed.
    pub fn status(&self, status: Status, msg: impl Display) {
        if self.is_quiet() && !status.is_error() {
            return;
        }
        eprintln!("{} {}", self.format_status(status), msg);
    }

    /// Print a status line only in verbose mode.
    pub fn verbose_status(&self, status: Status, msg: impl Display) {
        if self.is_verbose() {
            self.status(status, msg);
        }
    }

    pub fn note(&self, msg: impl Display) {
        self.status(Status::Info, msg);
    }

    pub fn warn(&self, msg: impl Display) {
        self.status(Status::Warning, msg);
    }

    pub fn error(&self, msg: impl Display) {
        self.status(Status::Error, msg);
    }

    /// Print a plain line to stdout. Used for command results (lists, rerun
    /// commands) that should survive redirection.
    pub fn println(&self, msg: impl Display) {
        println!("{}", msg);
    }

    /// Paint `text` in a `#rrggbb` color, when colors are enabled.
    pub fn paint_hex(&self, hex: &str, text: impl Display) -> String {
        match (self.use_color, parse_hex(hex)) {
            (true, Some((r, g, b))) => format!("\x1b[38;2;{};{};{}m{}\x1b[0m", r, g, b, text),
            _ => text.to_string(),
        }
    }

    fn format_status(&self, status: Status) -> String {
        let text = status.as_str();
        if self.use_color {
            format!(
                "{}{:>width$}\x1b[0m",
                status.color_code(),
                text,
                width = STATUS_WIDTH
            )
        } else {
            format!("{:>width$}", text, width = STATUS_WIDTH)
        }
    }

    /// Start a timed span that reports `Finished <what> in <duration>`.
    pub fn span(self: &Arc<Self>, what: impl Display) -> Span {
        Span {
            shell: Arc::clone(self),
            what: what.to_string(),
            start: Instant::now(),
        }
    }

    /// Create a progress bar. No-op in quiet and verbose modes.
    pub fn progress(&self, total: u64, msg: impl Display) -> Progress {
        Progress::new(self, total, msg.to_string())
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new(Verbosity::Normal, ColorChoice::Auto)
    }
}

fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// A timed operation.
pub struct Span {
    shell: Arc<Shell>,
    what: String,
    start: Instant,
}

impl Span {
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Report completion with the elapsed time.
    pub fn finish(self) {
        let elapsed = format_duration(self.start.elapsed());
        self.shell
            .status(Status::Finished, format!("{} in {}", self.what, elapsed));
    }
}

/// Progress bar wrapper that respects verbosity.
pub struct Progress {
    pb: Option<ProgressBar>,
}

impl Progress {
    fn new(shell: &Shell, total: u64, message: String) -> Self {
        let pb = if shell.is_quiet() || shell.is_verbose() || total <= 1 {
            None
        } else {
            let pb = ProgressBar::new(total);
            if let Ok(style) =
                ProgressStyle::default_bar().template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len}")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb.set_message(message);
            Some(pb)
        };

        Progress { pb }
    }

    pub fn inc(&self, delta: u64) {
        if let Some(pb) = &self.pb {
            pb.inc(delta);
        }
    }

    pub fn finish(&self) {
        if let Some(pb) = &self.pb {
            pb.finish_and_clear();
        }
    }
}

/// Format a duration in a human-readable way.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}
