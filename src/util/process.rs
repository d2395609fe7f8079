//! Running release commands through the platform shell.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use anyhow::{Context, Result};

/// A command line handed to `sh -c` (or `cmd /C` on Windows).
#[derive(Debug, Clone)]
pub struct ShellCommand {
    program: PathBuf,
    flag: &'static str,
    line: String,
    cwd: Option<PathBuf>,
}

impl ShellCommand {
    pub fn new(line: impl Into<String>) -> Self {
        let (program, flag) = if cfg!(windows) {
            (PathBuf::from("cmd"), "/C")
        } else {
            let sh = which::which("sh").unwrap_or_else(|_| PathBuf::from("sh"));
            (sh, "-c")
        };
        ShellCommand {
            program,
            flag,
            line: line.into(),
            cwd: None,
        }
    }

    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Run to completion with stdin closed and both output streams captured.
    pub fn exec(&self) -> Result<Output> {
        let mut cmd = Command::new(&self.program);
        cmd.arg(self.flag).arg(&self.line);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("failed to run `{}`", self.line))
    }
}

/// Combined stdout and stderr of a finished process, lossily decoded.
pub fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&stderr);
    }
    text
}
