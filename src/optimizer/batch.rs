//! Partial-failure results for best-effort stages.

use std::path::Path;

/// Outcome of a stage that processes many items and keeps going on failure.
#[derive(Debug)]
pub struct BatchResult<T> {
    /// Items the stage finished successfully.
    pub succeeded: Vec<T>,
    /// Items that failed, with the error that stopped them.
    pub failed: Vec<(T, anyhow::Error)>,
}

impl<T> BatchResult<T> {
    pub fn new() -> Self {
        BatchResult {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn push_ok(&mut self, item: T) {
        self.succeeded.push(item);
    }

    pub fn push_err(&mut self, item: T, err: anyhow::Error) {
        self.failed.push((item, err));
    }

    /// Record `result` under `item`.
    pub fn record(&mut self, item: T, result: anyhow::Result<()>) {
        match result {
            Ok(()) => self.push_ok(item),
            Err(e) => self.push_err(item, e),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fold another batch into this one.
    pub fn extend(&mut self, other: BatchResult<T>) {
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
    }
}

impl<T> Default for BatchResult<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: AsRef<Path>> BatchResult<T> {
    /// One line per failed item, `item: error`.
    pub fn failure_lines(&self) -> Vec<String> {
        self.failed
            .iter()
            .map(|(item, err)| format!("{}: {:#}", item.as_ref().display(), err))
            .collect()
    }
}
