//! Command implementations

pub mod apps;
pub mod cleanup;
pub mod completions;
pub mod copy_plugin;
pub mod create;
pub mod elder_transform;
pub mod optimize;
pub mod release;
pub mod version;

use anyhow::Result;
use thiserror::Error;

use unipack::core::app::{select_apps, AppError};
use unipack::core::project::ProjectError;
use unipack::util::diagnostic::{emit, suggestions, Diagnostic};
use unipack::util::{GlobalContext, Shell};
use unipack::{App, Project};

/// The error was already printed as a diagnostic; exit without repeating it.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct AlreadyReported(pub String);

/// Print `diag` and return an error that `main` exits on silently.
pub fn report(diag: Diagnostic, shell: &Shell) -> anyhow::Error {
    emit(&diag, shell.use_color());
    AlreadyReported(diag.message).into()
}

/// The project around the working directory, with a hint when there is none.
pub fn load_project(ctx: &GlobalContext, shell: &Shell) -> Result<Project> {
    Project::discover(ctx).map_err(|e| match e.downcast_ref::<ProjectError>() {
        Some(ProjectError::NotFound { .. }) => report(
            Diagnostic::error(e.to_string()).with_suggestion(suggestions::NO_PROJECT),
            shell,
        ),
        None => e,
    })
}

/// `--all` selects every app; otherwise the named apps, at least one.
pub fn select<'a>(apps: &'a [App], selectors: &[String], all: bool, shell: &Shell) -> Result<Vec<&'a App>> {
    if all {
        return Ok(apps.iter().collect());
    }
    if selectors.is_empty() {
        return Err(report(
            Diagnostic::error("no apps selected").with_suggestion("help: Name apps to act on, or pass `--all`"),
            shell,
        ));
    }

    select_apps(apps, selectors).map_err(|e| match e {
        AppError::NotFound(_) => report(
            Diagnostic::error(e.to_string()).with_suggestion(suggestions::APP_NOT_FOUND),
            shell,
        ),
        other => other.into(),
    })
}
