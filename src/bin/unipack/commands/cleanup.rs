//! `unipack cleanup` command

use std::sync::Arc;

use anyhow::Result;

use crate::cli::CleanupArgs;
use unipack::ops::cleanup_temp_hash_folders;
use unipack::util::{GlobalContext, Shell, Status};

pub fn execute(args: CleanupArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let dir = match args.dir {
        Some(dir) => ctx.resolve(&dir),
        None => ctx.cwd().to_path_buf(),
    };

    let removed = cleanup_temp_hash_folders(&dir)?;
    for path in &removed {
        shell.verbose_status(Status::Removed, path.display());
    }
    shell.status(
        Status::Removed,
        format!("{} temp folders in {}", removed.len(), dir.display()),
    );

    Ok(())
}
