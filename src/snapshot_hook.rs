//! snapshot hook (§4.9): after a commit that introduces new content,
//! optionally invoke a user-configured shell command to trigger an
//! external snapshot.

use std::process::Command;

use crate::config::KEY_SNAPSHOT_COMMAND;
use crate::error::Result;
use crate::repo::Repo;
use crate::types::Delta;

/// fire the snapshot hook for a just-committed diff, if configured and
/// warranted. Failures are logged warnings, never fatal (§4.13).
pub fn fire(repo: &Repo, deltas: &[Delta]) -> Result<()> {
    let Some(command) = repo.config().get(KEY_SNAPSHOT_COMMAND) else {
        return Ok(());
    };
    if command.is_empty() {
        return Ok(());
    }

    if !deltas.iter().any(Delta::introduces_new_content) {
        return Ok(());
    }

    match Command::new("/bin/sh").arg("-c").arg(command).status() {
        Ok(status) if status.success() => {}
        Ok(status) => {
            tracing::warn!(command, code = ?status.code(), "snapshot hook command exited non-zero");
        }
        Err(e) => {
            tracing::warn!(command, error = %e, "failed to spawn snapshot hook command");
        }
    }

    Ok(())
}
