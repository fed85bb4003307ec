//! restore planner (§4.8): recovers a single file's real content from
//! whichever auxiliary store snapshot can supply it, walking back through
//! history from the target revision until one is found.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use crate::aux::{all_snapshots, backend_for, Snapshot};
use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::{read_blob, read_commit, read_tree};
use crate::refs::{read_head, resolve_revision};
use crate::repo::Repo;
use crate::tree_builder::find_entry_at_path;
use crate::types::{EntryKind, Tree};

/// restore `abs_path` from `refish` (defaulting to `HEAD`), optionally
/// restricted to a single aux store by name (§4.8).
pub fn restore(repo: &Repo, abs_path: &Path, refish: Option<&str>, store_filter: Option<&str>) -> Result<()> {
    let head = read_head(repo)?.ok_or(Error::NoHead)?;

    if abs_path.exists() {
        return Err(Error::TargetExists(abs_path.to_path_buf()));
    }

    let target_commit_hash = match refish {
        Some(r) => resolve_for_restore(repo, r)?,
        None => head,
    };

    let rel = repo.relpath(abs_path)?;
    let commit = read_commit(repo, &target_commit_hash)?;
    let tree = read_tree(repo, &commit.tree)?;

    let kind = find_entry_at_path(repo, &tree, &rel)?.ok_or(Error::PathNotFound)?;

    match kind {
        EntryKind::Subtree { .. } => Err(Error::RestoreDirectory),
        EntryKind::SymlinkBlob { hash } => restore_symlink(repo, hash, abs_path),
        EntryKind::RegularBlob { hash } => {
            restore_regular(repo, target_commit_hash, &rel, hash, abs_path, store_filter)
        }
    }
}

/// resolve `refish` to a commit: a known snapshot's name substitutes its
/// base commit id, otherwise it is resolved as an ordinary revision.
fn resolve_for_restore(repo: &Repo, refish: &str) -> Result<Hash> {
    if let Some(snapshot) = all_snapshots(repo)?.into_iter().find(|s| s.name() == refish) {
        return Ok(snapshot.base_commit_id);
    }
    resolve_revision(repo, refish)
}

fn restore_symlink(repo: &Repo, hash: Hash, abs_path: &Path) -> Result<()> {
    let target = read_blob(repo, &hash)?;
    let target = PathBuf::from(OsStr::from_bytes(&target));
    std::os::unix::fs::symlink(&target, abs_path).map_err(|source| Error::Io {
        path: abs_path.to_path_buf(),
        source,
    })
}

fn restore_regular(
    repo: &Repo,
    from_commit: Hash,
    rel: &str,
    target_oid: Hash,
    abs_path: &Path,
    store_filter: Option<&str>,
) -> Result<()> {
    let all_snaps = all_snapshots(repo)?;

    let mut candidates: Vec<(Snapshot, String)> = Vec::new();
    let mut current = Some(from_commit);
    while let Some(hash) = current {
        let commit = read_commit(repo, &hash)?;
        let matching: Vec<Snapshot> = all_snaps
            .iter()
            .filter(|s| s.base_commit_id == hash)
            .cloned()
            .collect();

        if !matching.is_empty() {
            let tree = read_tree(repo, &commit.tree)?;
            if let Some(found_path) = find_object(repo, &tree, target_oid, rel)? {
                for snapshot in matching {
                    candidates.push((snapshot, found_path.clone()));
                }
            }
        }

        current = commit.parent;
    }

    let (selected, excluded): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|(s, _)| store_filter.map_or(true, |f| s.store == f));

    for (snapshot, path) in &selected {
        match try_download(repo, snapshot, path, abs_path) {
            Ok(()) => return Ok(()),
            Err(e) => {
                tracing::warn!(store = %snapshot.name(), error = %e, "restore candidate failed, trying next");
            }
        }
    }

    if !excluded.is_empty() {
        let names: Vec<String> = excluded.iter().map(|(s, _)| s.name()).collect();
        tracing::warn!(excluded = ?names, "restore candidates excluded by store filter");
    }

    Err(Error::CouldNotRestore)
}

fn try_download(repo: &Repo, snapshot: &Snapshot, rel_path: &str, destination: &Path) -> Result<()> {
    let store_type = repo
        .config()
        .aux_store_type(&snapshot.store)
        .ok_or(Error::UnknownStore)?;
    let url = repo
        .config()
        .aux_store_url(&snapshot.store)
        .ok_or(Error::UnknownStore)?;

    let backend = backend_for(store_type, url)?;
    backend.restore(snapshot, rel_path, destination)
}

/// path-hint search (§4.8): try the hint first, then fall back to a
/// depth-first scan of the tree (sorted-entry order, so deterministic).
/// Only returns the hint if the object actually found there matches `oid` —
/// an earlier draft returned the hint unconditionally, which is unsafe.
fn find_object(repo: &Repo, tree: &Tree, oid: Hash, hint_rel_path: &str) -> Result<Option<String>> {
    if !hint_rel_path.is_empty() {
        if let Some(kind) = find_entry_at_path(repo, tree, hint_rel_path)? {
            if kind.hash() == oid {
                return Ok(Some(hint_rel_path.to_string()));
            }
        }
    }
    find_object_rec(repo, tree, "", oid)
}

fn find_object_rec(repo: &Repo, tree: &Tree, prefix: &str, oid: Hash) -> Result<Option<String>> {
    for entry in tree.entries() {
        let path = if prefix.is_empty() {
            entry.name.clone()
        } else {
            format!("{prefix}/{}", entry.name)
        };
        match entry.kind {
            EntryKind::Subtree { hash } => {
                let subtree = read_tree(repo, &hash)?;
                if let Some(found) = find_object_rec(repo, &subtree, &path, oid)? {
                    return Ok(Some(found));
                }
            }
            leaf => {
                if leaf.hash() == oid {
                    return Ok(Some(path));
                }
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aux;
    use crate::object::write_blob;
    use crate::ops::commit;
    use crate::refs::write_ref;
    use crate::types::{Index, IndexEntry, IndexMode};
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn test_repo() -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let repo = Repo::init(&dir.path().join("repo")).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_restore_fails_without_head() {
        let (dir, repo) = test_repo();
        let dest = dir.path().join("out.txt");
        let result = restore(&repo, &dest, None, None);
        assert!(matches!(result, Err(Error::NoHead)));
    }

    #[test]
    fn test_restore_refuses_existing_target() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("SOD_COMMIT_DATE", "0 +0000");

        let (dir, repo) = test_repo();
        let hash = write_blob(&repo, b"40aff2e9abcdef0123456789abcdef0123456789\n").unwrap();
        let mut index = Index::new();
        index.upsert(IndexEntry::new("a.txt", IndexMode::RegularBlob, hash));
        commit(&repo, &index, "Initial", true).unwrap();

        let dest = dir.path().join("exists.txt");
        std::fs::write(&dest, "already here").unwrap();

        let result = restore(&repo, &dest, None, None);
        assert!(matches!(result, Err(Error::TargetExists(_))));

        std::env::remove_var("SOD_COMMIT_DATE");
    }

    #[test]
    fn test_restore_missing_path_fails() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("SOD_COMMIT_DATE", "0 +0000");

        let (dir, repo) = test_repo();
        let hash = write_blob(&repo, b"40aff2e9abcdef0123456789abcdef0123456789\n").unwrap();
        let mut index = Index::new();
        index.upsert(IndexEntry::new("a.txt", IndexMode::RegularBlob, hash));
        commit(&repo, &index, "Initial", true).unwrap();

        let dest = repo.worktree_path().join("missing.txt");
        let result = restore(&repo, &dest, None, None);
        assert!(matches!(result, Err(Error::PathNotFound)));

        std::env::remove_var("SOD_COMMIT_DATE");
    }

    #[test]
    fn test_restore_symlink_recreates_link() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("SOD_COMMIT_DATE", "0 +0000");

        let (_dir, repo) = test_repo();
        let hash = write_blob(&repo, b"../target").unwrap();
        let mut index = Index::new();
        index.upsert(IndexEntry::new("link", IndexMode::SymlinkBlob, hash));
        commit(&repo, &index, "Initial", true).unwrap();

        let dest = repo.worktree_path().join("link");
        restore(&repo, &dest, None, None).unwrap();

        let target = std::fs::read_link(&dest).unwrap();
        assert_eq!(target, PathBuf::from("../target"));

        std::env::remove_var("SOD_COMMIT_DATE");
    }

    #[test]
    fn test_restore_regular_with_no_snapshots_fails() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("SOD_COMMIT_DATE", "0 +0000");

        let (_dir, repo) = test_repo();
        let hash = write_blob(&repo, b"40aff2e9abcdef0123456789abcdef0123456789\n").unwrap();
        let mut index = Index::new();
        index.upsert(IndexEntry::new("a.txt", IndexMode::RegularBlob, hash));
        commit(&repo, &index, "Initial", true).unwrap();

        let dest = repo.worktree_path().join("a.txt.restored");
        // reparent the lookup at the original rel path via a symlink target trick is
        // unnecessary here: no snapshot refs exist at all, so any regular-blob
        // restore must fail with CouldNotRestore.
        let result = restore_regular(&repo, read_head(&repo).unwrap().unwrap(), "a.txt", hash, &dest, None);
        assert!(matches!(result, Err(Error::CouldNotRestore)));

        std::env::remove_var("SOD_COMMIT_DATE");
    }

    #[test]
    fn test_restore_directory_is_unsupported() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("SOD_COMMIT_DATE", "0 +0000");

        let (_dir, repo) = test_repo();
        let hash = write_blob(&repo, b"40aff2e9abcdef0123456789abcdef0123456789\n").unwrap();
        let mut index = Index::new();
        index.upsert(IndexEntry::new("sub/a.txt", IndexMode::RegularBlob, hash));
        commit(&repo, &index, "Initial", true).unwrap();

        let dest = repo.worktree_path().join("sub");
        let result = restore(&repo, &dest, None, None);
        assert!(matches!(result, Err(Error::RestoreDirectory)));

        std::env::remove_var("SOD_COMMIT_DATE");
    }

    #[test]
    fn test_resolve_for_restore_substitutes_snapshot_base_commit() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("SOD_COMMIT_DATE", "0 +0000");

        let (_dir, mut repo) = test_repo();
        let hash = write_blob(&repo, b"40aff2e9abcdef0123456789abcdef0123456789\n").unwrap();
        let mut index = Index::new();
        index.upsert(IndexEntry::new("a.txt", IndexMode::RegularBlob, hash));
        commit(&repo, &index, "Initial", true).unwrap();
        let head = read_head(&repo).unwrap().unwrap();

        aux::create(&mut repo, "backup", "plain", "/tmp/does-not-matter").unwrap();
        write_ref(&repo, "refs/snapshots/backup", &head).unwrap();

        assert_eq!(resolve_for_restore(&repo, "backup").unwrap(), head);

        std::env::remove_var("SOD_COMMIT_DATE");
    }
}
