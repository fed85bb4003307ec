//! status operation (§4.5 scenario 1, §6): computes the staged (index vs
//! HEAD tree) and unstaged (working tree vs index) delta sets, plus an
//! optional ignored-path listing (§4.10).

use crate::diff::{diff_index_to_tree, diff_working_tree_to_index};
use crate::error::Result;
use crate::ignore::{self, IgnorePolicy};
use crate::object::{read_commit, read_tree};
use crate::refs::read_head;
use crate::repo::Repo;
use crate::types::{Delta, Index, Tree};
use std::path::PathBuf;

/// the full result of a `status` invocation.
pub struct StatusReport {
    /// index vs HEAD's tree: what `commit` would record
    pub staged: Vec<Delta>,
    /// working tree vs the index: what `add` would pick up
    pub unstaged: Vec<Delta>,
}

/// compute `status` for the current index against `HEAD` and the working
/// tree. `rehash` forces digest recomputation instead of trusting the xattr
/// cache (§4.1).
pub fn status(repo: &Repo, index: &Index, rehash: bool) -> Result<StatusReport> {
    let head_tree = head_tree(repo)?;
    let staged = diff_index_to_tree(repo, index, &head_tree)?;

    let policy = IgnorePolicy::default();
    let unstaged = diff_working_tree_to_index(repo.worktree_path(), &policy, index, rehash);

    Ok(StatusReport { staged, unstaged })
}

/// list paths excluded by the ignore policy (§4.10), for `status --ignored`.
pub fn status_ignored(repo: &Repo) -> Vec<PathBuf> {
    let policy = IgnorePolicy::default();
    ignore::ignored_paths(repo.worktree_path(), &policy)
}

fn head_tree(repo: &Repo) -> Result<Tree> {
    match read_head(repo)? {
        Some(commit_hash) => {
            let commit = read_commit(repo, &commit_hash)?;
            read_tree(repo, &commit.tree)
        }
        None => Ok(Tree::empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::write_blob;
    use crate::types::{DeltaStatus, IndexEntry, IndexMode};
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let repo = Repo::init(&dir.path().join("repo")).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_status_empty_repo_is_clean() {
        let (_dir, repo) = test_repo();
        let index = Index::new();

        let report = status(&repo, &index, false).unwrap();
        assert!(report.staged.is_empty());
        assert!(report.unstaged.is_empty());
    }

    #[test]
    fn test_status_reports_staged_addition() {
        let (_dir, repo) = test_repo();
        let hash = write_blob(&repo, b"40aff2e9abcdef0123456789abcdef0123456789\n").unwrap();
        let mut index = Index::new();
        index.upsert(IndexEntry::new("a.txt", IndexMode::RegularBlob, hash));

        let report = status(&repo, &index, false).unwrap();
        assert_eq!(report.staged.len(), 1);
        assert_eq!(report.staged[0].status, DeltaStatus::Added);
    }

    #[test]
    fn test_status_reports_unstaged_new_file_as_added() {
        let (_dir, repo) = test_repo();
        std::fs::write(repo.worktree_path().join("untracked.txt"), "content").unwrap();
        let index = Index::new();

        let report = status(&repo, &index, false).unwrap();
        assert_eq!(report.unstaged.len(), 1);
        assert_eq!(report.unstaged[0].status, DeltaStatus::Added);
        assert_eq!(report.unstaged[0].new_path.as_deref(), Some("untracked.txt"));
    }

    #[test]
    fn test_status_ignored_lists_dot_sod() {
        let (_dir, repo) = test_repo();
        let ignored = status_ignored(&repo);
        assert!(ignored.iter().any(|p| p.ends_with(".sod")));
    }
}
