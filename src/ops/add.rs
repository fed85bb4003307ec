//! add operation (§4.3): stages one or more working-tree paths into the
//! index, writing blobs for whatever content they resolve to.

use std::path::Path;

use crate::error::Result;
use crate::ignore::IgnorePolicy;
use crate::repo::Repo;
use crate::tree_builder::index_add;
use crate::types::Index;

/// stage `paths` (absolute, on-disk) into `index`. each path is relativized
/// against the repository root before being recorded.
pub fn add(repo: &Repo, index: &mut Index, paths: &[impl AsRef<Path>]) -> Result<()> {
    let policy = IgnorePolicy::default();
    for path in paths {
        let path = path.as_ref();
        let rel = repo.relpath(path)?;
        index_add(repo, index, &policy, &rel, path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IndexMode;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let repo = Repo::init(&dir.path().join("repo")).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_add_single_file() {
        let (_dir, repo) = test_repo();
        let path = repo.worktree_path().join("a.txt");
        std::fs::write(&path, "content").unwrap();

        let mut index = Index::new();
        add(&repo, &mut index, &[&path]).unwrap();

        let entry = index.get("a.txt").unwrap();
        assert_eq!(entry.mode, IndexMode::RegularBlob);
    }

    #[test]
    fn test_add_directory_recurses() {
        let (_dir, repo) = test_repo();
        std::fs::create_dir_all(repo.worktree_path().join("sub")).unwrap();
        std::fs::write(repo.worktree_path().join("sub/a.txt"), "a").unwrap();
        std::fs::write(repo.worktree_path().join("sub/b.txt"), "b").unwrap();

        let mut index = Index::new();
        add(&repo, &mut index, &[repo.worktree_path().join("sub")]).unwrap();

        assert!(index.get("sub/a.txt").is_some());
        assert!(index.get("sub/b.txt").is_some());
    }

    #[test]
    fn test_add_multiple_paths() {
        let (_dir, repo) = test_repo();
        std::fs::write(repo.worktree_path().join("a.txt"), "a").unwrap();
        std::fs::write(repo.worktree_path().join("b.txt"), "b").unwrap();

        let mut index = Index::new();
        add(
            &repo,
            &mut index,
            &[repo.worktree_path().join("a.txt"), repo.worktree_path().join("b.txt")],
        )
        .unwrap();

        assert!(index.get("a.txt").is_some());
        assert!(index.get("b.txt").is_some());
    }
}
