//! reset operation (§4.3): unstages a path, restoring its index entries to
//! whatever `HEAD`'s tree records (or dropping them entirely if `HEAD` has
//! none).

use crate::error::Result;
use crate::object::{read_commit, read_tree};
use crate::refs::read_head;
use crate::repo::Repo;
use crate::tree_builder::index_reset_path;
use crate::types::{Index, Tree};

/// reset `rel` (repository-relative path) in `index` back to `HEAD`'s tree.
pub fn reset(repo: &Repo, index: &mut Index, rel: &str) -> Result<()> {
    let tree = head_tree(repo)?;
    index_reset_path(repo, index, rel, &tree)
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
    use crate::ops::commit::commit;
    use crate::types::{IndexEntry, IndexMode};
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let repo = Repo::init(&dir.path().join("repo")).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_reset_unstages_new_file() {
        let (_dir, repo) = test_repo();
        let hash = write_blob(&repo, b"40aff2e9abcdef0123456789abcdef0123456789\n").unwrap();
        let mut index = Index::new();
        index.upsert(IndexEntry::new("a.txt", IndexMode::RegularBlob, hash));

        reset(&repo, &mut index, "a.txt").unwrap();

        assert!(index.get("a.txt").is_none());
    }

    #[test]
    fn test_reset_restores_committed_entry() {
        let (_dir, repo) = test_repo();
        let hash = write_blob(&repo, b"40aff2e9abcdef0123456789abcdef0123456789\n").unwrap();
        let mut index = Index::new();
        index.upsert(IndexEntry::new("a.txt", IndexMode::RegularBlob, hash));
        commit(&repo, &index, "Initial", true).unwrap();

        let hash2 = write_blob(&repo, b"aaaaaaaaaabbbbbbbbbbccccccccccdddddddddd\n").unwrap();
        index.upsert(IndexEntry::new("a.txt", IndexMode::RegularBlob, hash2));

        reset(&repo, &mut index, "a.txt").unwrap();

        assert_eq!(index.get("a.txt").unwrap().hash, hash);
    }
}
