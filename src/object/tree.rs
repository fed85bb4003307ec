use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::{compute_compressed_hash, Hash};
use crate::repo::Repo;
use crate::types::Tree;

/// write a tree to the object store: CBOR-encode, zstd-compress, hash the
/// compressed bytes, store content-addressed (§3A).
pub fn write_tree(repo: &Repo, tree: &Tree) -> Result<Hash> {
    let mut cbor_bytes = Vec::new();
    ciborium::into_writer(tree, &mut cbor_bytes)?;

    let compressed = zstd::encode_all(&cbor_bytes[..], 3).map_err(|e| Error::Io {
        path: PathBuf::from("<zstd>"),
        source: e,
    })?;

    let hash = compute_compressed_hash(&compressed);

    let (dir, file) = hash.to_path_components();
    let tree_dir = repo.trees_path().join(&dir);
    let path = tree_dir.join(&file);

    if path.exists() {
        return Ok(hash);
    }

    fs::create_dir_all(&tree_dir).with_path(&tree_dir)?;

    let tmp_path = repo.tmp_path().join(uuid::Uuid::new_v4().to_string());
    {
        let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
        tmp_file.write_all(&compressed).with_path(&tmp_path)?;
        tmp_file.sync_all().with_path(&tmp_path)?;
    }
    fs::rename(&tmp_path, &path).with_path(&path)?;

    let dir_file = File::open(&tree_dir).with_path(&tree_dir)?;
    dir_file.sync_all().with_path(&tree_dir)?;

    Ok(hash)
}

/// read and verify a tree from the object store
pub fn read_tree(repo: &Repo, hash: &Hash) -> Result<Tree> {
    let path = tree_path(repo, hash);

    let compressed = fs::read(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::ObjectNotFound(*hash)
        } else {
            Error::Io { path: path.clone(), source: e }
        }
    })?;

    if compute_compressed_hash(&compressed) != *hash {
        return Err(Error::CorruptObject(*hash));
    }

    let cbor_bytes = zstd::decode_all(&compressed[..]).map_err(|e| Error::Io {
        path: path.clone(),
        source: e,
    })?;

    Ok(ciborium::from_reader(&cbor_bytes[..])?)
}

pub fn tree_path(repo: &Repo, hash: &Hash) -> PathBuf {
    let (dir, file) = hash.to_path_components();
    repo.trees_path().join(dir).join(file)
}

pub fn tree_exists(repo: &Repo, hash: &Hash) -> bool {
    tree_path(repo, hash).exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntryKind, TreeEntry};
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let repo = Repo::init(&dir.path().join("repo")).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_write_and_read_tree() {
        let (_dir, repo) = test_repo();

        let tree = Tree::new(vec![
            TreeEntry::new("file.txt", EntryKind::RegularBlob { hash: Hash::of(b"x") }),
            TreeEntry::new("sub", EntryKind::Subtree { hash: Hash::of(b"y") }),
        ])
        .unwrap();

        let hash = write_tree(&repo, &tree).unwrap();
        assert!(tree_exists(&repo, &hash));
        assert_eq!(read_tree(&repo, &hash).unwrap(), tree);
    }

    #[test]
    fn test_tree_deduplication() {
        let (_dir, repo) = test_repo();
        let tree = Tree::new(vec![TreeEntry::new(
            "foo",
            EntryKind::RegularBlob { hash: Hash::of(b"z") },
        )])
        .unwrap();

        let h1 = write_tree(&repo, &tree).unwrap();
        let h2 = write_tree(&repo, &tree).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_empty_tree_round_trips() {
        let (_dir, repo) = test_repo();
        let tree = Tree::empty();
        let hash = write_tree(&repo, &tree).unwrap();
        assert!(read_tree(&repo, &hash).unwrap().is_empty());
    }

    #[test]
    fn test_read_nonexistent_tree() {
        let (_dir, repo) = test_repo();
        let fake = Hash::of(b"nonexistent");
        assert!(matches!(read_tree(&repo, &fake), Err(Error::ObjectNotFound(_))));
    }
}
