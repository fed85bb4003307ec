//! diff engine (§4.4): compares two trees, or the index against a tree, and
//! produces a path-sorted sequence of deltas with exact-match rename/copy
//! detection.

use std::collections::BTreeMap;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use crate::digest::digest_for;
use crate::error::Result;
use crate::hash::compute_blob_hash;
use crate::ignore::IgnorePolicy;
use crate::object::read_tree;
use crate::repo::Repo;
use crate::types::{Delta, EntryKind, Index, Tree};
use crate::walk::walk;

/// default cap on the number of added+deleted candidates considered by the
/// rename/copy pass; overridable per call.
pub const DEFAULT_MAX_RENAME_CANDIDATES: usize = 10_000;

/// flatten a tree into `path -> leaf-kind`, recursing through subtrees.
/// subtrees never appear as values: a directory rename is expressed as one
/// delta per file it contains, not one delta for the directory.
fn flatten_tree(repo: &Repo, tree: &Tree, prefix: &str, out: &mut BTreeMap<String, EntryKind>) -> Result<()> {
    for entry in tree.entries() {
        let path = if prefix.is_empty() {
            entry.name.clone()
        } else {
            format!("{prefix}/{}", entry.name)
        };
        match entry.kind {
            EntryKind::Subtree { hash } => {
                let subtree = read_tree(repo, &hash)?;
                flatten_tree(repo, &subtree, &path, out)?;
            }
            leaf => {
                out.insert(path, leaf);
            }
        }
    }
    Ok(())
}

fn flatten_tree_root(repo: &Repo, tree: &Tree) -> Result<BTreeMap<String, EntryKind>> {
    let mut out = BTreeMap::new();
    flatten_tree(repo, tree, "", &mut out)?;
    Ok(out)
}

fn flatten_index(index: &Index) -> BTreeMap<String, EntryKind> {
    index
        .entries()
        .iter()
        .map(|e| (e.path.clone(), e.mode.into_entry_kind(e.hash)))
        .collect()
}

fn same_blob_kind(a: &EntryKind, b: &EntryKind) -> bool {
    matches!(
        (a, b),
        (EntryKind::RegularBlob { .. }, EntryKind::RegularBlob { .. })
            | (EntryKind::SymlinkBlob { .. }, EntryKind::SymlinkBlob { .. })
    )
}

/// diff two tree objects.
pub fn diff_trees(repo: &Repo, old: &Tree, new: &Tree) -> Result<Vec<Delta>> {
    diff_trees_with_limit(repo, old, new, DEFAULT_MAX_RENAME_CANDIDATES)
}

pub fn diff_trees_with_limit(repo: &Repo, old: &Tree, new: &Tree, max_rename_candidates: usize) -> Result<Vec<Delta>> {
    let old_map = flatten_tree_root(repo, old)?;
    let new_map = flatten_tree_root(repo, new)?;
    Ok(diff_maps(&old_map, &new_map, max_rename_candidates))
}

/// diff the staged index against a committed tree.
pub fn diff_index_to_tree(repo: &Repo, index: &Index, tree: &Tree) -> Result<Vec<Delta>> {
    diff_index_to_tree_with_limit(repo, index, tree, DEFAULT_MAX_RENAME_CANDIDATES)
}

pub fn diff_index_to_tree_with_limit(
    repo: &Repo,
    index: &Index,
    tree: &Tree,
    max_rename_candidates: usize,
) -> Result<Vec<Delta>> {
    let old_map = flatten_tree_root(repo, tree)?;
    let new_map = flatten_index(index);
    Ok(diff_maps(&old_map, &new_map, max_rename_candidates))
}

fn diff_maps(
    old_map: &BTreeMap<String, EntryKind>,
    new_map: &BTreeMap<String, EntryKind>,
    max_rename_candidates: usize,
) -> Vec<Delta> {
    let mut deltas = Vec::new();
    let mut added: Vec<(String, EntryKind)> = Vec::new();
    let mut deleted: Vec<(String, EntryKind)> = Vec::new();

    let mut all_paths: Vec<&String> = old_map.keys().chain(new_map.keys()).collect();
    all_paths.sort();
    all_paths.dedup();

    for path in all_paths {
        match (old_map.get(path), new_map.get(path)) {
            (Some(o), Some(n)) => {
                if !same_blob_kind(o, n) {
                    deltas.push(Delta::type_changed(path.clone(), o.hash(), n.hash()));
                } else if o.hash() != n.hash() {
                    deltas.push(Delta::modified(path.clone(), o.hash(), n.hash()));
                }
                // identical kind and hash: unmodified, omitted from output
            }
            (Some(o), None) => deleted.push((path.clone(), *o)),
            (None, Some(n)) => added.push((path.clone(), *n)),
            (None, None) => unreachable!(),
        }
    }

    if added.len() + deleted.len() <= max_rename_candidates {
        find_similar(&mut deltas, &mut added, &mut deleted, old_map, new_map);
    }

    for (path, kind) in deleted {
        deltas.push(Delta::deleted(path, kind.hash()));
    }
    for (path, kind) in added {
        deltas.push(Delta::added(path, kind.hash()));
    }

    deltas.sort_by(|a, b| a.sort_path().cmp(b.sort_path()));
    deltas
}

/// flatten the working tree into `path -> leaf-kind` without touching the
/// object store: used by `status` to compare against the index without
/// writing speculative blobs for files that may never be staged.
fn flatten_working_tree(top: &Path, policy: &IgnorePolicy, rehash: bool) -> BTreeMap<String, EntryKind> {
    let mut out = BTreeMap::new();
    for entry in walk(top, policy) {
        for file_name in &entry.files {
            let abs = top.join(&entry.dir).join(file_name);
            if let Ok(meta) = std::fs::symlink_metadata(&abs) {
                if meta.is_file() {
                    let digest = digest_for(&abs, rehash);
                    let hash = compute_blob_hash(format!("{digest}\n").as_bytes());
                    out.insert(join_rel(&entry.dir, file_name), EntryKind::RegularBlob { hash });
                }
            }
        }
        for link_name in &entry.symlinks {
            let abs = top.join(&entry.dir).join(link_name);
            if let Ok(target) = std::fs::read_link(&abs) {
                let hash = compute_blob_hash(target.as_os_str().as_bytes());
                out.insert(join_rel(&entry.dir, link_name), EntryKind::SymlinkBlob { hash });
            }
        }
    }
    out
}

fn join_rel(dir: &Path, name: &str) -> String {
    if dir.as_os_str().is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir.to_string_lossy(), name)
    }
}

/// diff the working tree against the staged index (§4.5's "unstaged"
/// comparison, driving `status`'s second column). Never writes blobs.
pub fn diff_working_tree_to_index(top: &Path, policy: &IgnorePolicy, index: &Index, rehash: bool) -> Vec<Delta> {
    diff_working_tree_to_index_with_limit(top, policy, index, rehash, DEFAULT_MAX_RENAME_CANDIDATES)
}

pub fn diff_working_tree_to_index_with_limit(
    top: &Path,
    policy: &IgnorePolicy,
    index: &Index,
    rehash: bool,
    max_rename_candidates: usize,
) -> Vec<Delta> {
    let old_map = flatten_index(index);
    let new_map = flatten_working_tree(top, policy, rehash);
    diff_maps(&old_map, &new_map, max_rename_candidates)
}

/// exact-match rename/copy pass: blobs here are single-line digests, so
/// similarity is "identical blob or not" — no richer heuristics (§9).
fn find_similar(
    deltas: &mut Vec<Delta>,
    added: &mut Vec<(String, EntryKind)>,
    deleted: &mut Vec<(String, EntryKind)>,
    old_map: &BTreeMap<String, EntryKind>,
    new_map: &BTreeMap<String, EntryKind>,
) {
    let mut remaining_added = Vec::new();

    for (path, kind) in added.drain(..) {
        if let Some(idx) = deleted
            .iter()
            .position(|(_, dk)| same_blob_kind(dk, &kind) && dk.hash() == kind.hash())
        {
            let (old_path, _) = deleted.remove(idx);
            deltas.push(Delta::renamed(old_path, path, kind.hash(), 100));
            continue;
        }

        let copy_source = old_map.iter().find(|(src_path, src_kind)| {
            same_blob_kind(src_kind, &kind)
                && src_kind.hash() == kind.hash()
                && new_map
                    .get(src_path.as_str())
                    .map(|nk| same_blob_kind(nk, src_kind) && nk.hash() == src_kind.hash())
                    .unwrap_or(false)
        });
        if let Some((src_path, _)) = copy_source {
            deltas.push(Delta::copied(src_path.clone(), path, kind.hash(), 100));
            continue;
        }

        remaining_added.push((path, kind));
    }

    *added = remaining_added;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Hash;
    use crate::object::write_tree;
    use crate::types::{DeltaStatus, TreeEntry};
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let repo = Repo::init(&dir.path().join("repo")).unwrap();
        (dir, repo)
    }

    fn blob(name: &str, content: &[u8]) -> TreeEntry {
        TreeEntry::new(name, EntryKind::RegularBlob { hash: Hash::of(content) })
    }

    #[test]
    fn test_diff_trees_added_and_deleted() {
        let (_dir, repo) = test_repo();
        let old = Tree::new(vec![blob("a.txt", b"a")]).unwrap();
        let new = Tree::new(vec![blob("b.txt", b"b")]).unwrap();

        let deltas = diff_trees(&repo, &old, &new).unwrap();
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].status, DeltaStatus::Added);
        assert_eq!(deltas[0].new_path.as_deref(), Some("a.txt"));
        assert_eq!(deltas[1].status, DeltaStatus::Deleted);
        assert_eq!(deltas[1].old_path.as_deref(), Some("b.txt"));
    }

    #[test]
    fn test_diff_trees_modify_delete_rename() {
        let (_dir, repo) = test_repo();
        let old = Tree::new(vec![
            blob("a.txt", b"a content"),
            blob("c.txt", b"c content"),
            blob("e.txt", b"e content"),
        ])
        .unwrap();
        let new = Tree::new(vec![
            blob("a.txt", b"a updated content"),
            blob("E.txt", b"e content"),
        ])
        .unwrap();

        let deltas = diff_trees(&repo, &old, &new).unwrap();
        let by_status: Vec<_> = deltas.iter().map(|d| d.status).collect();
        assert!(by_status.contains(&DeltaStatus::Modified));
        assert!(by_status.contains(&DeltaStatus::Deleted));
        assert!(by_status.contains(&DeltaStatus::Renamed));

        let rename = deltas.iter().find(|d| d.status == DeltaStatus::Renamed).unwrap();
        assert_eq!(rename.old_path.as_deref(), Some("e.txt"));
        assert_eq!(rename.new_path.as_deref(), Some("E.txt"));
        assert_eq!(rename.similarity, 100);
    }

    #[test]
    fn test_diff_trees_directory_rename_yields_per_file_renames() {
        let (_dir, repo) = test_repo();

        let inner = Tree::new(vec![
            blob("d.txt", b"d"),
            blob("e.txt", b"e"),
            blob("f.txt", b"f"),
        ])
        .unwrap();
        let inner_hash = write_tree(&repo, &inner).unwrap();

        let old = Tree::new(vec![TreeEntry::new(
            "x",
            EntryKind::Subtree { hash: inner_hash },
        )])
        .unwrap();
        let new = Tree::new(vec![TreeEntry::new(
            "X",
            EntryKind::Subtree { hash: inner_hash },
        )])
        .unwrap();

        let deltas = diff_trees(&repo, &old, &new).unwrap();
        assert_eq!(deltas.len(), 3);
        assert!(deltas.iter().all(|d| d.status == DeltaStatus::Renamed));

        let mut new_paths: Vec<_> = deltas.iter().map(|d| d.new_path.clone().unwrap()).collect();
        new_paths.sort();
        assert_eq!(new_paths, vec!["X/d.txt", "X/e.txt", "X/f.txt"]);
    }

    #[test]
    fn test_diff_trees_type_change() {
        let (_dir, repo) = test_repo();
        let old = Tree::new(vec![blob("a.txt", b"content")]).unwrap();
        let new = Tree::new(vec![TreeEntry::new(
            "a.txt",
            EntryKind::SymlinkBlob { hash: Hash::of(b"content") },
        )])
        .unwrap();

        let deltas = diff_trees(&repo, &old, &new).unwrap();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].status, DeltaStatus::TypeChanged);
    }

    #[test]
    fn test_diff_trees_copy_detected_when_source_unchanged() {
        let (_dir, repo) = test_repo();
        let old = Tree::new(vec![blob("a.txt", b"shared")]).unwrap();
        let new = Tree::new(vec![blob("a.txt", b"shared"), blob("b.txt", b"shared")]).unwrap();

        let deltas = diff_trees(&repo, &old, &new).unwrap();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].status, DeltaStatus::Copied);
        assert_eq!(deltas[0].old_path.as_deref(), Some("a.txt"));
        assert_eq!(deltas[0].new_path.as_deref(), Some("b.txt"));
    }

    #[test]
    fn test_diff_index_to_tree() {
        let (_dir, repo) = test_repo();
        let tree = Tree::new(vec![blob("a.txt", b"a")]).unwrap();

        let mut index = Index::new();
        index.upsert(crate::types::IndexEntry::new(
            "a.txt",
            crate::types::IndexMode::RegularBlob,
            Hash::of(b"a updated"),
        ));

        let deltas = diff_index_to_tree(&repo, &index, &tree).unwrap();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].status, DeltaStatus::Modified);
    }

    #[test]
    fn test_diff_trees_unmodified_is_omitted() {
        let (_dir, repo) = test_repo();
        let old = Tree::new(vec![blob("a.txt", b"same")]).unwrap();
        let new = Tree::new(vec![blob("a.txt", b"same")]).unwrap();

        let deltas = diff_trees(&repo, &old, &new).unwrap();
        assert!(deltas.is_empty());
    }

    #[test]
    fn test_diff_working_tree_to_index_reports_untracked_as_added() {
        let (dir, _repo) = test_repo();
        let top = dir.path().join("work2");
        std::fs::create_dir_all(&top).unwrap();
        std::fs::write(top.join("b.txt"), "b content").unwrap();

        let index = Index::new();
        let policy = IgnorePolicy::default();
        let deltas = diff_working_tree_to_index(&top, &policy, &index, false);

        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].status, DeltaStatus::Added);
        assert_eq!(deltas[0].new_path.as_deref(), Some("b.txt"));
    }

    #[test]
    fn test_diff_working_tree_to_index_does_not_write_blobs() {
        let (_dir, repo) = test_repo();
        let top = repo.worktree_path().to_path_buf();
        std::fs::write(top.join("a.txt"), "a content").unwrap();

        let index = Index::new();
        let policy = IgnorePolicy::default();
        let deltas = diff_working_tree_to_index(&top, &policy, &index, false);

        let hash = deltas[0].new_hash.unwrap();
        assert!(!crate::object::blob_exists(&repo, &hash));
    }
}
