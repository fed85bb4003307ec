//! tree/index builder (§4.3): turns a working tree into blob/tree objects
//! and index entries, with whole-tree rebuild and path-scoped add/reset.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use crate::digest::digest_for;
use crate::error::{IoResultExt, Result};
use crate::hash::Hash;
use crate::ignore::IgnorePolicy;
use crate::object::{read_tree, write_blob, write_tree};
use crate::repo::Repo;
use crate::types::{EntryKind, Index, IndexEntry, IndexMode, Tree, TreeEntry};
use crate::walk::walk;

/// load the persisted index from `.sod/index` (§3A); a missing file is an
/// empty index (fresh repository, nothing staged yet).
pub fn load_index(repo: &Repo) -> Result<Index> {
    let path = repo.index_path();
    if !path.exists() {
        return Ok(Index::new());
    }
    let bytes = fs::read(&path).with_path(&path)?;
    Ok(ciborium::from_reader(&bytes[..])?)
}

/// persist the index to `.sod/index`, via the same atomic
/// temp-write+fsync+rename discipline as every other object-store write.
pub fn save_index(repo: &Repo, index: &Index) -> Result<()> {
    let mut bytes = Vec::new();
    ciborium::into_writer(index, &mut bytes)?;

    let path = repo.index_path();
    let tmp_path = repo.tmp_path().join(uuid::Uuid::new_v4().to_string());
    {
        let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
        tmp_file.write_all(&bytes).with_path(&tmp_path)?;
        tmp_file.sync_all().with_path(&tmp_path)?;
    }
    fs::rename(&tmp_path, &path).with_path(&path)?;

    if let Some(parent) = path.parent() {
        let dir = File::open(parent).with_path(parent)?;
        dir.sync_all().with_path(parent)?;
    }
    Ok(())
}

/// whole-tree rebuild: walk `top`, hash/cache every regular file, and
/// assemble blob/tree objects bottom-up. Returns the root tree's id —
/// always a real object, even if it is the canonical empty tree.
pub fn tree_build(repo: &Repo, top: &Path, policy: &IgnorePolicy, rehash: bool) -> Result<Hash> {
    let walked = walk(top, policy);
    let mut built: HashMap<PathBuf, Hash> = HashMap::new();

    for entry in &walked {
        let mut tree_entries = Vec::new();

        for subdir in &entry.subdirs {
            let child_rel = entry.dir.join(subdir);
            if let Some(hash) = built.get(&child_rel) {
                tree_entries.push(TreeEntry::new(subdir, EntryKind::Subtree { hash: *hash }));
            }
        }

        for file_name in &entry.files {
            let abs = top.join(&entry.dir).join(file_name);
            match fs::symlink_metadata(&abs) {
                Ok(meta) if meta.is_file() => {
                    let digest = digest_for(&abs, rehash);
                    let hash = write_blob(repo, format!("{digest}\n").as_bytes())?;
                    tree_entries.push(TreeEntry::new(file_name, EntryKind::RegularBlob { hash }));
                }
                Ok(_) => {
                    tracing::debug!(path = %abs.display(), "skipping non-regular file");
                }
                Err(e) => {
                    tracing::warn!(path = %abs.display(), error = %e, "stat failed, skipping");
                }
            }
        }

        for link_name in &entry.symlinks {
            let abs = top.join(&entry.dir).join(link_name);
            match fs::read_link(&abs) {
                Ok(target) => {
                    let hash = write_blob(repo, target.as_os_str().as_bytes())?;
                    tree_entries.push(TreeEntry::new(link_name, EntryKind::SymlinkBlob { hash }));
                }
                Err(e) => {
                    tracing::warn!(path = %abs.display(), error = %e, "failed to read symlink target, skipping");
                }
            }
        }

        let tree = Tree::new(tree_entries)?;
        if !tree.is_empty() {
            let hash = write_tree(repo, &tree)?;
            built.insert(entry.dir.clone(), hash);
        }
    }

    match built.get(Path::new("")) {
        Some(hash) => Ok(*hash),
        None => write_tree(repo, &Tree::empty()),
    }
}

/// build a tree object graph from a flat, sorted index (§4.5 commit step
/// "write the tree from the index"): groups entries by their first path
/// component and recurses, writing subtrees bottom-up.
pub fn tree_from_index(repo: &Repo, index: &Index) -> Result<Hash> {
    let tree = tree_from_entries(repo, index.entries())?;
    write_tree(repo, &tree)
}

fn tree_from_entries(repo: &Repo, entries: &[IndexEntry]) -> Result<Tree> {
    use std::collections::BTreeMap;

    let mut top_level: Vec<TreeEntry> = Vec::new();
    let mut subdirs: BTreeMap<&str, Vec<IndexEntry>> = BTreeMap::new();

    for entry in entries {
        match entry.path.split_once('/') {
            Some((head, rest)) => {
                subdirs
                    .entry(head)
                    .or_default()
                    .push(IndexEntry::new(rest, entry.mode, entry.hash));
            }
            None => {
                top_level.push(TreeEntry::new(&entry.path, entry.mode.into_entry_kind(entry.hash)));
            }
        }
    }

    for (name, sub_entries) in subdirs {
        let subtree = tree_from_entries(repo, &sub_entries)?;
        let hash = write_tree(repo, &subtree)?;
        top_level.push(TreeEntry::new(name, EntryKind::Subtree { hash }));
    }

    Tree::new(top_level)
}

fn index_mode_of(kind: &EntryKind) -> Option<IndexMode> {
    match kind {
        EntryKind::RegularBlob { .. } => Some(IndexMode::RegularBlob),
        EntryKind::SymlinkBlob { .. } => Some(IndexMode::SymlinkBlob),
        EntryKind::Subtree { .. } => None,
    }
}

/// collect every leaf (regular/symlink) under `dir_abs` as flat index
/// entries with paths relative to `dir_abs`.
fn collect_leaf_entries(
    repo: &Repo,
    dir_abs: &Path,
    policy: &IgnorePolicy,
) -> Result<Vec<(String, IndexMode, Hash)>> {
    let walked = walk(dir_abs, policy);
    let mut out = Vec::new();

    for entry in &walked {
        for file_name in &entry.files {
            let abs = dir_abs.join(&entry.dir).join(file_name);
            if let Ok(meta) = fs::symlink_metadata(&abs) {
                if meta.is_file() {
                    let digest = digest_for(&abs, true);
                    let hash = write_blob(repo, format!("{digest}\n").as_bytes())?;
                    let rel = join_rel(&entry.dir, file_name);
                    out.push((rel, IndexMode::RegularBlob, hash));
                }
            }
        }
        for link_name in &entry.symlinks {
            let abs = dir_abs.join(&entry.dir).join(link_name);
            if let Ok(target) = fs::read_link(&abs) {
                let hash = write_blob(repo, target.as_os_str().as_bytes())?;
                let rel = join_rel(&entry.dir, link_name);
                out.push((rel, IndexMode::SymlinkBlob, hash));
            }
        }
    }

    Ok(out)
}

fn join_rel(dir: &Path, name: &str) -> String {
    if dir.as_os_str().is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir.to_string_lossy(), name)
    }
}

/// join a slash-separated prefix and a leaf name, omitting the separator
/// when `prefix` is empty (staging/resetting the repository root itself).
fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// stage a single working-tree path into the index (§4.3 `index_add`).
/// `rel` is `path` relativized to the repository root; `path` is the
/// absolute path on disk.
pub fn index_add(
    repo: &Repo,
    index: &mut Index,
    policy: &IgnorePolicy,
    rel: &str,
    path: &Path,
) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_symlink() => {
            let target = fs::read_link(path)?;
            let hash = write_blob(repo, target.as_os_str().as_bytes())?;
            index.upsert(IndexEntry::new(rel, IndexMode::SymlinkBlob, hash));
        }
        Ok(meta) if meta.is_dir() => {
            index.remove_all_under(rel);
            for (leaf_rel, mode, hash) in collect_leaf_entries(repo, path, policy)? {
                let full = join_path(rel, &leaf_rel);
                index.upsert(IndexEntry::new(full, mode, hash));
            }
        }
        Ok(meta) if meta.is_file() => {
            let digest = digest_for(path, true);
            let hash = write_blob(repo, format!("{digest}\n").as_bytes())?;
            index.upsert(IndexEntry::new(rel, IndexMode::RegularBlob, hash));
        }
        Ok(_) => {
            index.remove_all_under(rel);
        }
        Err(_) => {
            index.remove_all_under(rel);
        }
    }
    Ok(())
}

/// look up the object at `rel` within `tree`, descending through subtrees.
pub fn find_entry_at_path(repo: &Repo, tree: &Tree, rel: &str) -> Result<Option<EntryKind>> {
    if rel.is_empty() {
        return Ok(None);
    }
    let mut segments = rel.split('/');
    let mut current = tree.clone();
    let mut name = segments.next().unwrap();

    loop {
        let kind = match current.get(name) {
            Some(entry) => entry.kind,
            None => return Ok(None),
        };
        match segments.next() {
            None => return Ok(Some(kind)),
            Some(next) => match kind {
                EntryKind::Subtree { hash } => {
                    current = read_tree(repo, &hash)?;
                    name = next;
                }
                _ => return Ok(None),
            },
        }
    }
}

/// reset the index at `rel` to match `tree` (§4.3 `index_reset_path`):
/// remove any staged entries under `rel`, then graft the committed object
/// back in if it exists. An empty `rel` means the repository root, so the
/// whole index is cleared and rebuilt from `tree` (mirroring `tree_to_index`,
/// since `find_entry_at_path` has no entry to look up for the root itself).
pub fn index_reset_path(repo: &Repo, index: &mut Index, rel: &str, tree: &Tree) -> Result<()> {
    index.remove_all_under(rel);

    if rel.is_empty() {
        for entry in tree.entries() {
            match entry.kind {
                EntryKind::Subtree { hash } => graft_subtree(repo, index, &entry.name, hash)?,
                leaf => {
                    if let Some(mode) = index_mode_of(&leaf) {
                        index.upsert(IndexEntry::new(entry.name.clone(), mode, leaf.hash()));
                    }
                }
            }
        }
        return Ok(());
    }

    let Some(kind) = find_entry_at_path(repo, tree, rel)? else {
        return Ok(());
    };

    match kind {
        EntryKind::Subtree { hash } => graft_subtree(repo, index, rel, hash)?,
        leaf => {
            if let Some(mode) = index_mode_of(&leaf) {
                index.upsert(IndexEntry::new(rel, mode, leaf.hash()));
            }
        }
    }
    Ok(())
}

fn graft_subtree(repo: &Repo, index: &mut Index, prefix: &str, subtree_hash: Hash) -> Result<()> {
    let tree = read_tree(repo, &subtree_hash)?;
    for entry in tree.entries() {
        let full = join_path(prefix, &entry.name);
        match entry.kind {
            EntryKind::Subtree { hash } => graft_subtree(repo, index, &full, hash)?,
            leaf => {
                if let Some(mode) = index_mode_of(&leaf) {
                    index.upsert(IndexEntry::new(full, mode, leaf.hash()));
                }
            }
        }
    }
    Ok(())
}

/// flatten an entire tree into a fresh index (§4.3 whole-path `add`/`reset`:
/// `index.read_tree(tree_oid)`), replacing whatever the index held before.
pub fn tree_to_index(repo: &Repo, tree: &Tree) -> Result<Index> {
    let mut index = Index::new();
    for entry in tree.entries() {
        match entry.kind {
            EntryKind::Subtree { hash } => graft_subtree(repo, &mut index, &entry.name, hash)?,
            leaf => {
                if let Some(mode) = index_mode_of(&leaf) {
                    index.upsert(IndexEntry::new(entry.name.clone(), mode, leaf.hash()));
                }
            }
        }
    }
    Ok(index)
}

/// build a new tree containing only the entries at `rel_paths`, copying
/// subtrees whole when a path requests the whole directory.
pub fn tree_filter(repo: &Repo, tree: &Tree, rel_paths: &[String]) -> Result<Tree> {
    filter_rec(repo, tree, &rel_paths.iter().map(String::as_str).collect::<Vec<_>>())
}

fn filter_rec(repo: &Repo, tree: &Tree, rel_paths: &[&str]) -> Result<Tree> {
    use std::collections::BTreeMap;

    let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for p in rel_paths {
        let (head, rest) = match p.split_once('/') {
            Some((h, r)) => (h, Some(r)),
            None => (*p, None),
        };
        let bucket = groups.entry(head).or_default();
        if let Some(rest) = rest {
            bucket.push(rest);
        }
    }

    let mut out_entries = Vec::new();
    for (name, rest_paths) in groups {
        let Some(entry) = tree.get(name) else { continue };
        match entry.kind {
            EntryKind::Subtree { hash } if !rest_paths.is_empty() => {
                let subtree = read_tree(repo, &hash)?;
                let filtered = filter_rec(repo, &subtree, &rest_paths)?;
                if !filtered.is_empty() {
                    let new_hash = write_tree(repo, &filtered)?;
                    out_entries.push(TreeEntry::new(name, EntryKind::Subtree { hash: new_hash }));
                }
            }
            other => out_entries.push(TreeEntry::new(name, other)),
        }
    }

    Tree::new(out_entries)
}
