//! the built-in "plain" auxiliary store backend (§4.7): a snapshot is just
//! another `.sod`-managed working tree, reachable over the filesystem or
//! over SSH. No daemon or special remote support is required — only a
//! shell and (for the `ssh` scheme) a reachable account.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::process::Command;

use crate::aux::{AuxStore, Snapshot, SNAPSHOT_REF_PREFIX};
use crate::error::{Error, IoResultExt, Result};
use crate::hash::Hash;
use crate::object::{read_commit, read_tree};
use crate::refs::{delete_refs_matching, write_ref};
use crate::repo::{Repo, DOT_DIR};
use crate::types::EntryKind;

/// a snapshot candidate discovered by listing, before it has been mirrored
/// into a local ref (and so has no known `base_commit_id` yet).
struct Candidate {
    id: Option<String>,
}

pub struct PlainAuxStore {
    url: String,
}

impl PlainAuxStore {
    pub fn new(url: &str) -> Result<Self> {
        parse_url(url)?; // eager validation, matching `create`'s contract
        Ok(Self { url: url.to_string() })
    }

    /// substitute the (at most one) `*` in the raw URL with `id`, the way
    /// every per-snapshot operation addresses a specific remote tree.
    fn resolved_url(&self, id: Option<&str>) -> String {
        match id {
            Some(id) => self.url.replacen('*', id, 1),
            None => self.url.clone(),
        }
    }

    fn list(&self) -> Result<Vec<Candidate>> {
        let (scheme, netloc, path) = parse_url(&self.url)?;
        if !path.contains('*') {
            return Ok(vec![Candidate { id: None }]);
        }

        // only match directories that look like sod repositories
        let search_path = format!("{path}/{DOT_DIR}");
        let (prefix, suffix) = search_path
            .split_once('*')
            .expect("path contains '*', checked above");

        let matches = match scheme {
            UrlScheme::File => glob_list(&search_path)?,
            UrlScheme::Ssh => ssh_list(&netloc, prefix, suffix)?,
        };

        Ok(matches
            .into_iter()
            .filter_map(|m| {
                let id = m.get(prefix.len()..m.len().checked_sub(suffix.len())?)?;
                Some(Candidate { id: Some(id.to_string()) })
            })
            .collect())
    }
}

impl AuxStore for PlainAuxStore {
    fn type_name(&self) -> &'static str {
        "plain"
    }

    fn update(&self, repo: &Repo, store_name: &str) -> Result<()> {
        delete_refs_matching(repo, SNAPSHOT_REF_PREFIX, store_name)?;

        for candidate in self.list()? {
            let (scheme, netloc, path) = parse_url(&self.resolved_url(candidate.id.as_deref()))?;

            let head = match scheme {
                UrlScheme::File => sync_file(repo, Path::new(&path))?,
                UrlScheme::Ssh => sync_ssh(repo, &netloc, &path)?,
            };

            let snapshot = Snapshot {
                store: store_name.to_string(),
                id: candidate.id,
                base_commit_id: head,
            };
            write_ref(repo, &snapshot.reference(), &head)?;
        }

        Ok(())
    }

    fn restore(&self, snapshot: &Snapshot, path: &str, destination: &Path) -> Result<()> {
        let root = self.resolved_url(snapshot.id.as_deref());
        let remote_file = format!("{root}/{path}");
        download(&remote_file, destination)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum UrlScheme {
    File,
    Ssh,
}

/// parse a plain-backend URL per §4.7's grammar, returning its scheme along
/// with the raw netloc and path strings.
fn parse_url(raw: &str) -> Result<(UrlScheme, String, String)> {
    let (scheme_str, rest) = split_scheme(raw);
    let (netloc, rest) = split_netloc(rest);

    let (rest, fragment) = match rest.split_once('#') {
        Some((p, f)) => (p, Some(f)),
        None => (rest, None),
    };
    let (path, query) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };

    if fragment.is_some() {
        return Err(Error::UnsupportedUrl("fragment must be empty".to_string()));
    }
    if query.is_some() {
        return Err(Error::UnsupportedUrl("query must be empty".to_string()));
    }
    if path.is_empty() {
        return Err(Error::InvalidUrl("no path specified".to_string()));
    }

    let scheme = match scheme_str {
        "" | "file" => {
            if !netloc.is_empty() {
                return Err(Error::InvalidUrl(
                    "network location must be empty with the scheme used".to_string(),
                ));
            }
            UrlScheme::File
        }
        "ssh" => {
            if netloc.is_empty() {
                return Err(Error::InvalidUrl(
                    "network location must not be empty with the scheme used".to_string(),
                ));
            }
            UrlScheme::Ssh
        }
        other => {
            return Err(Error::UnsupportedUrl(format!("unrecognized scheme: {other}")));
        }
    };

    if netloc.contains('*') {
        return Err(Error::UnsupportedUrl(
            "network location must not contain '*'".to_string(),
        ));
    }
    if path.matches('*').count() > 1 {
        return Err(Error::UnsupportedUrl("multiple '*' in path".to_string()));
    }

    Ok((scheme, netloc.to_string(), path.to_string()))
}

/// split off a leading `<scheme>:`, matching the set of characters a URI
/// scheme may use (letter, then letters/digits/`+`/`-`/`.`).
fn split_scheme(raw: &str) -> (&str, &str) {
    if let Some(idx) = raw.find(':') {
        let candidate = &raw[..idx];
        let mut chars = candidate.chars();
        let valid = chars.next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false)
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if valid {
            return (candidate, &raw[idx + 1..]);
        }
    }
    ("", raw)
}

/// split `//netloc/path...` into `(netloc, "/path...")`; a URL with no `//`
/// prefix has no netloc at all (bare filesystem path).
fn split_netloc(rest: &str) -> (&str, &str) {
    if let Some(after) = rest.strip_prefix("//") {
        match after.find('/') {
            Some(idx) => (&after[..idx], &after[idx..]),
            None => (after, ""),
        }
    } else {
        ("", rest)
    }
}

fn glob_list(pattern: &str) -> Result<Vec<String>> {
    let paths = glob::glob(pattern)
        .map_err(|e| Error::Transport { message: format!("invalid glob pattern: {e}") })?;
    Ok(paths
        .filter_map(|entry| entry.ok())
        .map(|p| p.to_string_lossy().into_owned())
        .collect())
}

fn ssh_list(netloc: &str, prefix: &str, suffix: &str) -> Result<Vec<String>> {
    let remote_command = format!(
        "ls -d --quoting-style=shell {}*{}",
        shell_quote(prefix),
        shell_quote(suffix)
    );
    let output = Command::new("ssh")
        .arg(netloc)
        .arg(&remote_command)
        .output()
        .map_err(|e| Error::Transport { message: format!("failed to run ssh: {e}") })?;

    if !output.status.success() {
        return Err(Error::Transport {
            message: format!(
                "failed to list snapshots: {}",
                String::from_utf8_lossy(&output.stderr)
            ),
        });
    }

    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    shlex::split(&text)
        .ok_or_else(|| Error::Transport { message: "failed to parse remote listing".to_string() })
}

/// wrap `s` in single quotes, escaping embedded single quotes POSIX-shell
/// style (`'...'"'"'...'`).
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r#"'"'"'"#))
}

/// mirror a `file://`-reachable sod repository's object graph, returning
/// its current head.
fn sync_file(repo: &Repo, remote_worktree: &Path) -> Result<Hash> {
    let remote = Repo::open(remote_worktree)?;
    let head = crate::refs::read_head(&remote)?.ok_or(Error::NoHead)?;

    let mut visited = HashSet::new();
    copy_commit_graph_local(&remote, repo, &head, &mut visited)?;

    Ok(head)
}

fn copy_commit_graph_local(
    src: &Repo,
    dst: &Repo,
    hash: &Hash,
    visited: &mut HashSet<Hash>,
) -> Result<()> {
    if !visited.insert(*hash) {
        return Ok(());
    }

    copy_loose_object(&src.commits_path(), &dst.commits_path(), hash)?;
    let commit = read_commit(dst, hash)?;

    copy_tree_graph_local(src, dst, &commit.tree, visited)?;
    if let Some(parent) = commit.parent {
        copy_commit_graph_local(src, dst, &parent, visited)?;
    }

    Ok(())
}

fn copy_tree_graph_local(
    src: &Repo,
    dst: &Repo,
    hash: &Hash,
    visited: &mut HashSet<Hash>,
) -> Result<()> {
    if !visited.insert(*hash) {
        return Ok(());
    }

    copy_loose_object(&src.trees_path(), &dst.trees_path(), hash)?;
    let tree = read_tree(dst, hash)?;

    for entry in tree.entries() {
        match &entry.kind {
            EntryKind::Subtree { hash } => copy_tree_graph_local(src, dst, hash, visited)?,
            EntryKind::RegularBlob { hash } | EntryKind::SymlinkBlob { hash } => {
                if visited.insert(*hash) {
                    copy_loose_object(&src.blobs_path(), &dst.blobs_path(), hash)?;
                }
            }
        }
    }

    Ok(())
}

fn copy_loose_object(src_dir: &Path, dst_dir: &Path, hash: &Hash) -> Result<()> {
    let (prefix, suffix) = hash.to_path_components();
    let src_path = src_dir.join(&prefix).join(&suffix);
    let dst_path = dst_dir.join(&prefix).join(&suffix);

    if dst_path.exists() {
        return Ok(());
    }
    if let Some(parent) = dst_path.parent() {
        fs::create_dir_all(parent).with_path(parent)?;
    }

    if fs::hard_link(&src_path, &dst_path).is_err() {
        fs::copy(&src_path, &dst_path).with_path(&dst_path)?;
    }

    Ok(())
}

/// mirror an `ssh://`-reachable sod repository's object graph by `scp`-ing
/// each missing loose object into place, discovering further hashes to
/// fetch as each commit/tree is decoded locally.
fn sync_ssh(repo: &Repo, netloc: &str, remote_root: &str) -> Result<Hash> {
    let head_content = scp_read_to_string(repo, netloc, &format!("{remote_root}/{DOT_DIR}/HEAD"))?;
    let ref_name = head_content
        .trim()
        .strip_prefix("ref: ")
        .ok_or_else(|| Error::Transport { message: "invalid remote HEAD".to_string() })?;
    let hash_hex = scp_read_to_string(
        repo,
        netloc,
        &format!("{remote_root}/{DOT_DIR}/{ref_name}"),
    )?;
    let head = Hash::from_hex(hash_hex.trim())?;

    let mut visited = HashSet::new();
    copy_commit_graph_ssh(repo, netloc, remote_root, &head, &mut visited)?;

    Ok(head)
}

fn copy_commit_graph_ssh(
    repo: &Repo,
    netloc: &str,
    remote_root: &str,
    hash: &Hash,
    visited: &mut HashSet<Hash>,
) -> Result<()> {
    if !visited.insert(*hash) {
        return Ok(());
    }

    fetch_loose_object_ssh(repo, netloc, remote_root, "objects/commits", &repo.commits_path(), hash)?;
    let commit = read_commit(repo, hash)?;

    copy_tree_graph_ssh(repo, netloc, remote_root, &commit.tree, visited)?;
    if let Some(parent) = commit.parent {
        copy_commit_graph_ssh(repo, netloc, remote_root, &parent, visited)?;
    }

    Ok(())
}

fn copy_tree_graph_ssh(
    repo: &Repo,
    netloc: &str,
    remote_root: &str,
    hash: &Hash,
    visited: &mut HashSet<Hash>,
) -> Result<()> {
    if !visited.insert(*hash) {
        return Ok(());
    }

    fetch_loose_object_ssh(repo, netloc, remote_root, "objects/trees", &repo.trees_path(), hash)?;
    let tree = read_tree(repo, hash)?;

    for entry in tree.entries() {
        match &entry.kind {
            EntryKind::Subtree { hash } => copy_tree_graph_ssh(repo, netloc, remote_root, hash, visited)?,
            EntryKind::RegularBlob { hash } | EntryKind::SymlinkBlob { hash } => {
                if visited.insert(*hash) {
                    fetch_loose_object_ssh(repo, netloc, remote_root, "objects/blobs", &repo.blobs_path(), hash)?;
                }
            }
        }
    }

    Ok(())
}

fn fetch_loose_object_ssh(
    repo: &Repo,
    netloc: &str,
    remote_root: &str,
    remote_subdir: &str,
    dst_dir: &Path,
    hash: &Hash,
) -> Result<()> {
    let (prefix, suffix) = hash.to_path_components();
    let dst_path = dst_dir.join(&prefix).join(&suffix);
    if dst_path.exists() {
        return Ok(());
    }
    if let Some(parent) = dst_path.parent() {
        fs::create_dir_all(parent).with_path(parent)?;
    }

    let remote_file = format!("{remote_root}/{DOT_DIR}/{remote_subdir}/{prefix}/{suffix}");
    let tmp_path = repo.tmp_path().join(uuid::Uuid::new_v4().to_string());
    scp_download(netloc, &remote_file, &tmp_path)?;
    fs::rename(&tmp_path, &dst_path).with_path(&dst_path)?;

    Ok(())
}

fn scp_read_to_string(repo: &Repo, netloc: &str, remote_file: &str) -> Result<String> {
    let tmp_path = repo.tmp_path().join(uuid::Uuid::new_v4().to_string());
    scp_download(netloc, remote_file, &tmp_path)?;
    let content = fs::read_to_string(&tmp_path).with_path(&tmp_path)?;
    let _ = fs::remove_file(&tmp_path);
    Ok(content)
}

/// download `{netloc}:{remote_path}` to `local_path`, exactly as the "plain"
/// ssh scheme's `_download` (§4.7): `scp -T` avoids scp's destination-is-a-
/// directory heuristics misfiring on wildcard-containing remote paths.
fn scp_download(netloc: &str, remote_path: &str, local_path: &Path) -> Result<()> {
    let quoted = glob::Pattern::escape(remote_path);
    let status = Command::new("scp")
        .arg("-T")
        .arg(format!("{netloc}:{quoted}"))
        .arg(local_path)
        .status()
        .map_err(|e| Error::Transport { message: format!("failed to spawn scp: {e}") })?;

    if !status.success() {
        return Err(Error::Transport { message: "download failed".to_string() });
    }
    Ok(())
}

/// download one file named by a resolved plain-backend URL, not following
/// symlinks (§4.7).
fn download(remote_file: &str, destination: &Path) -> Result<()> {
    let (scheme, netloc, path) = parse_url(remote_file)?;
    match scheme {
        UrlScheme::File => {
            let src = Path::new(&path);
            let meta = fs::symlink_metadata(src).with_path(src)?;
            if meta.file_type().is_symlink() {
                let target = fs::read_link(src).with_path(src)?;
                std::os::unix::fs::symlink(&target, destination).with_path(destination)?;
            } else {
                fs::copy(src, destination).with_path(destination)?;
            }
            Ok(())
        }
        UrlScheme::Ssh => scp_download(&netloc, &path, destination),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::commit::commit;
    use crate::object::write_blob;
    use crate::types::{Index, IndexEntry, IndexMode};
    use tempfile::tempdir;

    #[test]
    fn test_parse_url_bare_path_is_file_scheme() {
        let (scheme, netloc, path) = parse_url("/mnt/backup").unwrap();
        assert_eq!(scheme, UrlScheme::File);
        assert_eq!(netloc, "");
        assert_eq!(path, "/mnt/backup");
    }

    #[test]
    fn test_parse_url_file_scheme_explicit() {
        let (scheme, netloc, path) = parse_url("file:///1/*/snapshot").unwrap();
        assert_eq!(scheme, UrlScheme::File);
        assert_eq!(netloc, "");
        assert_eq!(path, "/1/*/snapshot");
    }

    #[test]
    fn test_parse_url_ssh_scheme() {
        let (scheme, netloc, path) = parse_url("ssh://host/path/*/snapshot").unwrap();
        assert_eq!(scheme, UrlScheme::Ssh);
        assert_eq!(netloc, "host");
        assert_eq!(path, "/path/*/snapshot");
    }

    #[test]
    fn test_parse_url_rejects_unknown_scheme() {
        assert!(parse_url("ftp://host/path").is_err());
    }

    #[test]
    fn test_parse_url_rejects_ssh_without_netloc() {
        assert!(parse_url("ssh:///path").is_err());
    }

    #[test]
    fn test_parse_url_rejects_file_with_netloc() {
        assert!(parse_url("file://host/path").is_err());
    }

    #[test]
    fn test_parse_url_rejects_multiple_wildcards() {
        assert!(parse_url("/mnt/*/backup/*").is_err());
    }

    #[test]
    fn test_parse_url_rejects_query() {
        assert!(parse_url("/mnt/backup?x=1").is_err());
    }

    #[test]
    fn test_parse_url_rejects_empty_path() {
        assert!(parse_url("ssh://host").is_err());
    }

    #[test]
    fn test_new_rejects_bad_url_eagerly() {
        assert!(PlainAuxStore::new("ftp://host/path").is_err());
    }

    #[test]
    fn test_list_without_wildcard_yields_single_candidate() {
        let store = PlainAuxStore::new("/mnt/backup").unwrap();
        let candidates = store.list().unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].id.is_none());
    }

    #[test]
    fn test_list_with_wildcard_globs_filesystem() {
        let dir = tempdir().unwrap();
        for id in ["1", "2", "3"] {
            let worktree = dir.path().join(id);
            Repo::init(&worktree).unwrap();
        }
        // a directory with no .sod is not a candidate
        fs::create_dir(dir.path().join("4")).unwrap();

        let pattern = format!("{}/*", dir.path().display());
        let store = PlainAuxStore::new(&pattern).unwrap();
        let mut ids: Vec<String> = store.list().unwrap().into_iter().filter_map(|c| c.id).collect();
        ids.sort();

        assert_eq!(ids, vec!["1".to_string(), "2".to_string(), "3".to_string()]);
    }

    #[test]
    fn test_update_file_scheme_mirrors_head_and_objects() {
        let dir = tempdir().unwrap();

        let remote_worktree = dir.path().join("remote");
        let remote = Repo::init(&remote_worktree).unwrap();
        let hash = write_blob(&remote, b"40aff2e9abcdef0123456789abcdef0123456789\n").unwrap();
        let mut index = Index::new();
        index.upsert(IndexEntry::new("a.txt", IndexMode::RegularBlob, hash));
        let c = commit(&remote, &index, "Initial", true).unwrap();
        let remote_head = crate::refs::read_head(&remote).unwrap().unwrap();

        let local_worktree = dir.path().join("local");
        let local = Repo::init(&local_worktree).unwrap();

        let store = PlainAuxStore::new(remote_worktree.to_str().unwrap()).unwrap();
        store.update(&local, "backup").unwrap();

        let snapshot_hash = crate::refs::read_ref(&local, "refs/snapshots/backup").unwrap();
        assert_eq!(snapshot_hash, remote_head);

        let fetched = read_commit(&local, &remote_head).unwrap();
        assert_eq!(fetched.tree, c.tree);
    }

    #[test]
    fn test_restore_file_scheme_copies_bytes() {
        let dir = tempdir().unwrap();
        let remote_root = dir.path().join("remote");
        fs::create_dir_all(&remote_root).unwrap();
        fs::write(remote_root.join("a.txt"), b"hello").unwrap();

        let store = PlainAuxStore::new(remote_root.to_str().unwrap()).unwrap();
        let snapshot = Snapshot { store: "backup".to_string(), id: None, base_commit_id: Hash::ZERO };

        let destination = dir.path().join("restored.txt");
        store.restore(&snapshot, "a.txt", &destination).unwrap();

        assert_eq!(fs::read(&destination).unwrap(), b"hello");
    }
}
