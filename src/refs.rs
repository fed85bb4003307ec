use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::Hash;
use crate::repo::Repo;

/// resolve `HEAD` to its target commit hash, or `None` on a repository with
/// no commits yet (§4.12: `no-HEAD` state).
pub fn read_head(repo: &Repo) -> Result<Option<Hash>> {
    let ref_name = head_ref_name(repo)?;
    match read_ref(repo, &ref_name) {
        Ok(hash) => Ok(Some(hash)),
        Err(Error::RefNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// the ref name HEAD currently points at (e.g. `refs/heads/master`)
pub fn head_ref_name(repo: &Repo) -> Result<String> {
    let head_path = repo.head_path();
    let content = fs::read_to_string(&head_path).with_path(&head_path)?;
    let content = content.trim();
    content
        .strip_prefix("ref: ")
        .map(|s| s.to_string())
        .ok_or_else(|| Error::InvalidRefName(content.to_string()))
}

/// advance HEAD's target ref to `hash`, creating `refs/heads/master` on the
/// first commit if HEAD does not resolve to an existing ref file yet.
pub fn advance_head(repo: &Repo, hash: &Hash) -> Result<()> {
    let ref_name = head_ref_name(repo)?;
    write_ref(repo, &ref_name, hash)
}

/// write a ref under `.sod/refs/...` (create or update)
pub fn write_ref(repo: &Repo, ref_name: &str, hash: &Hash) -> Result<()> {
    validate_ref_name(ref_name)?;

    let path = ref_path(repo, ref_name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_path(parent)?;
    }

    let tmp_path = repo.tmp_path().join(uuid::Uuid::new_v4().to_string());
    {
        let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
        writeln!(tmp_file, "{}", hash.to_hex()).with_path(&tmp_path)?;
        tmp_file.sync_all().with_path(&tmp_path)?;
    }
    fs::rename(&tmp_path, &path).with_path(&path)?;

    if let Some(parent) = path.parent() {
        let dir = File::open(parent).with_path(parent)?;
        dir.sync_all().with_path(parent)?;
    }
    Ok(())
}

/// read a ref under `.sod/refs/...`
pub fn read_ref(repo: &Repo, ref_name: &str) -> Result<Hash> {
    let path = ref_path(repo, ref_name);
    let content = fs::read_to_string(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::RefNotFound(ref_name.to_string())
        } else {
            Error::Io { path: path.clone(), source: e }
        }
    })?;
    Hash::from_hex(content.trim())
}

/// resolve a refish string (ref name or bare hex hash) to a hash
pub fn resolve_ref(repo: &Repo, refish: &str) -> Result<Hash> {
    if refish.len() == 64 && refish.chars().all(|c| c.is_ascii_hexdigit()) {
        return Hash::from_hex(refish);
    }
    read_ref(repo, refish)
}

/// resolve a CLI-facing revision string to a commit hash: `HEAD`, a bare hex
/// object hash, or a ref name (tried bare and under `refs/heads/`). Anything
/// else fails with `BadRevision`, not the underlying `RefNotFound`.
pub fn resolve_revision(repo: &Repo, refish: &str) -> Result<Hash> {
    if refish == "HEAD" {
        return read_head(repo)?.ok_or(Error::NoHead);
    }
    if refish.len() == 64 && refish.chars().all(|c| c.is_ascii_hexdigit()) {
        return Hash::from_hex(refish).map_err(|_| Error::BadRevision(refish.to_string()));
    }
    if let Ok(hash) = read_ref(repo, refish) {
        return Ok(hash);
    }
    let under_heads = format!("refs/heads/{refish}");
    read_ref(repo, &under_heads).map_err(|_| Error::BadRevision(refish.to_string()))
}

pub fn delete_ref(repo: &Repo, ref_name: &str) -> Result<()> {
    let path = ref_path(repo, ref_name);
    fs::remove_file(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::RefNotFound(ref_name.to_string())
        } else {
            Error::Io { path, source: e }
        }
    })
}

pub fn ref_exists(repo: &Repo, ref_name: &str) -> bool {
    ref_path(repo, ref_name).exists()
}

/// list every ref under `prefix` (e.g. `refs/snapshots`), returned with
/// `.sod/` stripped (so entries begin with the prefix itself), sorted.
pub fn list_refs_under(repo: &Repo, prefix: &str) -> Result<Vec<String>> {
    let root = repo.dot_path().join(prefix);
    let mut out = Vec::new();
    if root.is_dir() {
        collect(repo.dot_path(), &root, &mut out)?;
    }
    out.sort();
    Ok(out)
}

/// delete every ref under `under_prefix` whose leaf name equals `name` or
/// begins `name/` (§4.6 `AuxStores::delete`).
pub fn delete_refs_matching(repo: &Repo, under_prefix: &str, name: &str) -> Result<()> {
    let all = list_refs_under(repo, under_prefix)?;
    let self_prefix = format!("{name}/");
    for r in all {
        let leaf = r
            .strip_prefix(under_prefix)
            .unwrap_or(&r)
            .trim_start_matches('/');
        if leaf == name || leaf.starts_with(&self_prefix) {
            delete_ref(repo, &r)?;
        }
    }
    Ok(())
}

fn ref_path(repo: &Repo, ref_name: &str) -> PathBuf {
    repo.dot_path().join(ref_name)
}

fn collect(base: &std::path::Path, dir: &std::path::Path, out: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir).with_path(dir)? {
        let entry = entry.with_path(dir)?;
        let path = entry.path();
        if path.is_dir() {
            collect(base, &path, out)?;
        } else if path.is_file() {
            if let Ok(rel) = path.strip_prefix(base) {
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    Ok(())
}

fn validate_ref_name(name: &str) -> Result<()> {
    if name.is_empty() || name.starts_with('/') || name.ends_with('/') || name.contains("//") {
        return Err(Error::InvalidRefName(name.to_string()));
    }
    if name.contains('\0') {
        return Err(Error::InvalidRefName(name.to_string()));
    }
    for component in name.split('/') {
        if component == "." || component == ".." {
            return Err(Error::InvalidRefName(name.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let worktree = dir.path().join("work");
        fs::create_dir_all(&worktree).unwrap();
        let repo = Repo::init(&worktree).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_no_head_on_fresh_repo() {
        let (_dir, repo) = test_repo();
        assert_eq!(read_head(&repo).unwrap(), None);
    }

    #[test]
    fn test_advance_head_creates_refs_heads_master() {
        let (_dir, repo) = test_repo();
        let hash = Hash::of(b"commit1");
        advance_head(&repo, &hash).unwrap();
        assert_eq!(read_head(&repo).unwrap(), Some(hash));
        assert_eq!(read_ref(&repo, "refs/heads/master").unwrap(), hash);
    }

    #[test]
    fn test_snapshot_refs_under_prefix() {
        let (_dir, repo) = test_repo();
        write_ref(&repo, "refs/snapshots/aux1/1", &Hash::of(b"a")).unwrap();
        write_ref(&repo, "refs/snapshots/aux1/2", &Hash::of(b"b")).unwrap();
        write_ref(&repo, "refs/snapshots/aux2", &Hash::of(b"c")).unwrap();

        let all = list_refs_under(&repo, "refs/snapshots").unwrap();
        assert_eq!(
            all,
            vec![
                "refs/snapshots/aux1/1".to_string(),
                "refs/snapshots/aux1/2".to_string(),
                "refs/snapshots/aux2".to_string(),
            ]
        );
    }

    #[test]
    fn test_delete_refs_matching_store_and_children() {
        let (_dir, repo) = test_repo();
        write_ref(&repo, "refs/snapshots/aux1/1", &Hash::of(b"a")).unwrap();
        write_ref(&repo, "refs/snapshots/aux1/2", &Hash::of(b"b")).unwrap();
        write_ref(&repo, "refs/snapshots/aux2", &Hash::of(b"c")).unwrap();

        delete_refs_matching(&repo, "refs/snapshots", "aux1").unwrap();

        let remaining = list_refs_under(&repo, "refs/snapshots").unwrap();
        assert_eq!(remaining, vec!["refs/snapshots/aux2".to_string()]);
    }

    #[test]
    fn test_resolve_ref_accepts_hex_or_name() {
        let (_dir, repo) = test_repo();
        let hash = Hash::of(b"x");
        write_ref(&repo, "refs/heads/master", &hash).unwrap();

        assert_eq!(resolve_ref(&repo, "refs/heads/master").unwrap(), hash);
        assert_eq!(resolve_ref(&repo, &hash.to_hex()).unwrap(), hash);
    }

    #[test]
    fn test_resolve_revision_head() {
        let (_dir, repo) = test_repo();
        let hash = Hash::of(b"x");
        write_ref(&repo, "refs/heads/master", &hash).unwrap();

        assert_eq!(resolve_revision(&repo, "HEAD").unwrap(), hash);
    }

    #[test]
    fn test_resolve_revision_head_with_no_commits_fails() {
        let (_dir, repo) = test_repo();
        assert!(matches!(resolve_revision(&repo, "HEAD"), Err(Error::NoHead)));
    }

    #[test]
    fn test_resolve_revision_short_name_under_refs_heads() {
        let (_dir, repo) = test_repo();
        let hash = Hash::of(b"x");
        write_ref(&repo, "refs/heads/master", &hash).unwrap();

        assert_eq!(resolve_revision(&repo, "master").unwrap(), hash);
    }

    #[test]
    fn test_resolve_revision_unknown_is_bad_revision() {
        let (_dir, repo) = test_repo();
        assert!(matches!(resolve_revision(&repo, "nope"), Err(Error::BadRevision(_))));
    }

    #[test]
    fn test_invalid_ref_names_rejected() {
        let (_dir, repo) = test_repo();
        assert!(write_ref(&repo, "", &Hash::ZERO).is_err());
        assert!(write_ref(&repo, "/leading", &Hash::ZERO).is_err());
        assert!(write_ref(&repo, "a//b", &Hash::ZERO).is_err());
    }
}
