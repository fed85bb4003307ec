//! directory walker (§4.2): a finite, non-restartable post-order traversal
//! of the working tree, bucketing each directory's entries into
//! subdirectories, regular files, and symlinks.

use std::fs;
use std::path::{Path, PathBuf};

use crate::ignore::IgnorePolicy;

/// one directory's classified entries, relative to the walk's `top`.
/// `dir` is the empty path for `top` itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalkEntry {
    pub dir: PathBuf,
    pub subdirs: Vec<String>,
    pub files: Vec<String>,
    pub symlinks: Vec<String>,
}

impl WalkEntry {
    fn empty(dir: PathBuf) -> Self {
        Self {
            dir,
            subdirs: Vec::new(),
            files: Vec::new(),
            symlinks: Vec::new(),
        }
    }

    pub fn is_opaque(&self) -> bool {
        self.subdirs.is_empty() && self.files.is_empty() && self.symlinks.is_empty()
    }
}

/// walk `top` post-order (children before parents), honoring `policy`.
/// Materialized into a `Vec`: callers must not assume laziness (§9).
pub fn walk(top: &Path, policy: &IgnorePolicy) -> Vec<WalkEntry> {
    let mut out = Vec::new();
    walk_rec(top, Path::new(""), policy, &mut out);
    out
}

fn walk_rec(top: &Path, rel: &Path, policy: &IgnorePolicy, out: &mut Vec<WalkEntry>) {
    let abs = top.join(rel);

    let read = match fs::read_dir(&abs) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(path = %abs.display(), error = %e, "failed to read directory during walk");
            out.push(WalkEntry::empty(rel.to_path_buf()));
            return;
        }
    };

    let entries: Vec<_> = read.filter_map(|e| e.ok()).collect();

    let has_skip_flag = entries.iter().any(|e| {
        e.file_name()
            .to_str()
            .map(|n| policy.skip_flags.contains(n))
            .unwrap_or(false)
    });
    if has_skip_flag {
        out.push(WalkEntry::empty(rel.to_path_buf()));
        return;
    }

    let mut subdirs = Vec::new();
    let mut files = Vec::new();
    let mut symlinks = Vec::new();

    for entry in &entries {
        let name = entry.file_name().to_string_lossy().to_string();
        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(path = %abs.join(&name).display(), error = %e, "failed to classify entry, defaulting to file");
                files.push(name);
                continue;
            }
        };

        if file_type.is_symlink() {
            symlinks.push(name);
        } else if file_type.is_dir() {
            if policy.skip_names.contains(&name) {
                continue;
            }
            subdirs.push(name);
        } else {
            files.push(name);
        }
    }

    for name in &subdirs {
        walk_rec(top, &rel.join(name), policy, out);
    }

    out.push(WalkEntry {
        dir: rel.to_path_buf(),
        subdirs,
        files,
        symlinks,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_walk_post_order() {
        let dir = tempdir().unwrap();
        let top = dir.path();
        fs::create_dir_all(top.join("x/y")).unwrap();
        fs::write(top.join("x/y/d.txt"), "d").unwrap();
        fs::write(top.join("a.txt"), "a").unwrap();

        let entries = walk(top, &IgnorePolicy::default());
        let dirs: Vec<_> = entries.iter().map(|e| e.dir.clone()).collect();

        // x/y must come before x, which must come before the root
        let pos_y = dirs.iter().position(|d| d == Path::new("x/y")).unwrap();
        let pos_x = dirs.iter().position(|d| d == Path::new("x")).unwrap();
        let pos_root = dirs.iter().position(|d| d == Path::new("")).unwrap();
        assert!(pos_y < pos_x);
        assert!(pos_x < pos_root);
    }

    #[test]
    fn test_walk_classifies_files_and_dirs() {
        let dir = tempdir().unwrap();
        let top = dir.path();
        fs::write(top.join("a.txt"), "a").unwrap();
        fs::create_dir(top.join("sub")).unwrap();

        let entries = walk(top, &IgnorePolicy::default());
        let root = entries.iter().find(|e| e.dir == Path::new("")).unwrap();
        assert_eq!(root.files, vec!["a.txt".to_string()]);
        assert_eq!(root.subdirs, vec!["sub".to_string()]);
    }

    #[test]
    fn test_walk_skip_names_omitted() {
        let dir = tempdir().unwrap();
        let top = dir.path();
        fs::create_dir_all(top.join(".sod")).unwrap();
        fs::write(top.join("a.txt"), "a").unwrap();

        let entries = walk(top, &IgnorePolicy::default());
        let root = entries.iter().find(|e| e.dir == Path::new("")).unwrap();
        assert!(!root.subdirs.contains(&".sod".to_string()));
        // and no WalkEntry is emitted for the skipped directory at all
        assert!(!entries.iter().any(|e| e.dir == Path::new(".sod")));
    }

    #[test]
    fn test_walk_skip_flag_yields_opaque_entry() {
        let dir = tempdir().unwrap();
        let top = dir.path();
        fs::create_dir_all(top.join("vendor")).unwrap();
        fs::write(top.join("vendor/.git"), "x").unwrap();
        fs::write(top.join("vendor/real.txt"), "x").unwrap();

        let entries = walk(top, &IgnorePolicy::default());
        let vendor = entries.iter().find(|e| e.dir == Path::new("vendor")).unwrap();
        assert!(vendor.is_opaque());
    }

    #[test]
    fn test_walk_empty_directory() {
        let dir = tempdir().unwrap();
        let top = dir.path();
        fs::create_dir(top.join("empty")).unwrap();

        let entries = walk(top, &IgnorePolicy::default());
        let empty = entries.iter().find(|e| e.dir == Path::new("empty")).unwrap();
        assert!(empty.is_opaque());
    }

    #[test]
    fn test_walk_symlinks_bucketed() {
        let dir = tempdir().unwrap();
        let top = dir.path();
        fs::write(top.join("target.txt"), "t").unwrap();
        std::os::unix::fs::symlink("target.txt", top.join("link")).unwrap();

        let entries = walk(top, &IgnorePolicy::default());
        let root = entries.iter().find(|e| e.dir == Path::new("")).unwrap();
        assert_eq!(root.symlinks, vec!["link".to_string()]);
    }
}
