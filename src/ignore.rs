//! ignored-path policy (§4.10): the skip rules shared by the walker, `add`,
//! and `status --ignored`.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// directory names omitted from the walk entirely (but whose parent is
/// still walked normally)
pub const DEFAULT_SKIP_NAMES: &[&str] = &[".snapshots", ".sod"];
/// filenames whose presence in a directory makes the whole directory opaque
pub const DEFAULT_SKIP_FLAGS: &[&str] = &[".git", ".svn", ".sodignore"];

#[derive(Clone, Debug)]
pub struct IgnorePolicy {
    pub skip_names: HashSet<String>,
    pub skip_flags: HashSet<String>,
}

impl Default for IgnorePolicy {
    fn default() -> Self {
        Self {
            skip_names: DEFAULT_SKIP_NAMES.iter().map(|s| s.to_string()).collect(),
            skip_flags: DEFAULT_SKIP_FLAGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl IgnorePolicy {
    fn dir_has_skip_flag(&self, dir: &Path) -> bool {
        let Ok(entries) = fs::read_dir(dir) else {
            return false;
        };
        entries.filter_map(|e| e.ok()).any(|e| {
            e.file_name()
                .to_str()
                .map(|n| self.skip_flags.contains(n))
                .unwrap_or(false)
        })
    }
}

/// true if `abs_path` (or any ancestor up to and including `root`) is
/// skipped by the policy: its basename is in `skip_names`, or the directory
/// itself contains a `skip_flags` file.
pub fn is_ignored(root: &Path, abs_path: &Path, policy: &IgnorePolicy) -> bool {
    let mut cur = abs_path.to_path_buf();
    loop {
        if let Some(name) = cur.file_name().and_then(|s| s.to_str()) {
            if policy.skip_names.contains(name) {
                return true;
            }
        }
        if cur.is_dir() && policy.dir_has_skip_flag(&cur) {
            return true;
        }
        if cur == *root {
            return false;
        }
        match cur.parent() {
            Some(p) => cur = p.to_path_buf(),
            None => return false,
        }
    }
}

/// enumerate, depth-first, every directory (as a path relative to `root`)
/// the walker would skip: `skip_names` directories and `skip_flags`-marked
/// subtrees. Used by `status --ignored`.
pub fn ignored_paths(root: &Path, policy: &IgnorePolicy) -> Vec<PathBuf> {
    let mut out = Vec::new();
    collect(root, Path::new(""), policy, &mut out);
    out.sort();
    out
}

fn collect(root: &Path, rel: &Path, policy: &IgnorePolicy, out: &mut Vec<PathBuf>) {
    let abs = root.join(rel);
    let Ok(read) = fs::read_dir(&abs) else {
        return;
    };
    let entries: Vec<_> = read.filter_map(|e| e.ok()).collect();

    let has_flag = entries.iter().any(|e| {
        e.file_name()
            .to_str()
            .map(|n| policy.skip_flags.contains(n))
            .unwrap_or(false)
    });
    if has_flag {
        out.push(rel.to_path_buf());
        return;
    }

    for entry in &entries {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let child_rel = rel.join(&name);
        if policy.skip_names.contains(&name) {
            out.push(child_rel);
            continue;
        }
        collect(root, &child_rel, policy, out);
    }
}
