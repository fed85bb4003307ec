//! log operation (§4.5): walks history from a tip commit back to the root,
//! pairing each commit with the snapshots taken at it and its diff against
//! its parent.

use crate::aux::{all_snapshots, Snapshot};
use crate::diff::diff_trees;
use crate::error::Result;
use crate::hash::Hash;
use crate::object::{read_commit, read_tree};
use crate::repo::Repo;
use crate::types::{Commit, Delta, Tree};

/// one entry of `log`'s history walk.
pub struct LogEntry {
    pub hash: Hash,
    pub commit: Commit,
    /// snapshots whose `base_commit_id` equals this commit's id
    pub matching_snapshots: Vec<Snapshot>,
    /// diff against the parent commit's tree (the empty tree, for the root)
    pub diff_to_parent: Vec<Delta>,
}

/// walk history from `tip` to the root, newest first (§4.5).
pub fn log(repo: &Repo, tip: Hash) -> Result<Vec<LogEntry>> {
    let snapshots = all_snapshots(repo)?;

    let mut out = Vec::new();
    let mut current = Some(tip);

    while let Some(hash) = current {
        let commit = read_commit(repo, &hash)?;
        let tree = read_tree(repo, &commit.tree)?;

        let parent_tree = match commit.parent {
            Some(parent_hash) => read_tree(repo, &read_commit(repo, &parent_hash)?.tree)?,
            None => Tree::empty(),
        };

        let diff_to_parent = diff_trees(repo, &parent_tree, &tree)?;

        let matching_snapshots = snapshots
            .iter()
            .filter(|s| s.base_commit_id == hash)
            .cloned()
            .collect();

        current = commit.parent;
        out.push(LogEntry {
            hash,
            commit,
            matching_snapshots,
            diff_to_parent,
        });
    }

    Ok(out)
}
