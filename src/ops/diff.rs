//! diff operation: resolves the CLI's revision arguments and delegates to
//! the diff engine (§4.4), covering the three comparisons the CLI needs —
//! two committed revisions, the index against a revision, and the index
//! against HEAD (the default, equivalent to `status`'s staged half).

use crate::diff::{diff_index_to_tree, diff_trees};
use crate::error::Result;
use crate::object::{read_commit, read_tree};
use crate::refs::resolve_revision;
use crate::repo::Repo;
use crate::types::{Delta, Index, Tree};

fn tree_for_revision(repo: &Repo, refish: &str) -> Result<Tree> {
    let hash = resolve_revision(repo, refish)?;
    let commit = read_commit(repo, &hash)?;
    read_tree(repo, &commit.tree)
}

/// diff two committed revisions against each other.
pub fn diff_revisions(repo: &Repo, old_refish: &str, new_refish: &str) -> Result<Vec<Delta>> {
    let old = tree_for_revision(repo, old_refish)?;
    let new = tree_for_revision(repo, new_refish)?;
    diff_trees(repo, &old, &new)
}

/// diff the staged index against a revision (`HEAD` by default).
pub fn diff_index(repo: &Repo, index: &Index, refish: &str) -> Result<Vec<Delta>> {
    let tree = tree_for_revision(repo, refish)?;
    diff_index_to_tree(repo, index, &tree)
}
