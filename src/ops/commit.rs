//! commit operation (§4.5): builds a new commit on the single history head
//! from the staged index, then fires the snapshot hook.

use std::env;

use crate::diff::diff_index_to_tree;
use crate::error::{Error, Result};
use crate::object::{read_commit, read_tree, write_commit};
use crate::refs::{head_ref_name, read_head, write_ref};
use crate::repo::Repo;
use crate::snapshot_hook;
use crate::tree_builder::tree_from_index;
use crate::types::{Commit, Index, Signature, Tree};

const AUTHOR_NAME: &str = "sod";
const AUTHOR_EMAIL: &str = "sod@localhost";

/// build a commit from `index` on top of the current head (§4.5).
///
/// fails with `NoStagedChanges` if the index matches HEAD's tree exactly.
/// unless `no_snapshot`, fires the snapshot hook (§4.9) after a successful
/// commit.
pub fn commit(repo: &Repo, index: &Index, message: &str, no_snapshot: bool) -> Result<Commit> {
    let head = read_head(repo)?;

    let parent_tree = match head {
        Some(h) => read_commit(repo, &h)?.tree,
        None => crate::object::write_tree(repo, &Tree::empty())?,
    };
    let parent_tree_obj = read_tree(repo, &parent_tree)?;

    let deltas = diff_index_to_tree(repo, index, &parent_tree_obj)?;
    if deltas.is_empty() {
        return Err(Error::NoStagedChanges);
    }

    let signature = build_signature()?;

    // HEAD's symbolic target (`refs/heads/master`) is written at `Repo::init`
    // time, before any commit exists, so it resolves on the first commit too
    // (§4.5 step 3: no parent, but the ref name is already known).
    let ref_name = head_ref_name(repo)?;

    let tree_hash = tree_from_index(repo, index)?;
    let commit = Commit::new(tree_hash, head, signature.clone(), signature, message);
    let commit_hash = write_commit(repo, &commit)?;

    write_ref(repo, &ref_name, &commit_hash)?;

    if !no_snapshot {
        snapshot_hook::fire(repo, &deltas)?;
    }

    Ok(commit)
}

/// build the commit signature, honoring `SOD_COMMIT_DATE` (§4.5 step 2,
/// §9: "must be set for deterministic tests").
fn build_signature() -> Result<Signature> {
    match env::var("SOD_COMMIT_DATE") {
        Ok(value) => parse_commit_date(&value),
        Err(env::VarError::NotPresent) => Ok(now_signature()),
        Err(env::VarError::NotUnicode(_)) => Err(Error::InvalidCommitDate(
            "SOD_COMMIT_DATE is not valid UTF-8".to_string(),
        )),
    }
}

/// `^[0-9]+ [-+][0-9]{4}$`: unix timestamp + tz offset "±HHMM"
fn parse_commit_date(value: &str) -> Result<Signature> {
    let invalid = || Error::InvalidCommitDate(value.to_string());

    let (ts_str, offset_str) = value.split_once(' ').ok_or_else(invalid)?;
    if ts_str.is_empty() || !ts_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let timestamp: i64 = ts_str.parse().map_err(|_| invalid())?;

    let sign = match offset_str.as_bytes().first() {
        Some(b'+') => 1,
        Some(b'-') => -1,
        _ => return Err(invalid()),
    };
    let digits = &offset_str[1..];
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let hours: i32 = digits[0..2].parse().map_err(|_| invalid())?;
    let minutes: i32 = digits[2..4].parse().map_err(|_| invalid())?;
    let tz_offset_minutes = sign * (hours * 60 + minutes);

    Ok(Signature::new(AUTHOR_NAME, AUTHOR_EMAIL, timestamp, tz_offset_minutes))
}

fn now_signature() -> Signature {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    Signature::new(AUTHOR_NAME, AUTHOR_EMAIL, timestamp, 0)
}
