use serde::{Deserialize, Serialize};

use crate::hash::Hash;

/// an opaque author/committer identity: name + email + optional instant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    /// unix timestamp, seconds since epoch
    pub timestamp: i64,
    /// signed offset from UTC, in minutes (e.g. `-0430` is `-270`)
    pub tz_offset_minutes: i32,
}

impl Signature {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        timestamp: i64,
        tz_offset_minutes: i32,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            timestamp,
            tz_offset_minutes,
        }
    }
}

/// a commit object: at most one parent (no merges), a root tree, and
/// separate author/committer signatures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub tree: Hash,
    pub parent: Option<Hash>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl Commit {
    pub fn new(
        tree: Hash,
        parent: Option<Hash>,
        author: Signature,
        committer: Signature,
        message: impl Into<String>,
    ) -> Self {
        Self {
            tree,
            parent,
            author,
            committer,
            message: message.into(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}
