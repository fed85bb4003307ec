use serde::{Deserialize, Serialize};

use crate::hash::Hash;
use crate::types::tree::EntryKind;

/// the two blob shapes an index entry can hold. The index is always a
/// flattened list of leaf paths — subtrees exist only once entries are
/// folded into tree objects by the tree builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexMode {
    RegularBlob,
    SymlinkBlob,
}

impl IndexMode {
    pub fn into_entry_kind(self, hash: Hash) -> EntryKind {
        match self {
            IndexMode::RegularBlob => EntryKind::RegularBlob { hash },
            IndexMode::SymlinkBlob => EntryKind::SymlinkBlob { hash },
        }
    }
}

/// `(relative-path, mode, object-id)`, the staged snapshot of a future commit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// slash-separated, relative to the repository root
    pub path: String,
    pub mode: IndexMode,
    pub hash: Hash,
}

impl IndexEntry {
    pub fn new(path: impl Into<String>, mode: IndexMode, hash: Hash) -> Self {
        Self {
            path: path.into(),
            mode,
            hash,
        }
    }
}

/// the staged next commit: a sorted, path-unique list of entries
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    entries: Vec<IndexEntry>,
}

impl Index {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, path: &str) -> Option<&IndexEntry> {
        self.entries
            .binary_search_by(|e| e.path.as_str().cmp(path))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// insert or replace the entry at `path`
    pub fn upsert(&mut self, entry: IndexEntry) {
        match self.entries.binary_search_by(|e| e.path.as_str().cmp(&entry.path)) {
            Ok(i) => self.entries[i] = entry,
            Err(i) => self.entries.insert(i, entry),
        }
    }

    /// remove the single entry at `path`, if present
    pub fn remove(&mut self, path: &str) -> Option<IndexEntry> {
        self.entries
            .binary_search_by(|e| e.path.as_str().cmp(path))
            .ok()
            .map(|i| self.entries.remove(i))
    }

    /// remove `path` itself and every entry nested under `path/`. An empty
    /// `path` means the repository root, so it clears the whole index.
    pub fn remove_all_under(&mut self, path: &str) {
        if path.is_empty() {
            self.entries.clear();
            return;
        }
        let prefix = format!("{path}/");
        self.entries
            .retain(|e| e.path != path && !e.path.starts_with(&prefix));
    }

    /// all entries at or under `path` (an empty `path` means every entry)
    pub fn entries_under(&self, path: &str) -> impl Iterator<Item = &IndexEntry> {
        let prefix = format!("{path}/");
        self.entries
            .iter()
            .filter(move |e| path.is_empty() || e.path == path || e.path.starts_with(&prefix))
    }

    /// replace the whole index contents, re-sorting by path
    pub fn replace_all(&mut self, mut entries: Vec<IndexEntry>) {
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        self.entries = entries;
    }
}
