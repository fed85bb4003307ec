mod commit;
mod diff;
mod index;
mod tree;

pub use commit::{Commit, Signature};
pub use diff::{Delta, DeltaStatus};
pub use index::{Index, IndexEntry, IndexMode};
pub use tree::{EntryKind, Tree, TreeEntry};
