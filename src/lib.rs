//! sod - digest-tracking revision control
//!
//! tracks cryptographic digests of large, opaque files rather than their
//! content, using a content-addressed object database structurally
//! compatible with a well-known distributed version-control format:
//! blobs, trees, commits, refs, and an index. Rolling back a file's actual
//! bytes is delegated to a pluggable auxiliary data store.
//!
//! # Core concepts
//!
//! - **Blob**: a regular-blob (`<digest>\n`) or symlink-blob (raw target
//!   bytes), content-addressed, never the file's real content.
//! - **Tree**: a serialized directory structure (CBOR + zstd).
//! - **Commit**: a tree snapshot with author/committer/message, at most one
//!   parent.
//! - **Index**: the staged next commit, a sorted list of `(path, mode, oid)`.
//! - **Ref**: a named pointer to a commit (`refs/heads/master`,
//!   `refs/snapshots/<store>[/<id>]`).
//! - **Aux store**: a backend that can later supply a file's real bytes for
//!   a commit it has snapshotted.
//!
//! # Example usage
//!
//! ```no_run
//! use sod::{ops, Repo};
//! use std::path::Path;
//!
//! let repo = Repo::init(Path::new("/path/to/repo")).unwrap();
//!
//! let mut index = ops::load_index(&repo).unwrap();
//! ops::add(&repo, &mut index, &[Path::new("/path/to/repo/data.bin")]).unwrap();
//! ops::save_index(&repo, &index).unwrap();
//!
//! ops::commit(&repo, &index, "track data.bin", false).unwrap();
//! ```

mod config;
mod diff;
mod digest;
mod error;
mod hash;
mod ignore;
mod object;
mod refs;
mod repo;
mod restore;
mod snapshot_hook;
mod tree_builder;
mod walk;

pub mod aux;
pub mod format;
pub mod ops;
pub mod types;

pub use config::Config;
pub use diff::{
    diff_index_to_tree, diff_index_to_tree_with_limit, diff_trees, diff_trees_with_limit,
    diff_working_tree_to_index, diff_working_tree_to_index_with_limit, DEFAULT_MAX_RENAME_CANDIDATES,
};
pub use digest::{digest_for, ALGORITHM, CACHE_VERSION, DIGEST_WIDTH, XATTR_NAME};
pub use error::{Error, IoResultExt, Result};
pub use hash::{compute_blob_hash, compute_compressed_hash, Hash};
pub use ignore::{is_ignored, ignored_paths, IgnorePolicy, DEFAULT_SKIP_FLAGS, DEFAULT_SKIP_NAMES};
pub use object::{
    blob_exists, blob_path, commit_exists, commit_path, read_blob, read_blob_to, read_commit,
    read_tree, tree_exists, tree_path, write_blob, write_blob_streaming, write_commit, write_tree,
};
pub use refs::{
    advance_head, delete_ref, delete_refs_matching, head_ref_name, list_refs_under, read_head,
    read_ref, ref_exists, resolve_ref, resolve_revision, write_ref,
};
pub use repo::{with_lock, Repo, RepoLock, DOT_DIR};
pub use restore::restore;
pub use types::{Commit, Delta, DeltaStatus, EntryKind, Index, IndexEntry, IndexMode, Signature, Tree, TreeEntry};
