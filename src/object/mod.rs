pub mod blob;
pub mod commit;
pub mod tree;

pub use blob::{blob_exists, blob_path, read_blob, read_blob_to, write_blob, write_blob_streaming};
pub use commit::{commit_exists, commit_path, read_commit, write_commit};
pub use tree::{read_tree, tree_exists, tree_path, write_tree};
