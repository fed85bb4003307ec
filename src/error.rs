use std::path::PathBuf;

use crate::Hash;

/// the single error kind surfaced to callers (§7/§9: `Error { kind, message }`)
///
/// internal distinctions are kept as variants so call sites can match on
/// them, but every variant renders a self-contained message via `Display` —
/// a CLI only ever needs to print `{e}` and exit non-zero.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not a sod-managed tree")]
    NoRepository,

    #[error("attempt to reinitialize: {0}")]
    AlreadyInitialized(PathBuf),

    #[error("no changes staged for commit")]
    NoStagedChanges,

    #[error("no commit found")]
    NoHead,

    #[error("bad revision: {0}")]
    BadRevision(String),

    #[error("file exists - refusing to overwrite: {0}")]
    TargetExists(PathBuf),

    #[error("no such file known to sod. Try different revision?")]
    PathNotFound,

    #[error("unsupported operation. Cannot restore directories")]
    RestoreDirectory,

    #[error("could not restore")]
    CouldNotRestore,

    #[error("auxiliary data store name may not contain slashes")]
    StoreNameHasSlash,

    #[error("auxiliary data store of this name already exists")]
    DuplicateStore,

    #[error("no such auxiliary data store")]
    UnknownStore,

    #[error("unsupported URL: {0}")]
    UnsupportedUrl(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("unknown configuration key: {0}")]
    UnknownConfigKey(String),

    #[error("ref not found: {0}")]
    RefNotFound(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),

    #[error("invalid tree entry name: {0}")]
    InvalidEntryName(String),

    #[error("duplicate tree entry name: {0}")]
    DuplicateEntryName(String),

    #[error("object not found: {0}")]
    ObjectNotFound(Hash),

    #[error("corrupt object: hash mismatch for {0}")]
    CorruptObject(Hash),

    #[error("repository is locked by another process")]
    LockContention,

    #[error("invalid SOD_COMMIT_DATE: {0}")]
    InvalidCommitDate(String),

    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("xattr error on {path}: {message}")]
    Xattr { path: PathBuf, message: String },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cbor serialization error: {0}")]
    CborEncode(#[from] ciborium::ser::Error<std::io::Error>),

    #[error("cbor deserialization error: {0}")]
    CborDecode(#[from] ciborium::de::Error<std::io::Error>),

    #[error("config error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("invalid hash hex")]
    InvalidHashHex,

    #[error("path is not inside the working tree: {0}")]
    NotInWorktree(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;

/// helper to wrap io errors with path context
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}
