//! digest cache (§4.1): computes a file's content digest, backed by an
//! extended-attribute cache keyed on mtime and algorithm.

use std::fs::{self, File};
use std::io::Read;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;

use sha1::{Digest, Sha1};

/// current cache-format version (§3)
pub const CACHE_VERSION: u32 = 1;
/// current digest algorithm identifier (§3)
pub const ALGORITHM: &str = "sha1";
/// width, in hex characters, of a digest under the current algorithm
pub const DIGEST_WIDTH: usize = 40;
/// the xattr name the cache record lives under (§6)
pub const XATTR_NAME: &str = "user.sod.digest";

const CHUNK_SIZE: usize = 64 * 1024;

/// compute the hex digest of a regular file, consulting (and refreshing) the
/// xattr cache unless `rehash` forces recomputation.
///
/// never returns an `Err`: I/O failures during hashing are reported as the
/// zero-digest sentinel, per §4.1/§4.13.
pub fn digest_for(path: &Path, rehash: bool) -> String {
    let meta = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "stat failed during digest_for");
            return zero_digest();
        }
    };
    let current_mtime_ns = mtime_ns(&meta);

    if !rehash {
        if let Some(cached) = read_cache(path) {
            if cached.version == CACHE_VERSION
                && cached.algorithm == ALGORITHM
                && cached.mtime_ns >= current_mtime_ns
            {
                return cached.digest;
            }
        }
    }

    let digest = match hash_file(path) {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "hashing failed, using zero digest");
            return zero_digest();
        }
    };

    write_cache(path, current_mtime_ns, &digest);

    digest
}

fn zero_digest() -> String {
    "0".repeat(DIGEST_WIDTH)
}

fn mtime_ns(meta: &fs::Metadata) -> i128 {
    meta.mtime() as i128 * 1_000_000_000 + meta.mtime_nsec() as i128
}

fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha1::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

struct CacheRecord {
    version: u32,
    mtime_ns: i128,
    algorithm: String,
    digest: String,
}

fn parse_cache(raw: &str) -> Option<CacheRecord> {
    let mut parts = raw.splitn(4, ':');
    let version: u32 = parts.next()?.parse().ok()?;
    let mtime_ns: i128 = parts.next()?.parse().ok()?;
    let algorithm = parts.next()?.to_string();
    let digest = parts.next()?.to_string();
    Some(CacheRecord {
        version,
        mtime_ns,
        algorithm,
        digest,
    })
}

fn format_cache(mtime_ns: i128, digest: &str) -> String {
    format!("{CACHE_VERSION}:{mtime_ns}:{ALGORITHM}:{digest}")
}

fn read_cache(path: &Path) -> Option<CacheRecord> {
    match xattr::get(path, XATTR_NAME) {
        Ok(Some(raw)) => parse_cache(&String::from_utf8_lossy(&raw)),
        Ok(None) => None,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "xattr read failed");
            None
        }
    }
}

/// write the cache record back, temporarily granting owner-write permission
/// if the file is read-only and unconditionally restoring the original mode
/// afterward (§4.1 scoped-acquisition contract).
fn write_cache(path: &Path, mtime_ns: i128, digest: &str) {
    let guard = match WritableGuard::acquire(path) {
        Ok(g) => g,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to make file writable for xattr cache");
            return;
        }
    };

    if let Err(e) = xattr::set(path, XATTR_NAME, format_cache(mtime_ns, digest).as_bytes()) {
        tracing::warn!(path = %path.display(), error = %e, "failed to set digest cache xattr");
    }

    drop(guard);
}

/// RAII guard: grants the file owner-write permission on acquire, restores
/// the original mode bits on drop regardless of what happened in between.
struct WritableGuard<'a> {
    path: &'a Path,
    original_mode: u32,
}

impl<'a> WritableGuard<'a> {
    fn acquire(path: &'a Path) -> std::io::Result<Self> {
        let meta = fs::metadata(path)?;
        let original_mode = meta.permissions().mode();

        if original_mode & 0o200 == 0 {
            fs::set_permissions(path, fs::Permissions::from_mode(original_mode | 0o200))?;
        }

        Ok(Self { path, original_mode })
    }
}

impl Drop for WritableGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = fs::set_permissions(self.path, fs::Permissions::from_mode(self.original_mode)) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to restore file mode after xattr write");
        }
    }
}
