use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, IoResultExt, Result};
use crate::hash::{compute_blob_hash, Hash};
use crate::repo::Repo;

/// write a blob (a digest line or a symlink target) to the object store.
///
/// blobs are content-addressed on their raw bytes alone — no ownership or
/// mode bits are folded into the hash or stored alongside the content.
pub fn write_blob(repo: &Repo, content: &[u8]) -> Result<Hash> {
    let hash = compute_blob_hash(content);

    let (dir, file) = hash.to_path_components();
    let blob_dir = repo.blobs_path().join(&dir);
    let blob_path = blob_dir.join(&file);

    if blob_path.exists() {
        return Ok(hash);
    }

    fs::create_dir_all(&blob_dir).with_path(&blob_dir)?;

    let tmp_path = repo.tmp_path().join(uuid::Uuid::new_v4().to_string());
    {
        let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
        tmp_file.write_all(content).with_path(&tmp_path)?;
        tmp_file.sync_all().with_path(&tmp_path)?;
    }

    fs::rename(&tmp_path, &blob_path).with_path(&blob_path)?;
    fsync_dir(&blob_dir)?;

    Ok(hash)
}

/// write a blob from a streaming reader, for large digest/symlink payloads
pub fn write_blob_streaming<R: Read>(repo: &Repo, reader: &mut R) -> Result<Hash> {
    let tmp_path = repo.tmp_path().join(uuid::Uuid::new_v4().to_string());

    let mut hasher = sha2::Sha256::default();
    use sha2::Digest;
    {
        let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf).with_path(&tmp_path)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            tmp_file.write_all(&buf[..n]).with_path(&tmp_path)?;
        }
        tmp_file.sync_all().with_path(&tmp_path)?;
    }

    let hash = Hash::from_bytes(hasher.finalize().into());

    let (dir, file) = hash.to_path_components();
    let blob_dir = repo.blobs_path().join(&dir);
    let blob_path = blob_dir.join(&file);

    if blob_path.exists() {
        fs::remove_file(&tmp_path).with_path(&tmp_path)?;
        return Ok(hash);
    }

    fs::create_dir_all(&blob_dir).with_path(&blob_dir)?;
    fs::rename(&tmp_path, &blob_path).with_path(&blob_path)?;
    fsync_dir(&blob_dir)?;

    Ok(hash)
}

pub fn blob_path(repo: &Repo, hash: &Hash) -> PathBuf {
    let (dir, file) = hash.to_path_components();
    repo.blobs_path().join(dir).join(file)
}

pub fn blob_exists(repo: &Repo, hash: &Hash) -> bool {
    blob_path(repo, hash).exists()
}

pub fn read_blob(repo: &Repo, hash: &Hash) -> Result<Vec<u8>> {
    let path = blob_path(repo, hash);
    fs::read(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::ObjectNotFound(*hash)
        } else {
            Error::Io { path, source: e }
        }
    })
}

pub fn read_blob_to<W: Write>(repo: &Repo, hash: &Hash, writer: &mut W) -> Result<u64> {
    let path = blob_path(repo, hash);
    let mut file = File::open(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::ObjectNotFound(*hash)
        } else {
            Error::Io {
                path: path.clone(),
                source: e,
            }
        }
    })?;

    let mut buf = [0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = file.read(&mut buf).with_path(&path)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).with_path(&path)?;
        total += n as u64;
    }
    Ok(total)
}

fn fsync_dir(path: &Path) -> Result<()> {
    let dir = File::open(path).with_path(path)?;
    dir.sync_all().with_path(path)?;
    Ok(())
}
