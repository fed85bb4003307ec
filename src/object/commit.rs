use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::{compute_compressed_hash, Hash};
use crate::repo::Repo;
use crate::types::Commit;

/// write a commit to the object store: CBOR-encode, zstd-compress, hash the
/// compressed bytes (§3A).
pub fn write_commit(repo: &Repo, commit: &Commit) -> Result<Hash> {
    let mut cbor_bytes = Vec::new();
    ciborium::into_writer(commit, &mut cbor_bytes)?;

    let compressed = zstd::encode_all(&cbor_bytes[..], 3).map_err(|e| Error::Io {
        path: PathBuf::from("<zstd>"),
        source: e,
    })?;

    let hash = compute_compressed_hash(&compressed);

    let (dir, file) = hash.to_path_components();
    let commit_dir = repo.commits_path().join(&dir);
    let path = commit_dir.join(&file);

    if path.exists() {
        return Ok(hash);
    }

    fs::create_dir_all(&commit_dir).with_path(&commit_dir)?;

    let tmp_path = repo.tmp_path().join(uuid::Uuid::new_v4().to_string());
    {
        let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
        tmp_file.write_all(&compressed).with_path(&tmp_path)?;
        tmp_file.sync_all().with_path(&tmp_path)?;
    }
    fs::rename(&tmp_path, &path).with_path(&path)?;

    let dir_file = File::open(&commit_dir).with_path(&commit_dir)?;
    dir_file.sync_all().with_path(&commit_dir)?;

    Ok(hash)
}

pub fn read_commit(repo: &Repo, hash: &Hash) -> Result<Commit> {
    let path = commit_path(repo, hash);

    let compressed = fs::read(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::ObjectNotFound(*hash)
        } else {
            Error::Io { path: path.clone(), source: e }
        }
    })?;

    if compute_compressed_hash(&compressed) != *hash {
        return Err(Error::CorruptObject(*hash));
    }

    let cbor_bytes = zstd::decode_all(&compressed[..]).map_err(|e| Error::Io {
        path: path.clone(),
        source: e,
    })?;

    Ok(ciborium::from_reader(&cbor_bytes[..])?)
}

pub fn commit_path(repo: &Repo, hash: &Hash) -> PathBuf {
    let (dir, file) = hash.to_path_components();
    repo.commits_path().join(dir).join(file)
}

pub fn commit_exists(repo: &Repo, hash: &Hash) -> bool {
    commit_path(repo, hash).exists()
}
