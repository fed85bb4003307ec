//! auxiliary data stores (§4.6): sod's object database tracks only digests,
//! never file content. Rolling back a file's actual bytes is delegated to a
//! pluggable backend registered here, keyed by a short store name.
//!
//! a store's declaration lives in config as `sod-aux-store.<name>.{url,type}`
//! (see [`crate::config::Config`]); the revisions a backend currently offers
//! are mirrored into local refs under `refs/snapshots/<name>[/<id>]`, each
//! pointing at the commit that revision corresponds to. Restoring a file
//! walks those refs to find a revision that contains it (§4.8).

pub mod plain;

use std::path::Path;

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::refs::{delete_refs_matching, list_refs_under, read_ref};
use crate::repo::Repo;

/// ref namespace snapshots are mirrored under.
pub const SNAPSHOT_REF_PREFIX: &str = "refs/snapshots";

/// a locally known revision of an auxiliary store, resolved to the commit it
/// was taken at. `id` is `None` for a store with no wildcard in its URL (it
/// only ever has one revision); otherwise it is the string the store's `*`
/// was resolved to when this revision was discovered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub store: String,
    pub id: Option<String>,
    pub base_commit_id: Hash,
}

impl Snapshot {
    /// the `refs/snapshots/...` name this revision is mirrored under.
    pub fn reference(&self) -> String {
        match &self.id {
            Some(id) => format!("{SNAPSHOT_REF_PREFIX}/{}/{id}", self.store),
            None => format!("{SNAPSHOT_REF_PREFIX}/{}", self.store),
        }
    }

    /// the name shown to the user (`<store>` or `<store>/<id>`).
    pub fn name(&self) -> String {
        match &self.id {
            Some(id) => format!("{}/{id}", self.store),
            None => self.store.clone(),
        }
    }
}

/// an auxiliary store backend: knows how to mirror a store's current
/// revisions into local snapshot refs, and how to fetch real file content
/// for one of them.
pub trait AuxStore {
    fn type_name(&self) -> &'static str;

    /// discover `store_name`'s current revisions and mirror each into a
    /// local `refs/snapshots/<store_name>[/<id>]` ref (§4.6). Replaces
    /// whatever was mirrored there before.
    fn update(&self, repo: &Repo, store_name: &str) -> Result<()>;

    /// download the real content of `path` (relative, as it appears in
    /// `snapshot`'s tree) into `destination` (an absolute path; the backend
    /// does not check whether it already exists).
    fn restore(&self, snapshot: &Snapshot, path: &str, destination: &Path) -> Result<()>;

    /// enumerate the snapshot refs `store_name` currently has mirrored
    /// locally. A plain scan over local refs, identical for every backend,
    /// so given a default here rather than repeated per implementation.
    fn snapshots(&self, repo: &Repo, store_name: &str) -> Result<Vec<Snapshot>> {
        Ok(all_snapshots(repo)?
            .into_iter()
            .filter(|s| s.store == store_name)
            .collect())
    }
}

/// construct the backend for a declared store type and URL (§4.7). the only
/// recognized `store_type` at present is `"plain"`.
pub fn backend_for(store_type: &str, url: &str) -> Result<Box<dyn AuxStore>> {
    match store_type {
        "plain" => Ok(Box::new(plain::PlainAuxStore::new(url)?)),
        other => Err(Error::UnsupportedUrl(format!(
            "unknown auxiliary store type: {other}"
        ))),
    }
}

/// declare a new auxiliary store (§4.6). fails if `name` contains a slash,
/// if a store of this name is already declared, or if `url` does not parse
/// under `store_type`'s grammar.
pub fn create(repo: &mut Repo, name: &str, store_type: &str, url: &str) -> Result<()> {
    if name.contains('/') {
        return Err(Error::StoreNameHasSlash);
    }
    if repo.config().aux_store_url(name).is_some() {
        return Err(Error::DuplicateStore);
    }

    // validate eagerly: constructing the backend parses and checks the URL
    backend_for(store_type, url)?;

    repo.config_mut().set_aux_store(name, url, store_type);
    repo.save_config()
}

/// remove a declared auxiliary store and every snapshot ref mirrored for it.
pub fn delete(repo: &mut Repo, name: &str) -> Result<()> {
    if repo.config().aux_store_url(name).is_none() {
        return Err(Error::UnknownStore);
    }

    delete_refs_matching(repo, SNAPSHOT_REF_PREFIX, name)?;
    repo.config_mut().remove_aux_store(name);
    repo.save_config()
}

/// refresh the snapshot refs for `names`, or every declared store if `names`
/// is empty (§4.6). the first failing store aborts the whole call (§4.13).
pub fn update(repo: &Repo, names: &[String]) -> Result<()> {
    let all = repo.config().aux_store_names();
    let targets: Vec<String> = if names.is_empty() {
        all
    } else {
        all.into_iter().filter(|n| names.contains(n)).collect()
    };

    for name in &targets {
        let url = repo
            .config()
            .aux_store_url(name)
            .ok_or(Error::UnknownStore)?
            .to_string();
        let store_type = repo
            .config()
            .aux_store_type(name)
            .ok_or(Error::UnknownStore)?
            .to_string();

        let backend = backend_for(&store_type, &url)?;
        backend.update(repo, name)?;
    }

    Ok(())
}

/// every snapshot currently mirrored locally, across all stores, used by the
/// restore planner's ancestor walk (§4.8).
pub fn all_snapshots(repo: &Repo) -> Result<Vec<Snapshot>> {
    let refs = list_refs_under(repo, SNAPSHOT_REF_PREFIX)?;
    let mut out = Vec::with_capacity(refs.len());

    let under = format!("{SNAPSHOT_REF_PREFIX}/");
    for r in refs {
        let name = r.strip_prefix(&under).unwrap_or(&r);
        let (store, id) = match name.split_once('/') {
            Some((store, rest)) => (store.to_string(), Some(rest.to_string())),
            None => (name.to_string(), None),
        };
        let base_commit_id = read_ref(repo, &r)?;
        out.push(Snapshot { store, id, base_commit_id });
    }

    Ok(out)
}
