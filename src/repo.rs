use std::fs::File;
use std::path::{Path, PathBuf};

use nix::fcntl::{Flock, FlockArg};

use crate::config::Config;
use crate::error::{Error, IoResultExt, Result};

/// working-tree root name for the object database directory
pub const DOT_DIR: &str = ".sod";

/// a `.sod`-managed repository
pub struct Repo {
    /// absolute path to the `.sod` directory itself
    dot_path: PathBuf,
    config: Config,
}

impl Repo {
    /// initialize a new repository rooted at `worktree` (creates `<worktree>/.sod`)
    pub fn init(worktree: &Path) -> Result<Self> {
        std::fs::create_dir_all(worktree).with_path(worktree)?;
        // canonicalize so `worktree_path()`/`relpath()` always compare absolute,
        // symlink-resolved paths against the caller's (also canonicalized) paths
        // — otherwise the default `--repo .` strips nothing against an absolute
        // `sod add <path>` argument.
        let worktree = worktree.canonicalize().with_path(worktree)?;

        let dot_path = worktree.join(DOT_DIR);
        if dot_path.exists() {
            return Err(Error::AlreadyInitialized(worktree));
        }

        std::fs::create_dir_all(dot_path.join("objects/blobs")).with_path(&dot_path)?;
        std::fs::create_dir_all(dot_path.join("objects/trees")).with_path(&dot_path)?;
        std::fs::create_dir_all(dot_path.join("objects/commits")).with_path(&dot_path)?;
        std::fs::create_dir_all(dot_path.join("refs/heads")).with_path(&dot_path)?;
        std::fs::create_dir_all(dot_path.join("refs/snapshots")).with_path(&dot_path)?;
        std::fs::create_dir_all(dot_path.join("tmp")).with_path(&dot_path)?;

        std::fs::write(dot_path.join("HEAD"), b"ref: refs/heads/master\n")
            .with_path(&dot_path)?;

        let mut config = Config::new();
        config.set(crate::config::KEY_QUOTE_PATH, "false");
        config.save(&dot_path.join("config"))?;

        Ok(Self { dot_path, config })
    }

    /// open an existing repository given its working-tree root
    pub fn open(worktree: &Path) -> Result<Self> {
        let worktree = worktree.canonicalize().map_err(|_| Error::NoRepository)?;

        let dot_path = worktree.join(DOT_DIR);
        if !dot_path.is_dir() {
            return Err(Error::NoRepository);
        }

        let config = Config::load(&dot_path.join("config"))?;

        Ok(Self { dot_path, config })
    }

    /// search `start` and its ancestors for a `.sod` directory, git-style
    pub fn discover(start: &Path) -> Result<Self> {
        let mut cur = start.to_path_buf();
        loop {
            if cur.join(DOT_DIR).is_dir() {
                return Self::open(&cur);
            }
            if !cur.pop() {
                return Err(Error::NoRepository);
            }
        }
    }

    /// path to the `.sod` directory
    pub fn dot_path(&self) -> &Path {
        &self.dot_path
    }

    /// the working-tree root (parent of `.sod`)
    pub fn worktree_path(&self) -> &Path {
        self.dot_path.parent().expect("dot_path has a parent")
    }

    /// convert an absolute path under the working tree into its repository-
    /// relative, slash-separated form, as used by the index and trees.
    pub fn relpath(&self, abs: &Path) -> Result<String> {
        let rel = abs
            .strip_prefix(self.worktree_path())
            .map_err(|_| Error::NotInWorktree(abs.to_path_buf()))?;
        Ok(rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/"))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn save_config(&self) -> Result<()> {
        self.config.save(&self.config_path())
    }

    pub fn config_path(&self) -> PathBuf {
        self.dot_path.join("config")
    }

    pub fn objects_path(&self) -> PathBuf {
        self.dot_path.join("objects")
    }

    pub fn blobs_path(&self) -> PathBuf {
        self.objects_path().join("blobs")
    }

    pub fn trees_path(&self) -> PathBuf {
        self.objects_path().join("trees")
    }

    pub fn commits_path(&self) -> PathBuf {
        self.objects_path().join("commits")
    }

    pub fn refs_heads_path(&self) -> PathBuf {
        self.dot_path.join("refs/heads")
    }

    pub fn refs_snapshots_path(&self) -> PathBuf {
        self.dot_path.join("refs/snapshots")
    }

    pub fn head_path(&self) -> PathBuf {
        self.dot_path.join("HEAD")
    }

    pub fn index_path(&self) -> PathBuf {
        self.dot_path.join("index")
    }

    pub fn tmp_path(&self) -> PathBuf {
        self.dot_path.join("tmp")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dot_path.join("lock")
    }

    /// acquire the exclusive repository lock, blocking-refusing if already held
    pub fn lock(&self) -> Result<RepoLock> {
        let lock_path = self.lock_path();
        let file = File::create(&lock_path).with_path(&lock_path)?;

        let flock = Flock::lock(file, FlockArg::LockExclusiveNonblock)
            .map_err(|_| Error::LockContention)?;

        Ok(RepoLock { flock })
    }

    /// try to acquire the exclusive lock, returning `None` if already held
    pub fn try_lock(&self) -> Result<Option<RepoLock>> {
        let lock_path = self.lock_path();
        let file = File::create(&lock_path).with_path(&lock_path)?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(flock) => Ok(Some(RepoLock { flock })),
            Err((_, nix::errno::Errno::EWOULDBLOCK)) => Ok(None),
            Err(_) => Err(Error::LockContention),
        }
    }
}

/// guard that releases the repository lock when dropped
pub struct RepoLock {
    #[allow(dead_code)]
    flock: Flock<File>,
}

/// run `f` while holding the repository lock
pub fn with_lock<T, F>(repo: &Repo, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let _lock = repo.lock()?;
    f()
}
