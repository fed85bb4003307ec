//! config operation: get/set/list the recognized repository configuration
//! keys (§3) — `core.quotePath`, `sod-config.snapshot.command`, and the
//! paired `sod-aux-store.<name>.{url,type}` entries (managed through
//! [`crate::aux`] rather than set directly, but readable here).

use crate::config::{KEY_QUOTE_PATH, KEY_SNAPSHOT_COMMAND};
use crate::error::{Error, Result};
use crate::repo::Repo;

fn is_recognized(key: &str) -> bool {
    key == KEY_QUOTE_PATH
        || key == KEY_SNAPSHOT_COMMAND
        || (key.starts_with("sod-aux-store.") && (key.ends_with(".url") || key.ends_with(".type")))
}

/// read a configuration value, failing with `UnknownConfigKey` for anything
/// outside the recognized key set (whether or not it happens to be set).
pub fn get(repo: &Repo, key: &str) -> Result<Option<String>> {
    if !is_recognized(key) {
        return Err(Error::UnknownConfigKey(key.to_string()));
    }
    Ok(repo.config().get(key).map(|s| s.to_string()))
}

/// set a configuration value, failing with `UnknownConfigKey` for anything
/// outside the recognized key set. Aux-store keys are not writable through
/// this path — use `aux::create`/`aux::delete` instead.
pub fn set(repo: &mut Repo, key: &str, value: &str) -> Result<()> {
    if key.starts_with("sod-aux-store.") {
        return Err(Error::UnknownConfigKey(key.to_string()));
    }
    if !is_recognized(key) {
        return Err(Error::UnknownConfigKey(key.to_string()));
    }
    repo.config_mut().set(key, value);
    repo.save_config()
}

/// list every currently-set key/value pair.
pub fn list(repo: &Repo) -> Vec<(String, String)> {
    repo.config()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let repo = Repo::init(&dir.path().join("repo")).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_get_recognized_key() {
        let (_dir, repo) = test_repo();
        assert_eq!(get(&repo, KEY_QUOTE_PATH).unwrap(), Some("false".to_string()));
    }

    #[test]
    fn test_get_unknown_key_fails() {
        let (_dir, repo) = test_repo();
        let result = get(&repo, "not.a.real.key");
        assert!(matches!(result, Err(Error::UnknownConfigKey(_))));
    }

    #[test]
    fn test_set_snapshot_command_persists() {
        let (_dir, mut repo) = test_repo();
        set(&mut repo, KEY_SNAPSHOT_COMMAND, "echo snap").unwrap();
        assert_eq!(get(&repo, KEY_SNAPSHOT_COMMAND).unwrap(), Some("echo snap".to_string()));
    }

    #[test]
    fn test_set_unknown_key_fails() {
        let (_dir, mut repo) = test_repo();
        let result = set(&mut repo, "not.a.real.key", "value");
        assert!(matches!(result, Err(Error::UnknownConfigKey(_))));
    }

    #[test]
    fn test_set_aux_store_key_rejected() {
        let (_dir, mut repo) = test_repo();
        let result = set(&mut repo, "sod-aux-store.backup.url", "/mnt/backup");
        assert!(matches!(result, Err(Error::UnknownConfigKey(_))));
    }

    #[test]
    fn test_list_includes_default_entries() {
        let (_dir, repo) = test_repo();
        let entries = list(&repo);
        assert!(entries.iter().any(|(k, v)| k == KEY_QUOTE_PATH && v == "false"));
    }
}
