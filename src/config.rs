use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{IoResultExt, Result};

/// `core.quotePath` — whether non-ASCII path bytes are escaped in output.
pub const KEY_QUOTE_PATH: &str = "core.quotePath";

/// `sod-config.snapshot.command` — shell command run after commits that
/// introduce new content.
pub const KEY_SNAPSHOT_COMMAND: &str = "sod-config.snapshot.command";

const AUX_STORE_PREFIX: &str = "sod-aux-store.";

/// repository configuration: a flat key-value string map, persisted as TOML.
///
/// the underlying object-database's config is treated as opaque; we never
/// rely on its section semantics beyond the keys this crate recognizes.
#[derive(Clone, Debug, Default)]
pub struct Config {
    values: BTreeMap<String, String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// load config from a TOML file; a missing file is an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path).with_path(path)?;
        let values: BTreeMap<String, String> = toml::from_str(&content)?;
        Ok(Self { values })
    }

    /// save config to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(&self.values)?;
        std::fs::write(path, content).with_path(path)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    /// iterate over all key-value pairs in sorted key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// auxiliary store URL for `name`, from `sod-aux-store.<name>.url`
    pub fn aux_store_url(&self, name: &str) -> Option<&str> {
        self.get(&format!("{AUX_STORE_PREFIX}{name}.url"))
    }

    /// auxiliary store type for `name`, from `sod-aux-store.<name>.type`
    pub fn aux_store_type(&self, name: &str) -> Option<&str> {
        self.get(&format!("{AUX_STORE_PREFIX}{name}.type"))
    }

    pub fn set_aux_store(&mut self, name: &str, url: impl Into<String>, store_type: impl Into<String>) {
        self.set(format!("{AUX_STORE_PREFIX}{name}.url"), url);
        self.set(format!("{AUX_STORE_PREFIX}{name}.type"), store_type);
    }

    pub fn remove_aux_store(&mut self, name: &str) {
        self.remove(&format!("{AUX_STORE_PREFIX}{name}.url"));
        self.remove(&format!("{AUX_STORE_PREFIX}{name}.type"));
    }

    /// names of all declared auxiliary stores, discovered by scanning keys
    /// matching `sod-aux-store.<name>.url`
    pub fn aux_store_names(&self) -> Vec<String> {
        let suffix = ".url";
        self.values
            .keys()
            .filter_map(|k| k.strip_prefix(AUX_STORE_PREFIX))
            .filter_map(|rest| rest.strip_suffix(suffix))
            .map(|s| s.to_string())
            .collect()
    }
}
