use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use lithos_config::MasterDescriptor;

use crate::error::MasterError;
use crate::master::{Master, MasterConfig};

/// Loads a directory of [`MasterDescriptor`] TOML files and lazily opens/caches
/// the [`Master`] each one describes, keyed by its logical name. Mirrors
/// `MasterManager`'s `loadMasterConfigs`/`getMaster` shape, minus the in-memory
/// backend (`BackendKind::MemoryMaster` is accepted in descriptors but not yet
/// backed by a distinct implementation: it opens the same file-backed `Master`
/// as `HashMaster`, since both need durability across restarts in this system).
pub struct MasterRegistry {
    descriptors: HashMap<String, MasterDescriptor>,
    open: Mutex<HashMap<String, Arc<Master>>>,
}

impl MasterRegistry {
    pub fn load_from(dir: impl AsRef<Path>) -> Result<Self, MasterError> {
        let loaded: Vec<(String, MasterDescriptor)> = lithos_config::load_toml_dir(dir)?;
        let mut descriptors = HashMap::with_capacity(loaded.len());
        for (_, descriptor) in loaded {
            if descriptors.contains_key(&descriptor.name) {
                return Err(MasterError::DuplicateMasterName(descriptor.name));
            }
            descriptors.insert(descriptor.name.clone(), descriptor);
        }
        Ok(Self { descriptors, open: Mutex::new(HashMap::new()) })
    }

    pub fn names(&self) -> Vec<String> {
        self.descriptors.keys().cloned().collect()
    }

    pub fn has_master(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    /// Returns the live handle for `name`, opening it on first use.
    pub fn open(&self, name: &str) -> Result<Arc<Master>, MasterError> {
        if let Some(existing) = self.open.lock().get(name) {
            return Ok(existing.clone());
        }
        let descriptor = self.descriptors.get(name).ok_or_else(|| MasterError::UnknownMaster(name.to_string()))?;
        let _ = descriptor.backend; // both BackendKind variants share one implementation today

        let master = Arc::new(Master::open(MasterConfig {
            base_path: PathBuf::from(&descriptor.base_path),
            max_record_count: descriptor.max_record_count,
            max_record_size: descriptor.max_record_size,
            bucket_count: descriptor.bucket_count,
            primary_key_len: descriptor.primary_key_len,
            secondary_key_len: descriptor.secondary_key_len,
            use_lock: descriptor.use_lock,
        })?);

        self.open.lock().insert(name.to_string(), master.clone());
        Ok(master)
    }

    pub fn close(&self, name: &str) {
        self.open.lock().remove(name);
    }

    pub fn close_all(&self) {
        self.open.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_from_opens_named_master() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("stores").join("quotes");
        std::fs::write(
            dir.path().join("quotes.toml"),
            format!(
                "name = \"quotes\"\nbackend = \"hash_master\"\nmax_record_count = 8\nmax_record_size = 32\nprimary_key_len = 8\nbase_path = \"{}\"\n",
                base.display()
            ),
        )
        .unwrap();

        let registry = MasterRegistry::load_from(dir.path()).unwrap();
        assert!(registry.has_master("quotes"));
        assert!(!registry.has_master("missing"));

        let master = registry.open("quotes").unwrap();
        master.put(b"AAAAAAAA", None, b"v").unwrap();
        assert!(master.get_by_primary(b"AAAAAAAA").is_ok());

        let same = registry.open("quotes").unwrap();
        assert!(Arc::ptr_eq(&master, &same));
    }

    #[test]
    fn duplicate_names_fail_load() {
        let dir = tempfile::tempdir().unwrap();
        for file in ["a.toml", "b.toml"] {
            std::fs::write(
                dir.path().join(file),
                format!(
                    "name = \"dup\"\nbackend = \"hash_master\"\nmax_record_count = 8\nmax_record_size = 32\nprimary_key_len = 8\nbase_path = \"{}\"\n",
                    dir.path().join(file).display()
                ),
            )
            .unwrap();
        }
        assert!(matches!(MasterRegistry::load_from(dir.path()), Err(MasterError::DuplicateMasterName(_))));
    }
}
