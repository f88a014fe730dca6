use serde::Deserialize;

/// One named store configuration consumed by `MasterRegistry::load_from`, one
/// TOML file per descriptor under the registry directory. Mirrors the fields of
/// the original `MasterInfo`/`MasterConfig` (`MasterManager.h`), minus the YAML
/// scanner: unknown or missing required fields are a hard `toml::de::Error`
/// rather than a silently-skipped entry.
#[derive(Debug, Clone, Deserialize)]
pub struct MasterDescriptor {
    /// Logical name consumers look the store up by.
    pub name: String,
    pub backend: BackendKind,
    pub max_record_count: usize,
    pub max_record_size: usize,
    #[serde(default = "defaults::bucket_count")]
    pub bucket_count: usize,
    pub primary_key_len: usize,
    #[serde(default)]
    pub secondary_key_len: usize,
    #[serde(default = "defaults::use_lock")]
    pub use_lock: bool,
    pub base_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    HashMaster,
    MemoryMaster,
}

impl MasterDescriptor {
    pub fn use_secondary_index(&self) -> bool {
        self.secondary_key_len > 0
    }
}

mod defaults {
    pub fn bucket_count() -> usize {
        1024
    }

    pub fn use_lock() -> bool {
        true
    }
}
