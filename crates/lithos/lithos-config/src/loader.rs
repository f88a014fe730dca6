use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::ConfigError;

/// Reads `path` and deserializes it as TOML into `T`, following the same
/// read-then-`toml::from_str` shape as `ObsidianConfig::load`/`OnyxConfig::load`.
pub fn load_toml<T: DeserializeOwned>(path: impl AsRef<Path> + ToString) -> Result<T, ConfigError> {
    let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    let value: T = toml::from_str(&contents)?;
    Ok(value)
}

/// Loads every `*.toml` file directly under `dir` (non-recursive) as a `T`,
/// paired with the file stem used as its logical name.
pub fn load_toml_dir<T: DeserializeOwned>(dir: impl AsRef<Path>) -> Result<Vec<(String, T)>, ConfigError> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir).map_err(|source| ConfigError::ReadDir {
        path: dir.display().to_string(),
        source,
    })?;

    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ConfigError::ReadDir {
            path: dir.display().to_string(),
            source,
        })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("toml") {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let value: T = load_toml(path.to_string_lossy().to_string())?;
        out.push((name, value));
    }
    Ok(out)
}
