use std::collections::BTreeMap;

use serde::Serialize;

use crate::{AssetError, AssetSource, normalize_name};

/// In-memory asset source used by tests and tooling that synthesises scenes.
#[derive(Debug, Clone, Default)]
pub struct MemoryPack {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryPack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, bytes: impl Into<Vec<u8>>) {
        self.entries.insert(normalize_name(name), bytes.into());
    }

    pub fn insert_json<T: Serialize>(&mut self, name: &str, value: &T) -> Result<(), AssetError> {
        let bytes = serde_json::to_vec(value).map_err(|source| AssetError::Encode {
            name: name.to_string(),
            source,
        })?;
        self.insert(name, bytes);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        self.entries.remove(&normalize_name(name))
    }
}

impl AssetSource for MemoryPack {
    fn read(&self, name: &str) -> Result<Vec<u8>, AssetError> {
        self.entries
            .get(&normalize_name(name))
            .cloned()
            .ok_or_else(|| AssetError::NotFound(name.to_string()))
    }

    fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&normalize_name(name))
    }
}
