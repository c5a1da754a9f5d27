use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{AssetError, AssetSource, normalize_name};

/// Directory-backed asset pack. Every regular file below the root is
/// indexed by its relative path, lower-cased.
#[derive(Debug)]
pub struct AssetPack {
    root: PathBuf,
    entries: BTreeMap<String, PathBuf>,
}

impl AssetPack {
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self, AssetError> {
        let root = dir.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(AssetError::NotADirectory(root));
        }

        let mut entries = BTreeMap::new();
        for entry in WalkDir::new(&root).follow_links(true) {
            let entry = entry.map_err(|err| AssetError::Io {
                path: err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.clone()),
                source: err
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&root) else {
                continue;
            };
            let key = normalize_name(&relative.to_string_lossy());
            entries.insert(key, entry.path().to_path_buf());
        }

        Ok(Self { root, entries })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl AssetSource for AssetPack {
    fn read(&self, name: &str) -> Result<Vec<u8>, AssetError> {
        let path = self
            .entries
            .get(&normalize_name(name))
            .ok_or_else(|| AssetError::NotFound(name.to_string()))?;
        fs::read(path).map_err(|source| AssetError::Io {
            path: path.clone(),
            source,
        })
    }

    fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&normalize_name(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lookups_ignore_case_and_nesting_separator() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("Scenes")).expect("mkdir");
        fs::write(dir.path().join("Scenes").join("Hall.BG"), b"{}").expect("write asset");

        let pack = AssetPack::load_from_dir(dir.path()).expect("index pack");
        assert_eq!(pack.len(), 1);
        assert!(pack.contains("scenes/hall.bg"));
        assert!(pack.contains("SCENES\\HALL.BG"));
        assert_eq!(pack.read("scenes/HALL.bg").expect("read"), b"{}");
    }

    #[test]
    fn missing_assets_report_not_found() {
        let dir = tempdir().expect("tempdir");
        let pack = AssetPack::load_from_dir(dir.path()).expect("index pack");
        let err = pack.read("nowhere.pal").expect_err("missing asset");
        assert!(matches!(err, AssetError::NotFound(ref name) if name == "nowhere.pal"));
    }

    #[test]
    fn rejects_plain_files_as_root() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("single.json");
        fs::write(&file, b"{}").expect("write");
        assert!(matches!(
            AssetPack::load_from_dir(&file),
            Err(AssetError::NotADirectory(_))
        ));
    }
}
