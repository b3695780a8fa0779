use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("unable to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed data under key {key}: {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Storage is a flat key-value store holding one serialized blob per key.
///
/// Every read returns the whole blob and every write replaces it, there are no
/// partial updates and no locking.
pub trait Storage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// load_all reads a JSON array stored under key, treating a missing key as empty
pub fn load_all<T: DeserializeOwned>(
    storage: &dyn Storage,
    key: &str,
) -> Result<Vec<T>, StorageError> {
    match storage.get(key)? {
        Some(raw) => serde_json::from_str(&raw).map_err(|source| StorageError::Malformed {
            key: key.to_string(),
            source,
        }),
        None => Ok(Vec::new()),
    }
}

/// save_all overwrites key with the JSON array of items
pub fn save_all<T: Serialize>(
    storage: &dyn Storage,
    key: &str,
    items: &[T],
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(items).map_err(|source| StorageError::Malformed {
        key: key.to_string(),
        source,
    })?;
    storage.put(key, &raw)
}

pub struct MemoryStorage {
    data: RefCell<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> MemoryStorage {
        MemoryStorage {
            data: RefCell::new(HashMap::new()),
        }
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.data.borrow().get(key).cloned())
    }
    fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.data
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// FileStorage keeps each key as `<key>.json` inside a directory
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<FileStorage, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;
        debug!(dir = %dir.display(), "Opened file storage");
        Ok(FileStorage { dir })
    }
    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
    fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        fs::write(&path, value).map_err(|source| StorageError::Io { path, source })
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;

    #[test]
    fn test_memory_get_missing() -> Result<()> {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("nope")?, None);
        Ok(())
    }

    #[test]
    fn test_memory_put_overwrites() -> Result<()> {
        let storage = MemoryStorage::new();
        storage.put("k", "one")?;
        storage.put("k", "two")?;
        assert_eq!(storage.get("k")?, Some("two".to_string()));
        Ok(())
    }

    #[test]
    fn test_load_all_missing_key_is_empty() -> Result<()> {
        let storage = MemoryStorage::new();
        let items: Vec<u32> = load_all(&storage, "numbers")?;
        assert!(items.is_empty());
        Ok(())
    }

    #[test]
    fn test_save_then_load_all() -> Result<()> {
        let storage = MemoryStorage::new();
        save_all(&storage, "numbers", &[3u32, 1, 2])?;
        assert_eq!(storage.get("numbers")?, Some("[3,1,2]".to_string()));
        let items: Vec<u32> = load_all(&storage, "numbers")?;
        assert_eq!(items, vec![3, 1, 2]);
        Ok(())
    }

    #[test]
    fn test_load_all_malformed() -> Result<()> {
        let storage = MemoryStorage::new();
        storage.put("numbers", "{not json")?;
        let res: Result<Vec<u32>, StorageError> = load_all(&storage, "numbers");
        match res {
            Err(StorageError::Malformed { key, .. }) => assert_eq!(key, "numbers"),
            other => panic!("expected malformed error, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_file_storage_survives_reopen() -> Result<()> {
        let dir = tempfile::tempdir()?;
        {
            let storage = FileStorage::open(dir.path())?;
            assert_eq!(storage.get("atm_accounts")?, None);
            storage.put("atm_accounts", "[]")?;
        }
        let storage = FileStorage::open(dir.path())?;
        assert_eq!(storage.get("atm_accounts")?, Some("[]".to_string()));
        assert!(dir.path().join("atm_accounts.json").exists());
        Ok(())
    }

    #[test]
    fn test_file_storage_creates_dir() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let nested = dir.path().join("a").join("b");
        let storage = FileStorage::open(&nested)?;
        assert!(nested.is_dir());
        storage.put("k", "v")?;
        assert!(nested.join("k.json").is_file());
        Ok(())
    }
}
