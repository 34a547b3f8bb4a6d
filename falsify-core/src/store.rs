//! Example stores: remembering falsifying examples between runs.
//!
//! A store maps a [`TestIdentity`] to the [`StoredExample`] that last
//! falsified it. The falsifier replays that entry before generating anything
//! new, saves the minimal example after a failing run and clears the entry
//! once the test passes again. Store errors never change a run's outcome.

use crate::data::{Seed, Size};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Stable key of a test: its name and its parameter names in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestIdentity {
    pub name: String,
    pub parameters: Vec<String>,
}

impl TestIdentity {
    pub fn new(name: impl Into<String>, parameters: Vec<String>) -> Self {
        TestIdentity {
            name: name.into(),
            parameters,
        }
    }

    /// Human-readable key, e.g. `non_negative(x, y)`.
    pub fn key(&self) -> String {
        format!("{}({})", self.name, self.parameters.join(", "))
    }

    /// Hex SHA-256 digest of [`TestIdentity::key`].
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.key().as_bytes()))
    }
}

/// What is remembered about a falsifying example.
///
/// The seed and size regenerate the first failing example; following `path`
/// through its shrink candidates reaches the minimal one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredExample {
    pub test: String,
    pub seed: Seed,
    pub size: Size,
    pub path: Vec<usize>,
    /// Rendered arguments, for people reading the store.
    pub arguments: BTreeMap<String, String>,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed store entry: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Load, save and clear examples by test identity.
pub trait ExampleStore: Send + Sync {
    fn load(&self, identity: &TestIdentity) -> Result<Option<StoredExample>, StoreError>;

    fn save(&self, identity: &TestIdentity, example: &StoredExample) -> Result<(), StoreError>;

    fn clear(&self, identity: &TestIdentity) -> Result<(), StoreError>;
}

/// A store that lives as long as the process.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, StoredExample>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ExampleStore for InMemoryStore {
    fn load(&self, identity: &TestIdentity) -> Result<Option<StoredExample>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(&identity.key()).cloned())
    }

    fn save(&self, identity: &TestIdentity, example: &StoredExample) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(identity.key(), example.clone());
        Ok(())
    }

    fn clear(&self, identity: &TestIdentity) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(&identity.key());
        Ok(())
    }
}

/// A store keeping one JSON file per test in a directory.
///
/// Files are named by [`TestIdentity::digest`]. The directory is created on
/// the first save.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File holding the entry for `identity`.
    pub fn path_for(&self, identity: &TestIdentity) -> PathBuf {
        self.root.join(format!("{}.json", identity.digest()))
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl ExampleStore for DirectoryStore {
    fn load(&self, identity: &TestIdentity) -> Result<Option<StoredExample>, StoreError> {
        let path = self.path_for(identity);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(io_error(&path)(error)),
        };
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn save(&self, identity: &TestIdentity, example: &StoredExample) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).map_err(io_error(&self.root))?;
        let path = self.path_for(identity);
        let staging = path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(example)?;
        fs::write(&staging, contents).map_err(io_error(&staging))?;
        fs::rename(&staging, &path).map_err(io_error(&path))?;
        Ok(())
    }

    fn clear(&self, identity: &TestIdentity) -> Result<(), StoreError> {
        let path = self.path_for(identity);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(io_error(&path)(error)),
        }
    }
}
