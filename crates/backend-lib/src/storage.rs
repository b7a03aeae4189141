// ============================
// backend-lib/src/storage.rs
// ============================
//! Storage abstraction with flat-file implementation.
//!
//! Each collection is one JSON array on disk. Writes replace the whole
//! file; across processes the last writer wins.
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::{
    fs as tokio_fs,
    sync::{Mutex, OwnedMutexGuard},
};

use crate::error::AppError;

/// The JSON files the backend owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Registrations,
    Contacts,
    Users,
    Sessions,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Registrations,
        Collection::Contacts,
        Collection::Users,
        Collection::Sessions,
    ];

    /// File name inside the data directory
    pub fn file_name(self) -> &'static str {
        match self {
            Collection::Registrations => "registrations.json",
            Collection::Contacts => "contacts.json",
            Collection::Users => "users.json",
            Collection::Sessions => "sessions.json",
        }
    }

    fn index(self) -> usize {
        match self {
            Collection::Registrations => 0,
            Collection::Contacts => 1,
            Collection::Users => 2,
            Collection::Sessions => 3,
        }
    }
}

/// Trait for storage backends
#[async_trait]
pub trait Storage: Send + Sync {
    /// Directory holding the collections
    fn root(&self) -> &Path;

    /// Read a whole collection. A missing file reads as empty.
    async fn read_collection(&self, collection: Collection) -> Result<Vec<Value>, AppError>;

    /// Replace a whole collection
    async fn write_collection(
        &self,
        collection: Collection,
        items: &[Value],
    ) -> Result<(), AppError>;

    /// Serialize read-modify-write sequences on one collection
    async fn lock(&self, collection: Collection) -> OwnedMutexGuard<()>;
}

/// Flat-file implementation of the Storage trait
#[derive(Clone)]
pub struct FlatFileStorage {
    root: PathBuf,
    locks: Arc<[Arc<Mutex<()>>; 4]>,
}

impl FlatFileStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let locks = Arc::new([
            Arc::new(Mutex::new(())),
            Arc::new(Mutex::new(())),
            Arc::new(Mutex::new(())),
            Arc::new(Mutex::new(())),
        ]);
        Ok(Self { root, locks })
    }

    /// Full path of a collection file
    pub fn path_of(&self, collection: Collection) -> PathBuf {
        self.root.join(collection.file_name())
    }
}

#[async_trait]
impl Storage for FlatFileStorage {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn read_collection(&self, collection: Collection) -> Result<Vec<Value>, AppError> {
        let path = self.path_of(collection);
        let content = match tokio_fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Value>(&content)? {
            Value::Array(items) => Ok(items),
            _ => Err(AppError::Internal(format!(
                "{} does not hold a JSON array",
                collection.file_name()
            ))),
        }
    }

    /// Write to a sibling temp file, then rename over the target.
    async fn write_collection(
        &self,
        collection: Collection,
        items: &[Value],
    ) -> Result<(), AppError> {
        let path = self.path_of(collection);
        let tmp = path.with_extension("json.tmp");

        tokio_fs::create_dir_all(&self.root).await?;
        let json = serde_json::to_string_pretty(items)?;
        tokio_fs::write(&tmp, json).await?;
        tokio_fs::rename(&tmp, &path).await?;

        Ok(())
    }

    async fn lock(&self, collection: Collection) -> OwnedMutexGuard<()> {
        self.locks[collection.index()].clone().lock_owned().await
    }
}

/// Read a collection into typed items
pub async fn load<T, S>(storage: &S, collection: Collection) -> Result<Vec<T>, AppError>
where
    T: DeserializeOwned,
    S: Storage + ?Sized,
{
    storage
        .read_collection(collection)
        .await?
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(AppError::from))
        .collect()
}

/// Replace a collection with typed items
pub async fn save<T, S>(storage: &S, collection: Collection, items: &[T]) -> Result<(), AppError>
where
    T: Serialize + Sync,
    S: Storage + ?Sized,
{
    let values = items
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    storage.write_collection(collection, &values).await
}
