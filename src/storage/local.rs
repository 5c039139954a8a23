//! Local filesystem storage implementation.
//!
//! Each entity collection lives in its own JSON file together with the next
//! local id to hand out. Writes go to a temp file first and are renamed into
//! place, so a crash never leaves a half-written collection behind.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! └── {collection}.json     # { "next_id": 4, "records": [...] }
//! ```

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::storage::{Record, Repository};

/// On-disk shape of one collection.
#[derive(Debug, Serialize, Deserialize)]
struct Table<T> {
    next_id: i64,
    records: Vec<T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            records: Vec::new(),
        }
    }
}

/// JSON-file storage backend for one entity type.
pub struct LocalRepository<T> {
    root_dir: PathBuf,
    /// Serializes read-modify-write cycles on the collection file.
    write_lock: Mutex<()>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> LocalRepository<T> {
    /// Create a new repository rooted at the given directory.
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        Self {
            root_dir: root_dir.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
            _record: PhantomData,
        }
    }

    /// Full path of the collection file.
    fn path(&self) -> PathBuf {
        self.root_dir.join(format!("{}.json", T::COLLECTION))
    }

    fn storage_error(e: impl std::fmt::Display) -> AppError {
        AppError::storage(T::COLLECTION, e)
    }
}

impl<T> LocalRepository<T>
where
    T: Record + Serialize + DeserializeOwned,
{
    /// Read the collection, treating a missing file as empty.
    async fn read_table(&self) -> Result<Table<T>> {
        match tokio::fs::read(self.path()).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(Self::storage_error),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Table::default()),
            Err(e) => Err(Self::storage_error(e)),
        }
    }

    /// Write the collection atomically (write to temp, then rename).
    async fn write_table(&self, table: &Table<T>) -> Result<()> {
        let path = self.path();
        tokio::fs::create_dir_all(&self.root_dir)
            .await
            .map_err(Self::storage_error)?;

        let bytes = serde_json::to_vec_pretty(table)?;
        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(Self::storage_error)?;
        file.write_all(&bytes).await.map_err(Self::storage_error)?;
        file.flush().await.map_err(Self::storage_error)?;
        drop(file);

        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(Self::storage_error)?;
        Ok(())
    }
}

#[async_trait]
impl<T> Repository<T> for LocalRepository<T>
where
    T: Record + Serialize + DeserializeOwned,
{
    async fn get_all(&self) -> Result<Vec<T>> {
        Ok(self.read_table().await?.records)
    }

    async fn save(&self, draft: T::Draft) -> Result<T> {
        let _guard = self.write_lock.lock().await;
        let mut table = self.read_table().await?;

        let record = T::from_draft(draft, table.next_id);
        let key = record.key();
        if table.records.iter().any(|r| r.key() == key) {
            return Err(Self::storage_error(format!("duplicate key {key:?}")));
        }

        table.next_id += 1;
        table.records.push(record.clone());
        self.write_table(&table).await?;

        log::debug!("Saved {} record {:?}", T::COLLECTION, key);
        Ok(record)
    }

    async fn delete(&self, key: &T::Key) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut table = self.read_table().await?;

        let before = table.records.len();
        table.records.retain(|r| &r.key() != key);
        if table.records.len() == before {
            return Ok(());
        }

        self.write_table(&table).await?;
        log::debug!("Deleted {} record {:?}", T::COLLECTION, key);
        Ok(())
    }
}
