//! In-process storage implementation.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{AppError, Result};
use crate::storage::{Record, Repository};

struct Inner<T> {
    next_id: i64,
    records: Vec<T>,
}

/// Storage backend that keeps records in memory.
pub struct MemoryRepository<T> {
    inner: Mutex<Inner<T>>,
}

impl<T: Record> MemoryRepository<T> {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Start from existing records; new ids continue after the largest one.
    pub fn with_records(records: Vec<T>) -> Self {
        let next_id = records
            .iter()
            .filter_map(Record::local_id)
            .max()
            .unwrap_or(0)
            + 1;
        Self {
            inner: Mutex::new(Inner { next_id, records }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Record> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Record> Repository<T> for MemoryRepository<T> {
    async fn get_all(&self) -> Result<Vec<T>> {
        Ok(self.inner.lock().records.clone())
    }

    async fn save(&self, draft: T::Draft) -> Result<T> {
        let mut inner = self.inner.lock();
        let record = T::from_draft(draft, inner.next_id);
        let key = record.key();
        if inner.records.iter().any(|r| r.key() == key) {
            return Err(AppError::storage(
                T::COLLECTION,
                format!("duplicate key {key:?}"),
            ));
        }
        inner.next_id += 1;
        inner.records.push(record.clone());
        Ok(record)
    }

    async fn delete(&self, key: &T::Key) -> Result<()> {
        self.inner.lock().records.retain(|r| &r.key() != key);
        Ok(())
    }
}
