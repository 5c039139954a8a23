//! Storage abstractions for entity persistence.
//!
//! The diff engines only see the [`Repository`] trait; adapters are swappable:
//! - [`LocalRepository`]: one JSON file per entity collection
//! - [`MemoryRepository`]: process-local, for dry runs and tests
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── users.json
//! ├── subjects.json
//! ├── associations.json
//! └── announcements.json
//! ```

pub mod local;
pub mod memory;

use std::fmt::Debug;
use std::hash::Hash;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Announcement, Association, Subject, User};

// Re-export for convenience
pub use local::LocalRepository;
pub use memory::MemoryRepository;

/// An entity that can be persisted.
pub trait Record: Clone + Send + Sync + 'static {
    /// Collection name, used for file names and error context.
    const COLLECTION: &'static str;

    /// Identity key; storage never holds two records with the same key.
    type Key: Clone + Eq + Hash + Debug + Send + Sync;

    /// Unsaved form of the record.
    type Draft: Send + Sync + 'static;

    fn key(&self) -> Self::Key;

    /// Local id, for records that carry one.
    fn local_id(&self) -> Option<i64> {
        None
    }

    /// Build the stored record once storage has assigned a local id.
    fn from_draft(draft: Self::Draft, id: i64) -> Self;
}

/// Trait for entity storage backends.
#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    /// Load every stored record.
    async fn get_all(&self) -> Result<Vec<T>>;

    /// Persist a new record, returning it with its assigned local id.
    async fn save(&self, draft: T::Draft) -> Result<T>;

    /// Delete the record with the given identity. Deleting a missing key is not an error.
    async fn delete(&self, key: &T::Key) -> Result<()>;
}

/// The four persistence collaborators the engine writes through.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn Repository<User>>,
    pub subjects: Arc<dyn Repository<Subject>>,
    pub associations: Arc<dyn Repository<Association>>,
    pub announcements: Arc<dyn Repository<Announcement>>,
}

impl Repositories {
    /// JSON-file repositories rooted at `root_dir`.
    pub fn local(root_dir: impl AsRef<Path>) -> Self {
        let root = root_dir.as_ref();
        Self {
            users: Arc::new(LocalRepository::<User>::new(root)),
            subjects: Arc::new(LocalRepository::<Subject>::new(root)),
            associations: Arc::new(LocalRepository::<Association>::new(root)),
            announcements: Arc::new(LocalRepository::<Announcement>::new(root)),
        }
    }

    /// Empty in-memory repositories.
    pub fn memory() -> Self {
        Self {
            users: Arc::new(MemoryRepository::<User>::new()),
            subjects: Arc::new(MemoryRepository::<Subject>::new()),
            associations: Arc::new(MemoryRepository::<Association>::new()),
            announcements: Arc::new(MemoryRepository::<Announcement>::new()),
        }
    }
}
