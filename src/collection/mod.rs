use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;
use crate::model::Collection;

mod loader;
mod schema;

pub use loader::{is_collection_file, FileCollectionLoader, DEFAULT_COLLECTIONS_DIR};
pub use schema::{AssertFile, CollectionFile, RequestFile, ScalarValue};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionRef {
    pub name: String,
    pub path: PathBuf,
}

/// Source of validated collections. Implementations must be usable from a
/// background run task.
pub trait CollectionLoader: Send + Sync {
    fn load_collection(&self, path: &Path) -> Result<Collection>;

    /// Collections below `root`, sorted by name.
    fn list_collections(&self, root: &Path) -> Result<Vec<CollectionRef>>;
}
