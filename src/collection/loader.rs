use std::{
    fs, io,
    path::{Path, PathBuf},
};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::model::Collection;

use super::{schema::CollectionFile, CollectionLoader, CollectionRef};

const EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

pub const DEFAULT_COLLECTIONS_DIR: &str = "collections";

/// Loads collections from `.yaml`/`.yml`/`.json` files. Listing walks
/// `<root>/<collections_dir>`; an absolute `collections_dir` ignores the root.
#[derive(Debug, Clone)]
pub struct FileCollectionLoader {
    collections_dir: PathBuf,
}

impl Default for FileCollectionLoader {
    fn default() -> Self {
        Self::new(DEFAULT_COLLECTIONS_DIR)
    }
}

impl FileCollectionLoader {
    pub fn new(collections_dir: impl Into<PathBuf>) -> Self {
        Self {
            collections_dir: collections_dir.into(),
        }
    }

    pub fn collections_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.collections_dir)
    }
}

pub fn is_collection_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn parse_file(path: &Path) -> Result<CollectionFile> {
    let content = fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => Error::NotFound {
            path: path.to_path_buf(),
            source,
        },
        _ => Error::io(path, source),
    })?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        serde_json::from_str(&content)
            .map_err(|err| Error::invalid(format!("parsing {}: {err}", path.display())))
    } else {
        serde_yaml::from_str(&content)
            .map_err(|err| Error::invalid(format!("parsing {}: {err}", path.display())))
    }
}

impl CollectionLoader for FileCollectionLoader {
    fn load_collection(&self, path: &Path) -> Result<Collection> {
        let collection = parse_file(path)?.into_collection()?;
        tracing::debug!(
            event = "collection.loaded",
            collection = %collection.name,
            path = %path.display(),
            requests = collection.requests.len()
        );
        Ok(collection)
    }

    fn list_collections(&self, root: &Path) -> Result<Vec<CollectionRef>> {
        let dir = self.collections_dir(root);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut refs = Vec::new();
        for entry in WalkDir::new(&dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() || !is_collection_file(path) {
                continue;
            }

            let stem = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or_default()
                .to_string();
            // Unparseable files are still listed so they surface when run.
            let name = match parse_file(path) {
                Ok(file) if !file.name.trim().is_empty() => file.name.trim().to_string(),
                Ok(_) => stem,
                Err(err) => {
                    tracing::warn!(
                        event = "collection.unreadable",
                        path = %path.display(),
                        error = %err
                    );
                    stem
                }
            };
            refs.push(CollectionRef {
                name,
                path: path.to_path_buf(),
            });
        }

        refs.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
        Ok(refs)
    }
}
