use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Result};

use crate::collection::{is_collection_file, CollectionLoader, CollectionRef, FileCollectionLoader};
use crate::env::{EnvironmentLoader, YamlEnvironmentLoader};
use crate::executor::{build_client, HttpRunner};
use crate::runner::{RunCollection, ValidateCollection};
use crate::store::JsonStore;

use super::loader::{load_config, WorkspaceConfig, CONFIG_FILE};

/// A workspace root together with its configuration. Builds the collaborators
/// a run needs.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    config: WorkspaceConfig,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, config: WorkspaceConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    /// Loads `apichain.json` from `root` when present; defaults otherwise.
    pub fn open(root: &Path) -> Result<Self> {
        match load_config(root)? {
            Some(loaded) => Ok(Self::new(loaded.dir, loaded.config)),
            None => Ok(Self::new(root, WorkspaceConfig::default())),
        }
    }

    /// Walks up from `start` (a file starts at its directory) to the nearest
    /// directory holding `apichain.json`.
    pub fn discover(start: &Path) -> Result<Self> {
        let start = if start.is_absolute() {
            start.to_path_buf()
        } else {
            std::env::current_dir()?.join(start)
        };
        let first = if start.is_file() {
            start.parent()
        } else {
            Some(start.as_path())
        };

        for dir in first.into_iter().flat_map(Path::ancestors) {
            if dir.join(CONFIG_FILE).is_file() {
                tracing::debug!(event = "workspace.discovered", root = %dir.display());
                return Self::open(dir);
            }
        }
        bail!(
            "workspace not found from {} (no {CONFIG_FILE} in any parent; tip: run `apichain init`)",
            start.display()
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn collections_dir(&self) -> PathBuf {
        self.root.join(&self.config.paths.collections_dir)
    }

    pub fn environments_dir(&self) -> PathBuf {
        self.root.join(&self.config.paths.environments_dir)
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.root.join(&self.config.paths.runs_dir)
    }

    pub fn collection_loader(&self) -> FileCollectionLoader {
        FileCollectionLoader::new(&self.config.paths.collections_dir)
    }

    pub fn environment_loader(&self) -> YamlEnvironmentLoader {
        YamlEnvironmentLoader::new(self.environments_dir())
    }

    pub fn store(&self) -> JsonStore {
        JsonStore::new(self.runs_dir())
            .with_masking(self.config.masking.enabled)
            .with_index(self.config.runs.write_index)
    }

    pub fn http_runner(&self) -> Result<HttpRunner> {
        let client = build_client(&self.config.http)?;
        Ok(HttpRunner::new(client).with_max_body_bytes(self.config.runs.max_body_bytes))
    }

    /// Wires a [`RunCollection`] for this workspace; `persist` attaches the
    /// JSON store.
    pub fn run_collection(&self, persist: bool) -> Result<RunCollection> {
        let uc = RunCollection::new(
            Arc::new(self.collection_loader()),
            Arc::new(self.environment_loader()),
            Arc::new(self.http_runner()?),
        );
        Ok(if persist {
            uc.with_store(Arc::new(self.store()))
        } else {
            uc
        })
    }

    pub fn validate_collection(&self) -> ValidateCollection {
        ValidateCollection::new(
            Arc::new(self.collection_loader()),
            Arc::new(self.environment_loader()),
        )
    }

    pub fn list_collections(&self) -> Result<Vec<CollectionRef>> {
        Ok(self.collection_loader().list_collections(&self.root)?)
    }

    pub fn list_environments(&self) -> Result<Vec<String>> {
        Ok(self.environment_loader().list_environments()?)
    }

    /// Resolves a collection argument: an existing file path (absolute or
    /// relative to the workspace), or the name or file stem of a listed
    /// collection.
    pub fn find_collection(&self, name_or_path: &str) -> Result<PathBuf> {
        let candidate = Path::new(name_or_path);
        for path in [candidate.to_path_buf(), self.root.join(candidate)] {
            if path.is_file() && is_collection_file(&path) {
                return Ok(path);
            }
        }

        let refs = self.list_collections()?;
        let found = refs.iter().find(|r| r.name == name_or_path).or_else(|| {
            refs.iter().find(|r| {
                r.path.file_stem().and_then(|stem| stem.to_str()) == Some(name_or_path)
            })
        });
        match found {
            Some(r) => Ok(r.path.clone()),
            None => bail!("collection not found: {name_or_path}"),
        }
    }
}
