use crate::error::Result;
use crate::model::RunResult;

mod json_store;
mod mask;
mod naming;

pub use json_store::{IndexRecord, JsonStore, INDEX_FILE};
pub use mask::{is_sensitive_header, is_sensitive_var, mask_run, MASK};
pub use naming::{artifact_stem, slugify, unique_path};

/// Durable sink for finished runs. Returns the id of the stored artifact.
pub trait ArtifactStore: Send + Sync {
    fn save_run(&self, run: &RunResult) -> Result<String>;
}
