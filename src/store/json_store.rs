use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{RunArtifact, RunResult};

use super::{
    mask::mask_run,
    naming::{artifact_stem, unique_path},
    ArtifactStore,
};

pub const INDEX_FILE: &str = "index.jsonl";

/// One line of `index.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub file: String,
    pub collection: String,
    pub env: String,
    pub started_at: DateTime<Utc>,
}

/// Writes each run to `<runs_dir>/<stamp>_<slug>.json`.
#[derive(Debug, Clone)]
pub struct JsonStore {
    runs_dir: PathBuf,
    masking: bool,
    write_index: bool,
}

impl JsonStore {
    pub fn new(runs_dir: impl Into<PathBuf>) -> Self {
        Self {
            runs_dir: runs_dir.into(),
            masking: true,
            write_index: true,
        }
    }

    pub fn with_masking(mut self, enabled: bool) -> Self {
        self.masking = enabled;
        self
    }

    pub fn with_index(mut self, enabled: bool) -> Self {
        self.write_index = enabled;
        self
    }

    pub fn runs_dir(&self) -> &Path {
        &self.runs_dir
    }

    pub fn read_index(&self) -> Result<Vec<IndexRecord>> {
        let path = self.runs_dir.join(INDEX_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path).map_err(|err| Error::io(&path, err))?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(Error::from))
            .collect()
    }

    fn append_index(&self, record: &IndexRecord) -> Result<()> {
        let path = self.runs_dir.join(INDEX_FILE);
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| Error::io(&path, err))?;
        file.write_all(&line).map_err(|err| Error::io(&path, err))
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes).map_err(|err| Error::io(&tmp, err))?;
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(Error::io(path, err));
    }
    Ok(())
}

impl ArtifactStore for JsonStore {
    fn save_run(&self, run: &RunResult) -> Result<String> {
        fs::create_dir_all(&self.runs_dir).map_err(|err| Error::io(&self.runs_dir, err))?;

        let name = if run.collection_name.trim().is_empty() {
            Path::new(&run.collection_path)
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or_default()
        } else {
            run.collection_name.as_str()
        };
        let (id, path) = unique_path(&self.runs_dir, &artifact_stem(run.started_at, name));

        let artifact = RunArtifact {
            id: id.clone(),
            run: if self.masking { mask_run(run) } else { run.clone() },
        };
        let bytes = serde_json::to_vec_pretty(&artifact)?;
        write_atomic(&path, &bytes)?;

        if self.write_index {
            let record = IndexRecord {
                id: id.clone(),
                file: path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                collection: run.collection_name.clone(),
                env: run.environment_name.clone(),
                started_at: run.started_at,
            };
            // The artifact is already durable; a stale index is tolerated.
            if let Err(err) = self.append_index(&record) {
                tracing::warn!(event = "run.index_failed", id = %id, error = %err);
            }
        }

        tracing::info!(event = "run.saved", id = %id, path = %path.display());
        Ok(id)
    }
}
