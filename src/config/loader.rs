use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::executor::{HttpConfig, DEFAULT_MAX_BODY_BYTES};

pub const CONFIG_FILE: &str = "apichain.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MaskingConfig {
    pub enabled: bool,
}

impl Default for MaskingConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PathsConfig {
    pub collections_dir: String,
    pub environments_dir: String,
    pub runs_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            collections_dir: "collections".to_string(),
            environments_dir: "env".to_string(),
            runs_dir: "runs".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RunsConfig {
    pub write_index: bool,
    pub max_body_bytes: usize,
}

impl Default for RunsConfig {
    fn default() -> Self {
        Self {
            write_index: true,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkspaceConfig {
    pub default_environment: String,
    pub masking: MaskingConfig,
    pub paths: PathsConfig,
    pub runs: RunsConfig,
    pub http: HttpConfig,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            default_environment: "dev".to_string(),
            masking: MaskingConfig::default(),
            paths: PathsConfig::default(),
            runs: RunsConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: WorkspaceConfig,
    pub path: PathBuf,
    pub dir: PathBuf,
}

/// Reads `apichain.json` from a directory, or the given file. A missing file
/// is not an error: the caller falls back to defaults.
pub fn load_config(target: &Path) -> Result<Option<LoadedConfig>> {
    let resolved = if target.is_absolute() {
        target.to_path_buf()
    } else {
        std::env::current_dir()
            .context("resolving current directory")?
            .join(target)
    };

    let (file_path, dir) = if resolved.is_dir() {
        (resolved.join(CONFIG_FILE), resolved)
    } else {
        let dir = resolved
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        (resolved, dir)
    };

    if !file_path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(&file_path)
        .with_context(|| format!("reading config {}", file_path.display()))?;

    let config: WorkspaceConfig = serde_json::from_str(&contents)
        .with_context(|| format!("parsing config {}", file_path.display()))?;

    Ok(Some(LoadedConfig {
        config,
        path: file_path,
        dir,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn returns_none_when_config_missing() -> Result<()> {
        let temp = tempdir()?;
        let result = load_config(temp.path())?;
        assert!(result.is_none());
        Ok(())
    }

    #[test]
    fn loads_config_from_directory() -> Result<()> {
        let temp = tempdir()?;
        let config_path = temp.path().join(CONFIG_FILE);
        std::fs::write(
            &config_path,
            r#"{"defaultEnvironment":"staging","masking":{"enabled":false},"paths":{"runsDir":"out"},"http":{"timeoutMs":1500}}"#,
        )?;

        let result = load_config(temp.path())?.expect("config should load");
        assert_eq!(result.path, config_path);
        assert_eq!(result.dir, temp.path());
        assert_eq!(result.config.default_environment, "staging");
        assert!(!result.config.masking.enabled);
        assert_eq!(result.config.paths.runs_dir, "out");
        assert_eq!(result.config.paths.collections_dir, "collections");
        assert_eq!(result.config.http.timeout_ms, 1500);
        assert_eq!(result.config.http.connect_timeout_ms, 5000);
        Ok(())
    }

    #[test]
    fn loads_config_from_explicit_file() -> Result<()> {
        let temp = tempdir()?;
        let config_path = temp.path().join("custom.json");
        std::fs::write(&config_path, r#"{"runs":{"writeIndex":false}}"#)?;

        let result = load_config(&config_path)?.expect("config should load");
        assert_eq!(result.dir, temp.path());
        assert!(!result.config.runs.write_index);
        assert_eq!(result.config.runs.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        Ok(())
    }

    #[test]
    fn empty_object_yields_defaults() {
        let config: WorkspaceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, WorkspaceConfig::default());
    }

    #[test]
    fn malformed_config_reports_its_path() -> Result<()> {
        let temp = tempdir()?;
        std::fs::write(temp.path().join(CONFIG_FILE), "{not json")?;
        let err = load_config(temp.path()).unwrap_err();
        assert!(format!("{err:#}").contains(CONFIG_FILE));
        Ok(())
    }
}
