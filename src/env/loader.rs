use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::collection::ScalarValue;
use crate::error::{Error, Result};
use crate::model::{Environment, Vars};

pub const SECRETS_FILE: &str = "secrets.local.yaml";
const EXTENSIONS: [&str; 2] = ["yaml", "yml"];

pub trait EnvironmentLoader: Send + Sync {
    /// Accepts a bare environment name or a path to an environment file.
    fn load_environment(&self, name_or_path: &str) -> Result<Environment>;

    fn list_environments(&self) -> Result<Vec<String>>;
}

/// Reads `<env_dir>/<name>.yaml` and overlays `secrets.local.yaml` from the
/// same directory when present. Values are taken literally.
#[derive(Debug, Clone)]
pub struct YamlEnvironmentLoader {
    env_dir: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct EnvironmentFile {
    vars: BTreeMap<String, ScalarValue>,
}

fn has_env_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl YamlEnvironmentLoader {
    pub fn new(env_dir: impl Into<PathBuf>) -> Self {
        Self {
            env_dir: env_dir.into(),
        }
    }

    pub fn env_dir(&self) -> &Path {
        &self.env_dir
    }

    fn locate(&self, name_or_path: &str) -> (String, PathBuf) {
        let candidate = Path::new(name_or_path);
        if candidate.components().count() > 1 || has_env_extension(candidate) {
            let name = candidate
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or(name_or_path)
                .to_string();
            return (name, candidate.to_path_buf());
        }

        let yml = self.env_dir.join(format!("{name_or_path}.yml"));
        let path = if yml.is_file() {
            yml
        } else {
            self.env_dir.join(format!("{name_or_path}.yaml"))
        };
        (name_or_path.to_string(), path)
    }
}

impl EnvironmentLoader for YamlEnvironmentLoader {
    fn load_environment(&self, name_or_path: &str) -> Result<Environment> {
        let name_or_path = name_or_path.trim();
        if name_or_path.is_empty() {
            return Err(Error::invalid("environment name is required"));
        }

        let (name, path) = self.locate(name_or_path);
        let mut vars = read_env_file(&path)?;

        let secrets_dir = path.parent().unwrap_or(&self.env_dir);
        let secrets = secrets_dir.join(SECRETS_FILE);
        if secrets != path && secrets.is_file() {
            vars.extend(read_env_file(&secrets)?);
        }

        tracing::debug!(
            event = "environment.loaded",
            environment = %name,
            path = %path.display(),
            vars = vars.len()
        );
        Ok(Environment { name, vars })
    }

    fn list_environments(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.env_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(Error::io(&self.env_dir, err)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry.map_err(|err| Error::io(&self.env_dir, err))?.path();
            if !path.is_file()
                || !has_env_extension(&path)
                || path.file_name().and_then(|n| n.to_str()) == Some(SECRETS_FILE)
            {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }
}

/// Parses a `vars:` mapping. An empty file yields no variables.
pub fn read_env_file(path: &Path) -> Result<Vars> {
    let content = fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => Error::NotFound {
            path: path.to_path_buf(),
            source,
        },
        _ => Error::io(path, source),
    })?;
    if content.trim().is_empty() {
        return Ok(Vars::new());
    }

    let file: EnvironmentFile = serde_yaml::from_str(&content)
        .map_err(|err| Error::invalid(format!("parsing environment {}: {err}", path.display())))?;
    Ok(file
        .vars
        .into_iter()
        .map(|(key, value)| (key, value.into_text()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn loads_named_environment_with_secret_overlay() -> anyhow::Result<()> {
        let temp = tempdir()?;
        fs::write(
            temp.path().join("dev.yaml"),
            "vars:\n  base_url: http://localhost\n  password: placeholder\n  port: 8080\n",
        )?;
        fs::write(temp.path().join(SECRETS_FILE), "vars:\n  password: hunter2\n")?;

        let env = YamlEnvironmentLoader::new(temp.path()).load_environment("dev")?;

        assert_eq!(env.name, "dev");
        assert_eq!(env.vars["base_url"], "http://localhost");
        assert_eq!(env.vars["password"], "hunter2");
        assert_eq!(env.vars["port"], "8080");
        Ok(())
    }

    #[test]
    fn dollar_signs_in_values_are_kept_verbatim() -> anyhow::Result<()> {
        std::env::set_var("APICHAIN_LOADER_HOME", "/leaked");
        let temp = tempdir()?;
        fs::write(
            temp.path().join("dev.yaml"),
            "vars:\n  key: ab$$cd\n  q: \"x${APICHAIN_LOADER_HOME}y\"\n",
        )?;
        fs::write(
            temp.path().join(SECRETS_FILE),
            "vars:\n  password: pa$APICHAIN_LOADER_HOMEss\n",
        )?;

        let env = YamlEnvironmentLoader::new(temp.path()).load_environment("dev")?;

        assert_eq!(env.vars["key"], "ab$$cd");
        assert_eq!(env.vars["q"], "x${APICHAIN_LOADER_HOME}y");
        assert_eq!(env.vars["password"], "pa$APICHAIN_LOADER_HOMEss");
        assert!(!env.vars.contains_key("APICHAIN_LOADER_HOME"));
        Ok(())
    }

    #[test]
    fn loads_explicit_paths() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let path = temp.path().join("staging.yml");
        fs::write(&path, "vars:\n  host: staging\n")?;

        let loader = YamlEnvironmentLoader::new(temp.path().join("unused"));
        let env = loader.load_environment(path.to_str().unwrap_or_default())?;

        assert_eq!(env.name, "staging");
        assert_eq!(env.vars["host"], "staging");
        Ok(())
    }

    #[test]
    fn missing_environment_is_not_found() {
        let temp = tempdir().unwrap();
        let err = YamlEnvironmentLoader::new(temp.path())
            .load_environment("prod")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn malformed_environment_is_invalid_config() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("bad.yaml"), "vars: [not, a, map]\n").unwrap();
        let err = YamlEnvironmentLoader::new(temp.path())
            .load_environment("bad")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn listing_skips_secrets_and_other_files() -> anyhow::Result<()> {
        let temp = tempdir()?;
        for file in ["prod.yaml", "dev.yml", SECRETS_FILE, "notes.txt"] {
            fs::write(temp.path().join(file), "vars: {}\n")?;
        }

        let names = YamlEnvironmentLoader::new(temp.path()).list_environments()?;

        assert_eq!(names, vec!["dev".to_string(), "prod".to_string()]);
        Ok(())
    }

    #[test]
    fn listing_a_missing_directory_is_empty() {
        let temp = tempdir().unwrap();
        let loader = YamlEnvironmentLoader::new(temp.path().join("env"));
        assert!(loader.list_environments().unwrap().is_empty());
    }
}
