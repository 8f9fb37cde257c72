use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::env::SECRETS_FILE;
use crate::logging::LOG_DIR;

use super::loader::{WorkspaceConfig, CONFIG_FILE};

const GITIGNORE: &str = ".gitignore";
const GITIGNORE_HEADER: &str = "# apichain";

const SAMPLE_COLLECTION: &str = r#"name: Demo
vars:
  user: demo
requests:
  - name: echo
    method: GET
    url: "{{base_url}}/get?user={{user}}"
    headers:
      Accept: application/json
    assert:
      status: 200
      max_ms: 2000
      jsonpath:
        "$.url": { exists: true }
    extract:
      echo.url: "$.url"
  - name: post
    method: POST
    url: "{{base_url}}/post"
    headers:
      Authorization: "Bearer {{api_token}}"
    json:
      source: "{{echo.url}}"
      sent_at: "{{$timestamp}}"
    assert:
      status: 200
"#;

const SAMPLE_ENV: &str = "vars:\n  base_url: https://httpbin.org\n";

const SAMPLE_SECRETS: &str = "# Local overrides, never committed.\nvars:\n  api_token: change-me\n";

/// What [`init_workspace`] did, relative paths under the root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub gitignore_updated: bool,
}

/// Scaffolds a workspace at `root`: standard directories, a config file,
/// a sample collection and environment, and `.gitignore` entries for
/// generated and secret files. Existing files are kept unless `force`.
pub fn init_workspace(root: &Path, force: bool) -> Result<InitReport> {
    let config = WorkspaceConfig::default();
    let env_dir = PathBuf::from(&config.paths.environments_dir);

    for dir in [
        PathBuf::from(&config.paths.collections_dir),
        env_dir.clone(),
        PathBuf::from(&config.paths.runs_dir),
        PathBuf::from(LOG_DIR),
    ] {
        let path = root.join(dir);
        fs::create_dir_all(&path)
            .with_context(|| format!("creating directory {}", path.display()))?;
    }

    let mut report = InitReport {
        gitignore_updated: ensure_gitignore(root, &gitignore_entries(&config))?,
        ..InitReport::default()
    };

    let config_json =
        serde_json::to_string_pretty(&config).context("serializing default config")? + "\n";
    let templates = [
        (PathBuf::from(CONFIG_FILE), config_json.as_str()),
        (
            Path::new(&config.paths.collections_dir).join("demo.yaml"),
            SAMPLE_COLLECTION,
        ),
        (env_dir.join("dev.yaml"), SAMPLE_ENV),
        (env_dir.join(SECRETS_FILE), SAMPLE_SECRETS),
    ];

    for (rel, contents) in templates {
        let path = root.join(&rel);
        if !force && path.exists() {
            report.skipped.push(rel);
            continue;
        }
        fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;
        if rel.ends_with(SECRETS_FILE) {
            restrict_permissions(&path)?;
        }
        report.written.push(rel);
    }

    tracing::info!(
        event = "workspace.initialized",
        root = %root.display(),
        written = report.written.len(),
        skipped = report.skipped.len()
    );
    Ok(report)
}

fn gitignore_entries(config: &WorkspaceConfig) -> Vec<String> {
    let first_segment = LOG_DIR.split('/').next().unwrap_or(LOG_DIR);
    vec![
        format!("{}/", config.paths.runs_dir),
        format!("{first_segment}/"),
        format!("{}/{SECRETS_FILE}", config.paths.environments_dir),
    ]
}

/// Appends whichever entries are missing, under a header. Returns whether the
/// file changed.
fn ensure_gitignore(root: &Path, entries: &[String]) -> Result<bool> {
    let path = root.join(GITIGNORE);
    let existing = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(err) => {
            return Err(err).with_context(|| format!("reading {}", path.display()));
        }
    };

    let present: Vec<&str> = existing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let missing: Vec<&String> = entries
        .iter()
        .filter(|entry| !present.contains(&entry.as_str()))
        .collect();
    if missing.is_empty() {
        return Ok(false);
    }

    let mut out = existing.clone();
    if !out.is_empty() {
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
    }
    if !present.contains(&GITIGNORE_HEADER) {
        out.push_str(GITIGNORE_HEADER);
        out.push('\n');
    }
    for entry in missing {
        out.push_str(entry);
        out.push('\n');
    }

    fs::write(&path, out).with_context(|| format!("writing {}", path.display()))?;
    Ok(true)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("restricting permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Workspace;
    use crate::env::EnvironmentLoader;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn scaffolds_a_usable_workspace() -> Result<()> {
        let temp = tempdir()?;
        let report = init_workspace(temp.path(), false)?;

        assert!(report.skipped.is_empty());
        assert!(report.gitignore_updated);
        for dir in ["collections", "env", "runs", ".apichain/logs"] {
            assert!(temp.path().join(dir).is_dir(), "{dir} missing");
        }

        let workspace = Workspace::open(temp.path())?;
        let names: Vec<_> = workspace
            .list_collections()?
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["Demo".to_string()]);
        assert_eq!(workspace.list_environments()?, vec!["dev".to_string()]);

        let dev = workspace.environment_loader().load_environment("dev")?;
        assert_eq!(dev.vars["api_token"], "change-me");
        Ok(())
    }

    #[test]
    fn existing_files_are_kept_unless_forced() -> Result<()> {
        let temp = tempdir()?;
        fs::create_dir_all(temp.path().join("env"))?;
        fs::write(temp.path().join("env/dev.yaml"), "vars:\n  base_url: http://mine\n")?;

        let report = init_workspace(temp.path(), false)?;
        assert_eq!(report.skipped, vec![PathBuf::from("env/dev.yaml")]);
        assert_eq!(
            fs::read_to_string(temp.path().join("env/dev.yaml"))?,
            "vars:\n  base_url: http://mine\n"
        );

        let report = init_workspace(temp.path(), true)?;
        assert!(report.skipped.is_empty());
        assert_eq!(fs::read_to_string(temp.path().join("env/dev.yaml"))?, SAMPLE_ENV);
        Ok(())
    }

    #[test]
    fn gitignore_is_created_with_header_and_entries() -> Result<()> {
        let temp = tempdir()?;
        init_workspace(temp.path(), false)?;

        let gitignore = fs::read_to_string(temp.path().join(GITIGNORE))?;
        assert_eq!(
            gitignore,
            "# apichain\nruns/\n.apichain/\nenv/secrets.local.yaml\n"
        );
        Ok(())
    }

    #[test]
    fn gitignore_only_gains_missing_entries() -> Result<()> {
        let temp = tempdir()?;
        fs::write(temp.path().join(GITIGNORE), "target\nruns/")?;

        init_workspace(temp.path(), false)?;
        let gitignore = fs::read_to_string(temp.path().join(GITIGNORE))?;
        assert_eq!(
            gitignore,
            "target\nruns/\n\n# apichain\n.apichain/\nenv/secrets.local.yaml\n"
        );

        let report = init_workspace(temp.path(), false)?;
        assert!(!report.gitignore_updated);
        assert_eq!(fs::read_to_string(temp.path().join(GITIGNORE))?, gitignore);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn secrets_file_is_owner_only() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir()?;
        init_workspace(temp.path(), false)?;
        let mode = fs::metadata(temp.path().join("env").join(SECRETS_FILE))?
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
        Ok(())
    }
}
