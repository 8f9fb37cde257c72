use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Result};
use inquire::{InquireError, Select};

use crate::{
    collection::CollectionRef,
    config::Workspace,
    report::render_pretty,
    runner::{RunContext, RunHandle, RunOutcome},
};

pub trait InteractiveUi {
    fn print(&mut self, message: &str);
    /// `None` when the prompt was dismissed.
    fn select(&mut self, prompt: &str, items: &[String], start: usize) -> Result<Option<usize>>;
}

pub struct InquireUi;

impl InteractiveUi for InquireUi {
    fn print(&mut self, message: &str) {
        println!("{}", message);
    }

    fn select(&mut self, prompt: &str, items: &[String], start: usize) -> Result<Option<usize>> {
        let choice = match Select::new(prompt, items.to_vec())
            .with_page_size(10)
            .with_starting_cursor(start)
            .prompt()
        {
            Ok(choice) => choice,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                return Ok(None)
            }
            Err(other) => return Err(other.into()),
        };
        items
            .iter()
            .position(|item| item == &choice)
            .map(Some)
            .ok_or_else(|| anyhow!("selection not found"))
    }
}

pub fn pick_collection(
    ui: &mut dyn InteractiveUi,
    workspace: &Workspace,
    refs: &[CollectionRef],
) -> Result<Option<PathBuf>> {
    let labels: Vec<String> = refs
        .iter()
        .map(|r| {
            let relative = r.path.strip_prefix(workspace.root()).unwrap_or(&r.path);
            format!("{}  ({})", r.name, relative.display())
        })
        .collect();
    Ok(ui
        .select("Collection", &labels, 0)?
        .and_then(|index| refs.get(index))
        .map(|r| r.path.clone()))
}

/// The workspace default is preselected when it exists.
pub fn pick_environment(
    ui: &mut dyn InteractiveUi,
    environments: &[String],
    default: &str,
) -> Result<Option<String>> {
    let start = environments
        .iter()
        .position(|name| name == default)
        .unwrap_or(0);
    Ok(ui
        .select("Environment", environments, start)?
        .and_then(|index| environments.get(index))
        .cloned())
}

/// Waits for a background run; Ctrl-C cancels it and still waits for the
/// partial outcome.
pub async fn wait_for_run(handle: RunHandle) -> crate::Result<RunOutcome> {
    let token = handle.token().clone();
    let wait = handle.wait();
    tokio::pin!(wait);
    tokio::select! {
        outcome = &mut wait => outcome,
        _ = tokio::signal::ctrl_c() => {
            token.cancel();
            wait.await
        }
    }
}

const RUN_AGAIN: &str = "Run again";
const CHOOSE_ANOTHER: &str = "Choose another collection";
const QUIT: &str = "Quit";

pub async fn run_interactive(workspace: &Workspace, persist: bool) -> Result<()> {
    let mut ui = InquireUi;
    run_interactive_with_ui(workspace, persist, &mut ui).await
}

pub(crate) async fn run_interactive_with_ui(
    workspace: &Workspace,
    persist: bool,
    ui: &mut dyn InteractiveUi,
) -> Result<()> {
    let refs = workspace.list_collections()?;
    if refs.is_empty() {
        ui.print(&format!(
            "No collections found under {}",
            workspace.collections_dir().display()
        ));
        return Ok(());
    }
    let environments = workspace.list_environments()?;
    if environments.is_empty() {
        ui.print(&format!(
            "No environments found under {}",
            workspace.environments_dir().display()
        ));
        return Ok(());
    }

    let uc = Arc::new(workspace.run_collection(persist)?);
    let mut selection: Option<(PathBuf, String)> = None;

    loop {
        let (collection, environment) = match selection.take() {
            Some(chosen) => chosen,
            None => {
                let Some(collection) = pick_collection(ui, workspace, &refs)? else {
                    return Ok(());
                };
                let Some(environment) = pick_environment(
                    ui,
                    &environments,
                    &workspace.config().default_environment,
                )?
                else {
                    return Ok(());
                };
                (collection, environment)
            }
        };

        ui.print(&format!(
            "Running {} with {} (Ctrl-C to cancel)",
            collection.display(),
            environment
        ));
        let handle = uc
            .clone()
            .spawn(RunContext::new(), collection.clone(), environment.clone());
        match wait_for_run(handle).await {
            Ok(outcome) => {
                ui.print(render_pretty(&outcome.run, outcome.run_id.as_deref()).trim_end());
                if let Some(err) = outcome.error {
                    ui.print(&format!("error: {err}"));
                }
            }
            Err(err) => ui.print(&format!("error: {err}")),
        }

        let menu = [RUN_AGAIN, CHOOSE_ANOTHER, QUIT].map(String::from);
        match ui.select("Next", &menu, 0)? {
            Some(0) => selection = Some((collection, environment)),
            Some(1) => {}
            _ => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkspaceConfig;
    use httpmock::prelude::*;
    use std::{collections::VecDeque, fs};
    use tempfile::tempdir;

    struct TestUi {
        menu: VecDeque<Option<usize>>,
        prints: Vec<String>,
        prompts: Vec<(String, usize)>,
    }

    impl TestUi {
        fn new(menu: Vec<Option<usize>>) -> Self {
            Self {
                menu: menu.into(),
                prints: Vec::new(),
                prompts: Vec::new(),
            }
        }
    }

    impl InteractiveUi for TestUi {
        fn print(&mut self, message: &str) {
            self.prints.push(message.to_string());
        }

        fn select(&mut self, prompt: &str, items: &[String], start: usize) -> Result<Option<usize>> {
            self.prompts.push((prompt.to_string(), start));
            let choice = self
                .menu
                .pop_front()
                .ok_or_else(|| anyhow!("unexpected menu request"))?;
            if let Some(index) = choice {
                assert!(index < items.len(), "index {index} out of bounds");
            }
            Ok(choice)
        }
    }

    fn workspace(base_url: &str) -> Result<(tempfile::TempDir, Workspace)> {
        let temp = tempdir()?;
        fs::create_dir_all(temp.path().join("collections"))?;
        fs::create_dir_all(temp.path().join("env"))?;
        fs::write(
            temp.path().join("collections/health.yaml"),
            "name: Health\nrequests:\n  - name: ping\n    method: GET\n    url: \"{{base}}/ping\"\n    assert: { status: 200 }\n",
        )?;
        fs::write(temp.path().join("env/dev.yaml"), format!("vars:\n  base: {base_url}\n"))?;
        fs::write(temp.path().join("env/prod.yaml"), "vars:\n  base: http://prod\n")?;
        let workspace = Workspace::new(temp.path(), WorkspaceConfig::default());
        Ok((temp, workspace))
    }

    #[tokio::test]
    async fn reports_empty_workspaces() -> Result<()> {
        let temp = tempdir()?;
        let workspace = Workspace::new(temp.path(), WorkspaceConfig::default());
        let mut ui = TestUi::new(vec![]);

        run_interactive_with_ui(&workspace, false, &mut ui).await?;

        assert!(ui.prints.iter().any(|line| line.contains("No collections found")));
        assert!(ui.prompts.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn runs_the_chosen_collection_then_quits() -> Result<()> {
        colored::control::set_override(false);
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/ping");
                then.status(200).body("pong");
            })
            .await;
        let (_temp, workspace) = workspace(&server.base_url())?;
        // collection 0, environment "dev" (index 0), run again, then quit
        let mut ui = TestUi::new(vec![Some(0), Some(0), Some(0), Some(2)]);

        run_interactive_with_ui(&workspace, false, &mut ui).await?;

        mock.assert_hits_async(2).await;
        assert!(ui.prints.iter().any(|line| line.contains("1 requests, 0 failed")));
        assert_eq!(ui.prompts[1], ("Environment".to_string(), 0));
        Ok(())
    }

    #[tokio::test]
    async fn dismissing_a_picker_ends_the_session() -> Result<()> {
        let (_temp, workspace) = workspace("http://unused")?;
        let mut ui = TestUi::new(vec![Some(0), None]);

        run_interactive_with_ui(&workspace, false, &mut ui).await?;

        assert!(!ui.prints.iter().any(|line| line.starts_with("Running")));
        Ok(())
    }

    #[test]
    fn environment_picker_preselects_the_default() -> Result<()> {
        let envs = vec!["dev".to_string(), "staging".to_string()];
        let mut ui = TestUi::new(vec![Some(1)]);
        let picked = pick_environment(&mut ui, &envs, "staging")?;
        assert_eq!(picked.as_deref(), Some("staging"));
        assert_eq!(ui.prompts[0].1, 1);
        Ok(())
    }
}
