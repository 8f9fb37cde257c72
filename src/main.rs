use std::{
    io::IsTerminal,
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use apichain::config::{init_workspace, Workspace};
use apichain::interactive::{pick_collection, run_interactive, wait_for_run, InquireUi};
use apichain::logging::{LogConfig, Logger};
use apichain::report::{print_run, render_json};
use apichain::runner::RunContext;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::instrument::WithSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "apichain",
    version,
    about = "Collection-based API test runner",
    disable_help_subcommand = true
)]
struct Cli {
    /// Workspace root (defaults to the nearest directory with apichain.json)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    /// Write debug-level events to the log file
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a collection against an environment
    Run {
        /// Collection name or file path; prompts when omitted on a terminal
        #[arg(short, long)]
        collection: Option<String>,
        /// Environment name or file path
        #[arg(short, long)]
        env: Option<String>,
        /// Skip writing the run artifact
        #[arg(long)]
        no_save: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
        /// Abort the whole run after this many milliseconds
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,
    },
    /// Resolve every request of a collection without sending anything
    Validate {
        /// Collection name or file path
        #[arg(short, long)]
        collection: String,
        /// Environment name or file path
        #[arg(short, long)]
        env: Option<String>,
    },
    /// List collections in the workspace
    Collections,
    /// List environments in the workspace
    Envs,
    /// Create a workspace with sample files
    Init {
        /// Directory to initialize
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
        /// Overwrite existing sample files
        #[arg(long)]
        force: bool,
    },
    /// Print version and build information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Pretty,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    match dispatch(Cli::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the command succeeded without failed requests.
async fn dispatch(cli: Cli) -> Result<bool> {
    match &cli.command {
        Some(Commands::Version) => {
            println!("{}", version_line());
            return Ok(true);
        }
        Some(Commands::Init { path, force }) => {
            let root = resolve_path(path)?;
            let report = init_workspace(&root, *force)?;
            for rel in &report.written {
                println!("created {}", rel.display());
            }
            for rel in &report.skipped {
                println!("kept {}", rel.display());
            }
            println!("Workspace ready at {}", root.display());
            return Ok(true);
        }
        _ => {}
    }

    let workspace = match &cli.workspace {
        Some(path) => Workspace::open(&resolve_path(path)?).context("loading configuration")?,
        None => {
            let cwd = std::env::current_dir().context("resolving current directory")?;
            // An unconfigured directory is still usable with default paths.
            match Workspace::discover(&cwd) {
                Ok(workspace) => workspace,
                Err(_) => Workspace::open(&cwd).context("loading configuration")?,
            }
        }
    };

    let logger = Logger::init(&LogConfig::new(workspace.root()).with_debug(cli.debug))
        .unwrap_or_else(|err| {
            eprintln!("warning: logging disabled: {err}");
            Logger::discard()
        });
    let subscriber = logger.dispatch().clone();

    match cli.command {
        Some(Commands::Run {
            collection,
            env,
            no_save,
            format,
            timeout_ms,
        }) => {
            run(&workspace, collection, env, !no_save, format, timeout_ms)
                .with_subscriber(subscriber)
                .await
        }
        Some(Commands::Validate { collection, env }) => {
            tracing::dispatcher::with_default(&subscriber, || {
                validate(&workspace, &collection, env)
            })
        }
        Some(Commands::Collections) => {
            for r in workspace.list_collections()? {
                let relative = r.path.strip_prefix(workspace.root()).unwrap_or(&r.path);
                println!("{}\t{}", r.name, relative.display());
            }
            Ok(true)
        }
        Some(Commands::Envs) => {
            for name in workspace.list_environments()? {
                println!("{}", name);
            }
            Ok(true)
        }
        None => {
            if !std::io::stdin().is_terminal() {
                bail!("no command given; try `apichain run --collection <NAME>`");
            }
            run_interactive(&workspace, true)
                .with_subscriber(subscriber)
                .await?;
            Ok(true)
        }
        Some(Commands::Init { .. } | Commands::Version) => Ok(true),
    }
}

fn validate(workspace: &Workspace, collection: &str, env: Option<String>) -> Result<bool> {
    let collection_path = workspace.find_collection(collection)?;
    let environment = env.unwrap_or_else(|| workspace.config().default_environment.clone());

    let report = workspace
        .validate_collection()
        .execute(&RunContext::new(), &collection_path, &environment)?;
    if report.is_ok() {
        println!("OK");
        return Ok(true);
    }
    for issue in &report.issues {
        println!("{issue}");
    }
    println!(
        "{} of {} requests invalid",
        report.issues.len(),
        report.requests
    );
    Ok(false)
}

fn version_line() -> String {
    format!(
        "apichain {} (commit={}, date={})",
        env!("CARGO_PKG_VERSION"),
        option_env!("APICHAIN_BUILD_COMMIT").unwrap_or("none"),
        option_env!("APICHAIN_BUILD_DATE").unwrap_or("unknown")
    )
}

async fn run(
    workspace: &Workspace,
    collection: Option<String>,
    env: Option<String>,
    persist: bool,
    format: OutputFormat,
    timeout_ms: Option<u64>,
) -> Result<bool> {
    let collection_path = match collection {
        Some(name) => workspace.find_collection(&name)?,
        None if std::io::stdin().is_terminal() => {
            let refs = workspace.list_collections()?;
            match pick_collection(&mut InquireUi, workspace, &refs)? {
                Some(path) => path,
                None => return Ok(false),
            }
        }
        None => bail!("--collection is required when stdin is not a terminal"),
    };
    let environment = env.unwrap_or_else(|| workspace.config().default_environment.clone());

    let mut ctx = RunContext::new();
    if let Some(ms) = timeout_ms {
        ctx = ctx.with_timeout(Duration::from_millis(ms));
    }

    let uc = Arc::new(workspace.run_collection(persist)?);
    let handle = uc.spawn(ctx, collection_path, environment);
    let outcome = wait_for_run(handle).await?;

    match format {
        OutputFormat::Pretty => print_run(&outcome.run, outcome.run_id.as_deref()),
        OutputFormat::Json => println!("{}", render_json(&outcome.run, outcome.run_id.as_deref())?),
    }
    if let Some(err) = &outcome.error {
        eprintln!("error: {err}");
    }

    Ok(outcome.error.is_none() && outcome.run.failure_count() == 0)
}

fn resolve_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
