//! Process logger, built explicitly and handed to whoever needs it.
//!
//! Nothing here installs a global subscriber; the binary attaches the
//! dispatch to its top-level future.

use std::{
    fs::{self, OpenOptions},
    io,
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::Dispatch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_DIR: &str = ".apichain/logs";
pub const LOG_FILE: &str = "apichain.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub root: PathBuf,
    pub debug: bool,
}

impl LogConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            debug: false,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join(LOG_DIR).join(LOG_FILE)
    }

    fn filter(&self) -> EnvFilter {
        let level = if self.debug { "debug" } else { "info" };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    }
}

#[derive(Clone)]
pub struct Logger {
    dispatch: Dispatch,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger").field("path", &self.path).finish()
    }
}

impl Logger {
    /// JSON lines appended to `<root>/.apichain/logs/apichain.log`.
    pub fn init(config: &LogConfig) -> io::Result<Self> {
        let path = config.log_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let subscriber = tracing_subscriber::registry().with(config.filter()).with(
            fmt::layer()
                .json()
                .with_writer(Mutex::new(file))
                .with_target(true)
                .with_current_span(false)
                .flatten_event(true)
                .with_ansi(false),
        );

        Ok(Self {
            dispatch: Dispatch::new(subscriber),
            path: Some(path),
        })
    }

    /// Drops every event.
    pub fn discard() -> Self {
        Self {
            dispatch: Dispatch::none(),
            path: None,
        }
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
