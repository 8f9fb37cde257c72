pub mod assertions;
pub mod collection;
pub mod config;
pub mod env;
pub mod error;
pub mod executor;
pub mod extract;
pub mod jsonpath;
pub mod logging;
pub mod model;
pub mod runner;
pub mod store;

#[cfg(feature = "cli")]
pub mod interactive;
#[cfg(feature = "cli")]
pub mod report;

pub use error::{Error, ErrorKind, Result};
