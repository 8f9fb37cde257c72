mod classify;
mod client;
mod models;
mod runner;

pub use classify::{classify, classify_chain};
pub use client::{build_client, DnsLookupError, SystemResolver};
pub use models::{HttpConfig, DEFAULT_MAX_BODY_BYTES};
pub use runner::{HttpRunner, RequestRunner};
