use std::{io, net::SocketAddr, sync::Arc};

use reqwest::{
    dns::{Addrs, Name, Resolve, Resolving},
    Client,
};
use thiserror::Error;

use crate::error::{Error, Result};

use super::models::HttpConfig;

/// Name resolution failure, kept as a distinct type so the classifier can
/// recognise it in the error chain.
#[derive(Debug, Error)]
#[error("dns lookup failed for {host}: {source}")]
pub struct DnsLookupError {
    pub host: String,
    #[source]
    pub source: io::Error,
}

/// System resolver (`getaddrinfo` through tokio) that reports failures as
/// [`DnsLookupError`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl Resolve for SystemResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let host = name.as_str().to_string();
        Box::pin(async move {
            let lookup = tokio::net::lookup_host((host.as_str(), 0))
                .await
                .map(|addrs| addrs.collect::<Vec<SocketAddr>>());
            match lookup {
                Ok(addrs) if !addrs.is_empty() => {
                    let addrs: Addrs = Box::new(addrs.into_iter());
                    Ok(addrs)
                }
                Ok(_) => Err(DnsLookupError {
                    host,
                    source: io::Error::new(io::ErrorKind::NotFound, "no addresses"),
                }
                .into()),
                Err(source) => Err(DnsLookupError { host, source }.into()),
            }
        })
    }
}

/// Builds the pooled client shared by every request of every run.
pub fn build_client(config: &HttpConfig) -> Result<Client> {
    let mut builder = Client::builder()
        .dns_resolver(Arc::new(SystemResolver))
        .pool_max_idle_per_host(config.max_idle_per_host)
        .pool_idle_timeout(config.idle_timeout())
        .tcp_keepalive(config.keep_alive())
        .user_agent(concat!("apichain/", env!("CARGO_PKG_VERSION")));

    if let Some(timeout) = config.timeout() {
        builder = builder.timeout(timeout);
    }
    if let Some(timeout) = config.connect_timeout() {
        builder = builder.connect_timeout(timeout);
    }
    if let Some(timeout) = config.response_header_timeout() {
        builder = builder.read_timeout(timeout);
    }
    if !config.proxy_from_env {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|err| Error::Execution(format!("building http client: {err}")))
}
