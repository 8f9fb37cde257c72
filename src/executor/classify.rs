use std::{error::Error as StdError, io};

use crate::model::RunErrorKind;

use super::client::DnsLookupError;

/// Maps a transport failure onto the run error taxonomy by inspecting error
/// types, never message text. Cancellation is detected by the caller, which
/// owns the run's token.
pub fn classify(err: &reqwest::Error) -> RunErrorKind {
    if err.is_timeout() {
        return RunErrorKind::Timeout;
    }
    if let Some(kind) = classify_chain(err) {
        return kind;
    }
    if err.is_connect() {
        return RunErrorKind::Connection;
    }
    RunErrorKind::Unknown
}

/// Walks `source()` links looking for a DNS failure or a known I/O condition.
pub fn classify_chain(err: &(dyn StdError + 'static)) -> Option<RunErrorKind> {
    let mut current = Some(err);
    while let Some(err) = current {
        if err.is::<DnsLookupError>() {
            return Some(RunErrorKind::Dns);
        }
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            if let Some(kind) = classify_io(io_err) {
                return Some(kind);
            }
        }
        current = err.source();
    }
    None
}

fn classify_io(err: &io::Error) -> Option<RunErrorKind> {
    match err.kind() {
        io::ErrorKind::TimedOut => return Some(RunErrorKind::Timeout),
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotConnected
        | io::ErrorKind::AddrNotAvailable
        | io::ErrorKind::UnexpectedEof => return Some(RunErrorKind::Connection),
        _ => {}
    }
    // `io::Error::source` skips the wrapped error itself.
    let inner: &(dyn StdError + 'static) = err.get_ref()?;
    classify_chain(inner)
}
