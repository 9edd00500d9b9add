//! Proxy error types

use std::error::Error as _;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    /// The exchange with the upstream did not complete (connect failure,
    /// timeout, reset while reading the body, ...).
    #[error("{}", describe_transport(.0))]
    Transport(#[from] reqwest::Error),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(reqwest::Error),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Render a reqwest error together with its source chain, since the
/// top-level message alone ("error sending request") hides the cause.
fn describe_transport(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
