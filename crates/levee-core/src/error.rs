//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Every applicable upstream candidate failed; carries the last
    /// transport error's description.
    #[error("{message}")]
    UpstreamsExhausted { message: String },

    #[error("No {0} upstream registries configured")]
    NoUpstreams(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
