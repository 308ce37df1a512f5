//! Error types for workline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// `then` composes sequence steps; it is only legal on a queue with
    /// concurrency 1.
    #[error("cannot use then in a concurrent section (concurrency {concurrency})")]
    ConcurrentSection { concurrency: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
