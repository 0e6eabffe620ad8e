use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading datasets or building the pipeline.
///
/// Parse and config errors are fatal for the construction they occur in:
/// no partially loaded dataset or half-built pipeline is ever handed out.
/// End of epoch is not an error; iteration handles signal it by returning
/// `None`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record at {path}:{line}: {reason}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}
