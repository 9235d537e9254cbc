//! Error types for matrix-mul operations.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("communication error: {0}")]
    Comm(#[from] message_passing::Error),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("multiplication task failed: {0}")]
    Kernel(#[from] tokio::task::JoinError),

    #[error("matrix dimension mismatch: A is {0}x{0}, B is {1}x{1}")]
    DimensionMismatch(usize, usize),

    #[error("invalid problem size {0}")]
    InvalidSize(i64),

    #[error("rank {rank} cannot act as the {role}")]
    WrongRole { role: &'static str, rank: usize },

    #[error("distributed result for N={n} differs from the sequential product at ({row}, {col})")]
    Verification { n: usize, row: usize, col: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("rank {rank} exited with {status}")]
    RankFailed { rank: usize, status: String },

    #[error("rank {0} task panicked or was cancelled")]
    RankAborted(usize),

    #[error("failed to launch ranks: {0}")]
    Launch(#[from] std::io::Error),
}

pub(crate) trait IoContext<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T, Error>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T, Error> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}
