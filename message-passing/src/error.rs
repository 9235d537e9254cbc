//! Error types for message-passing operations.

use thiserror::Error;

use crate::Rank;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection to rank {0} closed")]
    ConnectionClosed(Rank),

    #[error("message from rank {peer} has {actual} elements, receive buffer holds {expected}")]
    SizeMismatch {
        peer: Rank,
        expected: usize,
        actual: usize,
    },

    #[error("rank {rank} is not a valid peer in a world of {size}")]
    InvalidRank { rank: Rank, size: usize },

    #[error("could not reach rank {rank} after {attempts} attempts")]
    Unreachable { rank: Rank, attempts: usize },

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("unknown tag kind {0}")]
    UnknownTagKind(u8),

    #[error("frame of {0} elements exceeds the frame size limit")]
    FrameTooLarge(u64),
}
