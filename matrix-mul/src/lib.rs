//! Distributed dense matrix multiplication benchmark.
//!
//! `matrix-mul` multiplies square integer matrices of increasing size, once
//! in a single process and once split across a fixed group of ranks talking
//! through [`message_passing`], and records how long each took.
//!
//! # Protocol
//!
//! Rank 0, the *origin*, owns all file I/O. For each problem size:
//!
//! 1. The origin loads operands A and B and broadcasts the size `n`.
//! 2. B is broadcast whole to every rank.
//! 3. Each row of A is sent to the rank that owns it (see [`partition`]).
//! 4. Every rank multiplies its rows of A by B.
//! 5. The origin gathers every rank's result rows into the full product.
//!
//! Row messages are tagged with the row index, so rows can arrive in any
//! interleaving and still land in the right place.
//!
//! # Example
//!
//! ```no_run
//! use matrix_mul::{Matrix, OriginRole, WorkerRole};
//! use message_passing::local_cluster;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), matrix_mul::Error> {
//!     let mut ranks = local_cluster(2);
//!     let worker = ranks.pop().unwrap();
//!     let origin = ranks.pop().unwrap();
//!
//!     let handle = tokio::spawn(async move { WorkerRole::new(&worker)?.serve().await });
//!
//!     let a = Matrix::from_rows(vec![vec![1, 2], vec![3, 4]]);
//!     let b = Matrix::from_rows(vec![vec![5, 6], vec![7, 8]]);
//!     let c = OriginRole::new(&origin)?.multiply(a, b).await?;
//!
//!     assert_eq!(c, Matrix::from_rows(vec![vec![19, 22], vec![43, 50]]));
//!     handle.await.unwrap()?;
//!     Ok(())
//! }
//! ```

pub mod bench;
mod collector;
pub mod config;
mod distributor;
mod error;
pub mod launcher;
mod matrix;
mod multiplier;
pub mod partition;
mod roles;
pub mod store;
pub mod timing;

use message_passing::{Rank, Tag};

pub use collector::{gather_result, submit_result};
pub use config::{Config, Transport};
pub use distributor::{LocalOperands, receive_operands, scatter_operands};
pub use error::Error;
pub use matrix::Matrix;
pub use multiplier::{PartialResult, multiply, multiply_rows};
pub use partition::{RowRange, owner_of, row_range};
pub use roles::{OriginRole, WorkerRole};
pub use store::MatrixStore;
pub use timing::TimingSample;

/// The rank that owns all I/O and assembles results.
pub const ORIGIN: Rank = message_passing::ROOT;

/// Message tag carrying row `row` of a matrix.
pub(crate) fn row_tag(row: usize) -> Tag {
    Tag::User(row as u64)
}
