//! Rank-to-rank message passing.
//!
//! `message-passing` lets a fixed group of ranks exchange typed buffers of
//! [`Element`]s. Every transport implements the same [`Communicator`] trait:
//! point-to-point `send`/`receive`, plus `broadcast` and `barrier` built on
//! top of them.
//!
//! # Transports
//!
//! - [`local_cluster`]: all ranks live in one process and talk over tokio
//!   channels. Used by tests and the single-machine mode.
//! - [`TcpCommunicator`]: one rank per OS process, connected as a full mesh
//!   of TCP streams.
//!
//! # Delivery
//!
//! Messages from one source arrive in the order they were sent. A receive
//! names both the source rank and the [`Tag`]; frames carrying other tags are
//! parked until someone asks for them. A frame whose length differs from the
//! receive buffer is a fatal [`Error::SizeMismatch`].
//!
//! # Example
//!
//! ```no_run
//! use message_passing::{Communicator, Tag, local_cluster};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), message_passing::Error> {
//!     let mut ranks = local_cluster(2).into_iter();
//!     let (origin, worker) = (ranks.next().unwrap(), ranks.next().unwrap());
//!
//!     let handle = tokio::spawn(async move {
//!         let mut row = [0; 3];
//!         worker.receive(&mut row, 0, Tag::User(7)).await?;
//!         Ok::<_, message_passing::Error>(row)
//!     });
//!
//!     origin.send(&[1, 2, 3], 1, Tag::User(7)).await?;
//!     assert_eq!(handle.await.unwrap()?, [1, 2, 3]);
//!     Ok(())
//! }
//! ```

mod communicator;
mod error;
mod local;
mod mailbox;
mod tcp;

pub use communicator::{Communicator, ROOT};
pub use error::Error;
pub use local::{LocalCommunicator, local_cluster};
pub use mailbox::Tag;
pub use tcp::TcpCommunicator;

/// Index of a rank within its world, in `[0, size)`.
pub type Rank = usize;

/// Value type carried by every message.
pub type Element = i64;
