//! The transport-independent message-passing interface.

use async_trait::async_trait;

use crate::{Element, Error, Rank, Tag};

/// Rank that coordinates `barrier`.
pub const ROOT: Rank = 0;

/// A member of a fixed-size group of ranks.
///
/// Every call blocks the calling task until its local part of the operation
/// is complete. There are no timeouts: a peer that never answers stalls the
/// caller indefinitely.
#[async_trait]
pub trait Communicator: Send + Sync {
    /// This rank's index.
    fn rank(&self) -> Rank;

    /// Number of ranks in the world.
    fn size(&self) -> usize;

    /// Sends `buf` to `dest`, labelled with `tag`.
    async fn send(&self, buf: &[Element], dest: Rank, tag: Tag) -> Result<(), Error>;

    /// Receives the next message from `source` labelled with `tag` into `buf`.
    ///
    /// The message must have exactly `buf.len()` elements.
    async fn receive(&self, buf: &mut [Element], source: Rank, tag: Tag) -> Result<(), Error>;

    /// Replicates `buf` from `root` into `buf` on every other rank.
    ///
    /// Every rank must call this with a buffer of the same length.
    async fn broadcast(&self, buf: &mut [Element], root: Rank) -> Result<(), Error> {
        check_rank(root, self.size())?;
        if self.rank() == root {
            for peer in (0..self.size()).filter(|&peer| peer != root) {
                self.send(buf, peer, Tag::Broadcast).await?;
            }
            Ok(())
        } else {
            self.receive(buf, root, Tag::Broadcast).await
        }
    }

    /// Returns once every rank has entered the barrier.
    async fn barrier(&self) -> Result<(), Error> {
        if self.rank() == ROOT {
            for peer in 1..self.size() {
                self.receive(&mut [], peer, Tag::Barrier).await?;
            }
            for peer in 1..self.size() {
                self.send(&[], peer, Tag::Barrier).await?;
            }
            Ok(())
        } else {
            self.send(&[], ROOT, Tag::Barrier).await?;
            self.receive(&mut [], ROOT, Tag::Barrier).await
        }
    }
}

pub(crate) fn check_rank(rank: Rank, size: usize) -> Result<(), Error> {
    if rank < size {
        Ok(())
    } else {
        Err(Error::InvalidRank { rank, size })
    }
}

/// Validates that `peer` is a rank other than `own` in a world of `size`.
pub(crate) fn check_peer(own: Rank, peer: Rank, size: usize) -> Result<(), Error> {
    check_rank(peer, size)?;
    if peer == own {
        return Err(Error::InvalidRank { rank: peer, size });
    }
    Ok(())
}
