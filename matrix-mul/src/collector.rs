//! Gathers partial results back into one matrix at the origin.

use futures_util::future::try_join_all;
use message_passing::{Communicator, Element, Rank};
use tracing::debug;

use crate::partition::{RowRange, row_range};
use crate::{Error, Matrix, ORIGIN, PartialResult, row_tag};

/// Origin side: assembles the `n`×`n` result from the origin's own `partial`
/// and the rows every other rank sends.
///
/// Ranks are drained concurrently, so rows land in whatever order they
/// complete; each goes straight into its slot in the result.
pub async fn gather_result<C: Communicator + ?Sized>(
    comm: &C,
    n: usize,
    partial: &PartialResult,
) -> Result<Matrix, Error> {
    let p = comm.size();
    let mut result = Matrix::zeros(n);

    let mut rest = result.as_mut_slice();
    let mut pending = Vec::with_capacity(p.saturating_sub(1));
    for rank in 0..p {
        let range = row_range(n, p, rank);
        let (block, tail) = std::mem::take(&mut rest).split_at_mut(range.len() * n);
        rest = tail;

        if rank == ORIGIN {
            debug_assert_eq!(partial.range(), range);
            block.copy_from_slice(partial.as_slice());
        } else if !range.is_empty() {
            pending.push(receive_block(comm, rank, range, n, block));
        }
    }
    try_join_all(pending).await?;
    debug!(n, ranks = p, "gathered result");

    Ok(result)
}

/// Worker side: sends every owned result row to the origin.
pub async fn submit_result<C: Communicator + ?Sized>(
    comm: &C,
    partial: &PartialResult,
) -> Result<(), Error> {
    for row in partial.range() {
        comm.send(partial.row(row), ORIGIN, row_tag(row)).await?;
    }
    Ok(())
}

async fn receive_block<C: Communicator + ?Sized>(
    comm: &C,
    rank: Rank,
    range: RowRange,
    n: usize,
    block: &mut [Element],
) -> Result<(), Error> {
    for (row, buf) in range.iter().zip(block.chunks_exact_mut(n.max(1))) {
        comm.receive(buf, rank, row_tag(row)).await?;
    }
    Ok(())
}
