//! Moves the operands from the origin to every rank.
//!
//! The origin broadcasts the problem size, then the whole of B, then sends
//! each row of A point-to-point to the rank that owns it. For `n == 0` only
//! the size is broadcast. Rows are tagged
//! with their index so a receiver can match them whatever the interleaving.

use message_passing::{Communicator, Element};
use tracing::debug;

use crate::partition::{RowRange, owner_of, row_range};
use crate::{Error, Matrix, ORIGIN, PartialResult, multiply_rows, row_tag};

/// Operands held by one rank once distribution is complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalOperands {
    pub n: usize,
    pub range: RowRange,
    /// Rows `range` of A, row-major.
    pub a_rows: Vec<Element>,
    pub b: Matrix,
}

impl LocalOperands {
    /// Computes this rank's share of the product.
    pub fn multiply(&self) -> PartialResult {
        multiply_rows(&self.a_rows, self.range, &self.b)
    }
}

/// Origin side: distributes `a` and `b` to every rank and keeps the origin's
/// own share.
pub async fn scatter_operands<C: Communicator + ?Sized>(
    comm: &C,
    a: &Matrix,
    mut b: Matrix,
) -> Result<LocalOperands, Error> {
    let n = a.n();
    if b.n() != n {
        return Err(Error::DimensionMismatch(n, b.n()));
    }
    let p = comm.size();

    let mut header = [Element::try_from(n).map_err(|_| Error::InvalidSize(-1))?];
    comm.broadcast(&mut header, ORIGIN).await?;
    // An empty problem ends at the size broadcast.
    if n > 0 {
        comm.broadcast(b.as_mut_slice(), ORIGIN).await?;
        debug!(n, ranks = p, "broadcast B");
    }

    let mut sent = 0;
    for row in 0..n {
        let owner = owner_of(n, p, row);
        if owner != ORIGIN {
            comm.send(a.row(row), owner, row_tag(row)).await?;
            sent += 1;
        }
    }
    debug!(n, rows = sent, "scattered A");

    let range = row_range(n, p, ORIGIN);
    Ok(LocalOperands {
        n,
        range,
        a_rows: a.rows_in(range).to_vec(),
        b,
    })
}

/// Worker side: receives the problem size, B, and the owned rows of A.
pub async fn receive_operands<C: Communicator + ?Sized>(
    comm: &C,
) -> Result<LocalOperands, Error> {
    let mut header = [0];
    comm.broadcast(&mut header, ORIGIN).await?;
    let n = problem_size(header[0])?;

    let mut b = Matrix::zeros(n);
    if n > 0 {
        comm.broadcast(b.as_mut_slice(), ORIGIN).await?;
    }

    let range = row_range(n, comm.size(), comm.rank());
    let mut a_rows = vec![0; range.len() * n];
    for (row, buf) in range.iter().zip(a_rows.chunks_exact_mut(n.max(1))) {
        comm.receive(buf, ORIGIN, row_tag(row)).await?;
    }
    debug!(rank = comm.rank(), n, ?range, "received operands");

    Ok(LocalOperands {
        n,
        range,
        a_rows,
        b,
    })
}

/// Validates a broadcast problem size: it must be non-negative and an
/// `n`×`n` buffer must be addressable.
fn problem_size(value: Element) -> Result<usize, Error> {
    let n = usize::try_from(value).map_err(|_| Error::InvalidSize(value))?;
    n.checked_mul(n)
        .and_then(|cells| cells.checked_mul(size_of::<Element>()))
        .ok_or(Error::InvalidSize(value))?;
    Ok(n)
}
