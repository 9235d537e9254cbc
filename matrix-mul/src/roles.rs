//! What the origin and the workers each do for one problem size.

use message_passing::Communicator;

use crate::collector::{gather_result, submit_result};
use crate::distributor::{receive_operands, scatter_operands};
use crate::multiplier::run_kernel;
use crate::{Error, Matrix, ORIGIN};

/// The origin's part of one distributed multiplication.
pub struct OriginRole<'a, C: ?Sized> {
    comm: &'a C,
}

impl<'a, C: Communicator + ?Sized> OriginRole<'a, C> {
    pub fn new(comm: &'a C) -> Result<Self, Error> {
        if comm.rank() != ORIGIN {
            return Err(Error::WrongRole {
                role: "origin",
                rank: comm.rank(),
            });
        }
        Ok(Self { comm })
    }

    /// Computes `a * b` across every rank and returns the assembled product.
    pub async fn multiply(&self, a: Matrix, b: Matrix) -> Result<Matrix, Error> {
        let operands = scatter_operands(self.comm, &a, b).await?;
        drop(a);
        let n = operands.n;
        let partial = run_kernel(move || operands.multiply()).await?;
        gather_result(self.comm, n, &partial).await
    }
}

/// A non-origin rank's part of one distributed multiplication.
pub struct WorkerRole<'a, C: ?Sized> {
    comm: &'a C,
}

impl<'a, C: Communicator + ?Sized> WorkerRole<'a, C> {
    pub fn new(comm: &'a C) -> Result<Self, Error> {
        if comm.rank() == ORIGIN {
            return Err(Error::WrongRole {
                role: "worker",
                rank: comm.rank(),
            });
        }
        Ok(Self { comm })
    }

    /// Receives operands, computes the owned rows and sends them back.
    /// Returns the problem size that was handled.
    pub async fn serve(&self) -> Result<usize, Error> {
        let operands = receive_operands(self.comm).await?;
        let n = operands.n;
        let partial = run_kernel(move || operands.multiply()).await?;
        submit_result(self.comm, &partial).await?;
        Ok(n)
    }
}
