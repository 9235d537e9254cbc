//! The benchmark run loop.
//!
//! The origin prepares operand files for every size, then all ranks meet at
//! a barrier. For each size in order, the origin times a sequential
//! multiplication and a distributed one, checks that they agree and writes
//! the distributed product. Workers simply serve one distributed
//! multiplication per size. Timings are written once every size is done.

use std::time::Instant;

use message_passing::Communicator;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, error, info};

use crate::multiplier::run_kernel;
use crate::timing::{RunKind, TimingSample};
use crate::{Config, Error, ORIGIN, OriginRole, WorkerRole, multiply};

/// Timings collected by the origin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BenchReport {
    pub sequential: Vec<TimingSample>,
    pub distributed: Vec<TimingSample>,
}

/// Runs the whole benchmark on this rank.
///
/// Every rank must be given the same `config.sizes`. Returns the report on
/// the origin and `None` on workers.
pub async fn run<C: Communicator + ?Sized>(
    comm: &C,
    config: &Config,
) -> Result<Option<BenchReport>, Error> {
    if comm.rank() == ORIGIN {
        run_origin(comm, config).await.map(Some)
    } else {
        run_worker(comm, config).await.map(|()| None)
    }
}

async fn run_origin<C: Communicator + ?Sized>(
    comm: &C,
    config: &Config,
) -> Result<BenchReport, Error> {
    let origin = OriginRole::new(comm)?;
    let store = config.store();

    store.ensure_dirs().await?;
    info!(seed = config.seed, ranks = comm.size(), sizes = ?config.sizes, "preparing operands");
    let mut rng = StdRng::seed_from_u64(config.seed);
    for &n in &config.sizes {
        store.ensure_operands(n, &mut rng).await?;
    }
    comm.barrier().await?;

    let mut report = BenchReport::default();
    for &n in &config.sizes {
        let start = Instant::now();
        let (a, b) = store.load_operands(n).await?;
        let expected = run_kernel(move || multiply(&a, &b)).await?;
        let sample = TimingSample::new(n, start.elapsed());
        info!(n, elapsed_ms = sample.elapsed_ms, "sequential run finished");
        report.sequential.push(sample);

        let start = Instant::now();
        let (a, b) = store.load_operands(n).await?;
        let result = origin.multiply(a, b).await?;
        let sample = TimingSample::new(n, start.elapsed());
        info!(n, ranks = comm.size(), elapsed_ms = sample.elapsed_ms, "distributed run finished");
        report.distributed.push(sample);

        if let Some((row, col)) = expected.first_difference(&result) {
            error!(n, row, col, "distributed result differs from sequential product");
            return Err(Error::Verification { n, row, col });
        }
        store.write_result(n, &result).await?;
    }

    store.write_stats(RunKind::Sequential, &report.sequential).await?;
    store.write_stats(RunKind::Distributed, &report.distributed).await?;
    info!(results = %config.results_dir.display(), "benchmark complete");
    Ok(report)
}

async fn run_worker<C: Communicator + ?Sized>(comm: &C, config: &Config) -> Result<(), Error> {
    let worker = WorkerRole::new(comm)?;
    comm.barrier().await?;

    for _ in &config.sizes {
        let n = worker.serve().await?;
        debug!(rank = comm.rank(), n, "served");
    }
    Ok(())
}
