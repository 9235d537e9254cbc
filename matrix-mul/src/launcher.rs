//! Starting every rank of a run.

use futures_util::future::join_all;
use message_passing::local_cluster;
use tokio::process::Command;
use tracing::{error, info};

use crate::bench::{self, BenchReport};
use crate::config::{ENV_RANK, ENV_SEED, ENV_TRANSPORT, ENV_WORLD_SIZE};
use crate::{Config, Error, ORIGIN};

/// Spawns one copy of the current executable per rank and waits for all of
/// them, the way `mpirun` would.
///
/// Children inherit the environment, plus their rank, the world size, the
/// transport and the launcher's seed. Fails with the first rank that exited
/// unsuccessfully.
pub async fn launch(config: &Config) -> Result<(), Error> {
    let exe = std::env::current_exe()?;
    info!(ranks = config.world_size, exe = %exe.display(), "launching ranks");

    let mut children = Vec::with_capacity(config.world_size);
    for rank in 0..config.world_size {
        let child = Command::new(&exe)
            .env(ENV_RANK, rank.to_string())
            .env(ENV_WORLD_SIZE, config.world_size.to_string())
            .env(ENV_SEED, config.seed.to_string())
            .env(ENV_TRANSPORT, "tcp")
            .kill_on_drop(true)
            .spawn()?;
        children.push(child);
    }

    let statuses = join_all(children.iter_mut().map(|child| child.wait())).await;

    let mut failure = None;
    for (rank, status) in statuses.into_iter().enumerate() {
        let status = status?;
        if !status.success() {
            error!(rank, %status, "rank failed");
            failure.get_or_insert(Error::RankFailed {
                rank,
                status: status.to_string(),
            });
        }
    }
    failure.map_or(Ok(()), Err)
}

/// Runs every rank as a task in this process, connected by a
/// [`local_cluster`]. Returns the origin's report.
pub async fn run_local(config: &Config) -> Result<BenchReport, Error> {
    info!(ranks = config.world_size, "running ranks in-process");
    let handles: Vec<_> = local_cluster(config.world_size)
        .into_iter()
        .map(|comm| {
            let config = config.clone();
            tokio::spawn(async move { bench::run(&comm, &config).await })
        })
        .collect();

    let mut report = None;
    let mut failure = None;
    for (rank, joined) in join_all(handles).await.into_iter().enumerate() {
        match joined {
            Ok(Ok(Some(origin_report))) => report = Some(origin_report),
            Ok(Ok(None)) => {}
            Ok(Err(e)) => {
                error!(rank, error = %e, "rank failed");
                failure.get_or_insert(e);
            }
            Err(_) => {
                failure.get_or_insert(Error::RankAborted(rank));
            }
        }
    }

    if let Some(e) = failure {
        return Err(e);
    }
    report.ok_or(Error::RankAborted(ORIGIN))
}
