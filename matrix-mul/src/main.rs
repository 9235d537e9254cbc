use matrix_mul::{Config, Transport, bench, launcher};
use message_passing::TcpCommunicator;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;

    match (config.transport, config.rank) {
        (Transport::Local, _) => {
            launcher::run_local(&config).await?;
        }
        (Transport::Tcp, None) => launcher::launch(&config).await?,
        (Transport::Tcp, Some(rank)) => {
            let comm = TcpCommunicator::connect(rank, &config.peer_addrs()?).await?;
            bench::run(&comm, &config).await?;
        }
    }

    Ok(())
}
