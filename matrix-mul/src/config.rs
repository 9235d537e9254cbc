//! Run configuration, read from `MATMUL_*` environment variables.

use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use message_passing::Rank;

use crate::{Error, MatrixStore};

pub const ENV_WORLD_SIZE: &str = "MATMUL_WORLD_SIZE";
pub const ENV_RANK: &str = "MATMUL_RANK";
pub const ENV_HOST: &str = "MATMUL_HOST";
pub const ENV_BASE_PORT: &str = "MATMUL_BASE_PORT";
pub const ENV_MATRICES_DIR: &str = "MATMUL_MATRICES_DIR";
pub const ENV_RESULTS_DIR: &str = "MATMUL_RESULTS_DIR";
pub const ENV_SEED: &str = "MATMUL_SEED";
pub const ENV_TRANSPORT: &str = "MATMUL_TRANSPORT";

/// Problem sizes benchmarked, in order.
pub const SIZES: &[usize] = &[
    10, 30, 50, 100, 200, 300, 400, 500, 600, 700, 800, 900, 1000, 1500, 2000,
];

const DEFAULT_WORLD_SIZE: usize = 4;
const DEFAULT_BASE_PORT: u16 = 47000;

/// How ranks talk to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// One OS process per rank, connected over TCP.
    Tcp,
    /// Every rank is a task inside this process.
    Local,
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Transport::Tcp),
            "local" => Ok(Transport::Local),
            other => Err(format!("unknown transport {other:?}, expected \"tcp\" or \"local\"")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Number of ranks.
    pub world_size: usize,
    /// This process's rank; `None` for the launcher.
    pub rank: Option<Rank>,
    pub host: IpAddr,
    /// Rank `r` listens on `base_port + r`.
    pub base_port: u16,
    pub matrices_dir: PathBuf,
    pub results_dir: PathBuf,
    /// Seed for operand generation.
    pub seed: u64,
    pub transport: Transport,
    pub sizes: Vec<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            world_size: DEFAULT_WORLD_SIZE,
            rank: None,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            base_port: DEFAULT_BASE_PORT,
            matrices_dir: PathBuf::from("matrices"),
            results_dir: PathBuf::from("results"),
            seed: seed_from_clock(),
            transport: Transport::Tcp,
            sizes: SIZES.to_vec(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from `lookup`, which maps a variable name to
    /// its value. Unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let defaults = Config::default();
        let config = Self {
            world_size: parse_var(&lookup, ENV_WORLD_SIZE)?.unwrap_or(defaults.world_size),
            rank: parse_var(&lookup, ENV_RANK)?,
            host: parse_var(&lookup, ENV_HOST)?.unwrap_or(defaults.host),
            base_port: parse_var(&lookup, ENV_BASE_PORT)?.unwrap_or(defaults.base_port),
            matrices_dir: lookup(ENV_MATRICES_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.matrices_dir),
            results_dir: lookup(ENV_RESULTS_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.results_dir),
            seed: parse_var(&lookup, ENV_SEED)?.unwrap_or(defaults.seed),
            transport: parse_var(&lookup, ENV_TRANSPORT)?.unwrap_or(defaults.transport),
            sizes: defaults.sizes,
        };

        if config.world_size == 0 {
            return Err(Error::Config(format!("{ENV_WORLD_SIZE} must be at least 1")));
        }
        if let Some(rank) = config.rank {
            if rank >= config.world_size {
                return Err(Error::Config(format!(
                    "{ENV_RANK}={rank} is out of range for {ENV_WORLD_SIZE}={}",
                    config.world_size
                )));
            }
        }
        Ok(config)
    }

    pub fn store(&self) -> MatrixStore {
        MatrixStore::new(&self.matrices_dir, &self.results_dir)
    }

    /// Listening address of every rank, indexed by rank.
    pub fn peer_addrs(&self) -> Result<Vec<SocketAddr>, Error> {
        (0..self.world_size)
            .map(|rank| {
                u16::try_from(usize::from(self.base_port) + rank)
                    .map(|port| SocketAddr::new(self.host, port))
                    .map_err(|_| {
                        Error::Config(format!(
                            "port for rank {rank} exceeds 65535 (base port {})",
                            self.base_port
                        ))
                    })
            })
            .collect()
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, Error>
where
    T: FromStr,
    T::Err: Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| Error::Config(format!("invalid {key}={raw:?}: {e}")))
        })
        .transpose()
}

fn seed_from_clock() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.world_size, 4);
        assert_eq!(config.rank, None);
        assert_eq!(config.transport, Transport::Tcp);
        assert_eq!(config.sizes, SIZES);
        assert_eq!(config.matrices_dir, PathBuf::from("matrices"));
    }

    #[test]
    fn reads_every_variable() {
        let config = Config::from_lookup(lookup(&[
            (ENV_WORLD_SIZE, "3"),
            (ENV_RANK, "2"),
            (ENV_HOST, "10.0.0.5"),
            (ENV_BASE_PORT, "9000"),
            (ENV_MATRICES_DIR, "/tmp/m"),
            (ENV_RESULTS_DIR, "/tmp/r"),
            (ENV_SEED, "99"),
            (ENV_TRANSPORT, "local"),
        ]))
        .unwrap();

        assert_eq!(config.world_size, 3);
        assert_eq!(config.rank, Some(2));
        assert_eq!(config.seed, 99);
        assert_eq!(config.transport, Transport::Local);
        assert_eq!(config.results_dir, PathBuf::from("/tmp/r"));
        assert_eq!(
            config.peer_addrs().unwrap(),
            vec![
                "10.0.0.5:9000".parse().unwrap(),
                "10.0.0.5:9001".parse().unwrap(),
                "10.0.0.5:9002".parse().unwrap(),
            ]
        );
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(matches!(
            Config::from_lookup(lookup(&[(ENV_WORLD_SIZE, "four")])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[(ENV_TRANSPORT, "mpi")])),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn rank_must_fit_world() {
        assert!(matches!(
            Config::from_lookup(lookup(&[(ENV_WORLD_SIZE, "2"), (ENV_RANK, "2")])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[(ENV_WORLD_SIZE, "0")])),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn ports_must_fit_u16() {
        let config = Config {
            world_size: 3,
            base_port: u16::MAX - 1,
            ..Config::default()
        };
        assert!(matches!(config.peer_addrs(), Err(Error::Config(_))));
    }
}
