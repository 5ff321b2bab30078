//! # Configuration
//!
//! Settings are read from environment variables. Every variable is optional:
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `ORDERS_LISTEN_ADDR` | `0.0.0.0:3000` | HTTP listen address |
//! | `ORDERS_BACKEND` | `redis` | `redis` or `memory` |
//! | `REDIS_URL` | `redis://127.0.0.1:6379` | Redis server URL |
//! | `REDIS_POOL_SIZE` | `16` | Maximum pooled connections |
//! | `REDIS_POOL_TIMEOUT_SECS` | `5` | Pool wait/create/recycle timeout |
//! | `ORDERS_PAGE_SIZE` | `50` | Default page size for listing |
//! | `ORDERS_SHUTDOWN_TIMEOUT_SECS` | `10` | How long to drain requests on shutdown |

use order_store::RedisConfig;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}

/// Which key-value backend the service stores orders in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Redis,
    /// In-process storage; data is lost on exit.
    Memory,
}

impl FromStr for BackendKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            _ => Err(()),
        }
    }
}

/// Runtime settings of the orders service.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub backend: BackendKind,
    pub redis: RedisConfig,
    pub page_size: NonZeroUsize,
    pub shutdown_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            backend: BackendKind::Redis,
            redis: RedisConfig::default(),
            page_size: NonZeroUsize::new(50).unwrap_or(NonZeroUsize::MIN),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of a
    /// variable if it is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            listen_addr: parse(&lookup, "ORDERS_LISTEN_ADDR", defaults.listen_addr)?,
            backend: parse(&lookup, "ORDERS_BACKEND", defaults.backend)?,
            redis: RedisConfig {
                url: lookup("REDIS_URL").unwrap_or(defaults.redis.url),
                pool_size: parse(&lookup, "REDIS_POOL_SIZE", defaults.redis.pool_size)?,
                pool_timeout: Duration::from_secs(parse(
                    &lookup,
                    "REDIS_POOL_TIMEOUT_SECS",
                    defaults.redis.pool_timeout.as_secs(),
                )?),
            },
            page_size: parse(&lookup, "ORDERS_PAGE_SIZE", defaults.page_size)?,
            shutdown_timeout: Duration::from_secs(parse(
                &lookup,
                "ORDERS_SHUTDOWN_TIMEOUT_SECS",
                defaults.shutdown_timeout.as_secs(),
            )?),
        })
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
